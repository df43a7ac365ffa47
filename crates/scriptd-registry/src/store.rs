//! `ScriptStore`: script records plus their payload files.
//!
//! Records live in memory behind a mutex and are written through to SQLite
//! on every mutation. Payloads are plain files named `{id}.{ext}` under the
//! storage root.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use scriptd_core::{ScriptId, ScriptType};
use tracing::{info, instrument, warn};

use crate::db::Database;
use crate::error::{RegistryError, Result};
use crate::types::{
    DeletedScript, NewScript, Script, ScriptContent, ScriptSummary, ScriptUpdate,
};

pub struct ScriptStore {
    db: Arc<Database>,
    root: PathBuf,
    scripts: Mutex<Vec<Script>>,
}

impl ScriptStore {
    /// Load the persisted collection and make sure the storage root exists.
    ///
    /// Records whose payload file has gone missing are kept; they only fail
    /// when someone reads or runs them.
    pub fn open(db: Arc<Database>, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let scripts = db.load_scripts()?;
        for script in &scripts {
            if !script.file_path.exists() {
                warn!(
                    script_id = %script.id,
                    name = %script.name,
                    path = %script.file_path.display(),
                    "script payload missing on disk"
                );
            }
        }
        info!(count = scripts.len(), root = %root.display(), "scripts loaded");

        Ok(Self {
            db,
            root,
            scripts: Mutex::new(scripts),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Script>> {
        self.scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn payload_path(&self, id: &ScriptId, script_type: ScriptType) -> PathBuf {
        self.root
            .join(format!("{}.{}", id.as_str(), script_type.extension()))
    }

    /// Register a new script and write its payload.
    #[instrument(skip(self, new), fields(name = %new.name, script_type = %new.script_type))]
    pub fn create(&self, new: NewScript) -> Result<Script> {
        let script_type = parse_type(&new.script_type)?;
        let name = resolve_name(&new)?;
        let payload = match (new.upload, new.content) {
            (Some(upload), _) => upload.bytes,
            // An empty inline body is a valid, if useless, script.
            (None, Some(content)) => content.into_bytes(),
            (None, None) => {
                return Err(RegistryError::Validation(
                    "script content or an uploaded file is required".to_string(),
                ))
            }
        };

        let id = ScriptId::new();
        let now = Utc::now().to_rfc3339();
        let script = Script {
            file_path: self.payload_path(&id, script_type),
            id,
            name,
            script_type,
            cron_expression: String::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        let mut scripts = self.lock();
        std::fs::write(&script.file_path, &payload)?;
        scripts.push(script.clone());
        if let Err(e) = self.db.save_scripts(&scripts) {
            scripts.pop();
            let _ = std::fs::remove_file(&script.file_path);
            return Err(e);
        }

        info!(script_id = %script.id, bytes = payload.len(), "script created");
        Ok(script)
    }

    pub fn get(&self, id: &ScriptId) -> Result<Script> {
        self.lock()
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| RegistryError::script_not_found(id))
    }

    pub fn contains(&self, id: &ScriptId) -> bool {
        self.lock().iter().any(|s| &s.id == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list_summaries(&self) -> Vec<ScriptSummary> {
        self.lock().iter().map(Script::summary).collect()
    }

    /// Read the payload back as text.
    pub fn get_content(&self, id: &ScriptId) -> Result<ScriptContent> {
        let script = self.get(id)?;
        let bytes = match std::fs::read(&script.file_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegistryError::PayloadMissing {
                    id: script.id.to_string(),
                    path: script.file_path.display().to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ScriptContent {
            id: script.id,
            name: script.name,
            script_type: script.script_type,
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Rename and/or replace the payload. The type can never change.
    #[instrument(skip(self, update), fields(script_id = %id))]
    pub fn update(&self, id: &ScriptId, update: ScriptUpdate) -> Result<Script> {
        let name = update.name.filter(|n| !n.trim().is_empty());
        if name.is_none() && update.content.is_none() {
            return Err(RegistryError::Validation(
                "name or content is required".to_string(),
            ));
        }

        let mut scripts = self.lock();
        let index = scripts
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| RegistryError::script_not_found(id))?;

        if let Some(requested) = update.script_type.as_deref() {
            let requested = parse_type(requested)?;
            if requested != scripts[index].script_type {
                return Err(RegistryError::Validation(format!(
                    "script type cannot be changed (is {}, got {requested})",
                    scripts[index].script_type
                )));
            }
        }

        if let Some(content) = &update.content {
            std::fs::write(&scripts[index].file_path, content)?;
        }

        let previous = scripts[index].clone();
        let script = &mut scripts[index];
        if let Some(name) = name {
            script.name = name.trim().to_string();
        }
        script.updated_at = Utc::now().to_rfc3339();
        let updated = script.clone();

        if let Err(e) = self.db.save_scripts(&scripts) {
            scripts[index] = previous;
            return Err(e);
        }

        info!(name = %updated.name, content_replaced = update.content.is_some(), "script updated");
        Ok(updated)
    }

    /// Remove the record and its payload. Task cleanup is the caller's job.
    #[instrument(skip(self), fields(script_id = %id))]
    pub(crate) fn delete(&self, id: &ScriptId) -> Result<DeletedScript> {
        let mut scripts = self.lock();
        let index = scripts
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| RegistryError::script_not_found(id))?;

        let payload_removed = match std::fs::remove_file(&scripts[index].file_path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %scripts[index].file_path.display(), "payload already absent");
                false
            }
            Err(e) => {
                warn!(path = %scripts[index].file_path.display(), error = %e, "failed to remove payload");
                false
            }
        };

        let removed = scripts.remove(index);
        if let Err(e) = self.db.save_scripts(&scripts) {
            scripts.insert(index, removed);
            return Err(e);
        }

        info!(name = %removed.name, payload_removed, "script deleted");
        Ok(DeletedScript {
            id: removed.id,
            name: removed.name,
            tasks_removed: 0,
            payload_removed,
        })
    }

    /// Overwrite the display-only cron cache. Unknown ids are ignored.
    pub(crate) fn set_cron_cache(&self, id: &ScriptId, expression: &str) -> Result<()> {
        let mut scripts = self.lock();
        let Some(script) = scripts.iter_mut().find(|s| &s.id == id) else {
            return Ok(());
        };
        if script.cron_expression == expression {
            return Ok(());
        }
        script.cron_expression = expression.to_string();
        self.db.save_scripts(&scripts)
    }
}

fn parse_type(raw: &str) -> Result<ScriptType> {
    if raw.trim().is_empty() {
        return Err(RegistryError::Validation("script type is required".to_string()));
    }
    raw.parse().map_err(|_| {
        RegistryError::Validation(format!(
            "unsupported script type '{raw}' (expected one of {})",
            ScriptType::ALL.map(ScriptType::as_str).join(", ")
        ))
    })
}

/// Explicit name, else the stem of the uploaded file name.
fn resolve_name(new: &NewScript) -> Result<String> {
    let explicit = new.name.trim();
    if !explicit.is_empty() {
        return Ok(explicit.to_string());
    }
    new.upload
        .as_ref()
        .and_then(|u| u.file_name.as_deref())
        .and_then(|f| Path::new(f).file_stem())
        .map(|stem| stem.to_string_lossy().trim().to_string())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| RegistryError::Validation("script name is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Upload;

    fn store() -> (ScriptStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::in_memory().unwrap());
        let store = ScriptStore::open(db, dir.path().join("scripts")).unwrap();
        (store, dir)
    }

    #[test]
    fn create_writes_payload_verbatim() {
        let (store, _dir) = store();
        let script = store
            .create(NewScript::inline("hello", "sh", "echo hi\n"))
            .unwrap();
        assert_eq!(script.script_type, ScriptType::Shell);
        assert!(script.file_path.ends_with(format!("{}.sh", script.id)));
        assert_eq!(std::fs::read_to_string(&script.file_path).unwrap(), "echo hi\n");
        assert_eq!(store.get(&script.id).unwrap(), script);
    }

    #[test]
    fn create_validates_before_touching_disk() {
        let (store, _dir) = store();
        for bad in [
            NewScript::inline("", "sh", "echo"),
            NewScript::inline("x", "", "echo"),
            NewScript::inline("x", "ruby", "puts 1"),
            NewScript {
                content: None,
                ..NewScript::inline("x", "py", "")
            },
        ] {
            let err = store.create(bad).unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
        }
        assert!(store.is_empty());
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[test]
    fn create_accepts_empty_inline_content() {
        let (store, _dir) = store();
        let script = store.create(NewScript::inline("blank", "py", "")).unwrap();
        assert_eq!(std::fs::metadata(&script.file_path).unwrap().len(), 0);
        assert_eq!(store.get_content(&script.id).unwrap().content, "");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn upload_wins_and_names_default_to_stem() {
        let (store, _dir) = store();
        let script = store
            .create(NewScript {
                name: String::new(),
                script_type: "py".to_string(),
                content: Some("print('inline')".to_string()),
                upload: Some(Upload {
                    file_name: Some("backup_job.py".to_string()),
                    bytes: b"print('uploaded')\n".to_vec(),
                }),
            })
            .unwrap();
        assert_eq!(script.name, "backup_job");
        let content = store.get_content(&script.id).unwrap();
        assert_eq!(content.content, "print('uploaded')\n");
    }

    #[test]
    fn update_renames_and_rewrites() {
        let (store, _dir) = store();
        let script = store.create(NewScript::inline("a", "js", "1")).unwrap();
        let updated = store
            .update(
                &script.id,
                ScriptUpdate {
                    name: Some("b".into()),
                    content: Some("console.log(2)".into()),
                    script_type: Some("js".into()),
                },
            )
            .unwrap();
        assert_eq!(updated.name, "b");
        assert_eq!(updated.file_path, script.file_path);
        assert_eq!(
            store.get_content(&script.id).unwrap().content,
            "console.log(2)"
        );
    }

    #[test]
    fn update_rejects_type_change_and_empty_body() {
        let (store, _dir) = store();
        let script = store.create(NewScript::inline("a", "sh", "echo")).unwrap();

        let err = store
            .update(
                &script.id,
                ScriptUpdate {
                    content: Some("print()".into()),
                    script_type: Some("py".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.to_string().contains("cannot be changed"));
        assert_eq!(store.get_content(&script.id).unwrap().content, "echo");

        let err = store.update(&script.id, ScriptUpdate::default()).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = store
            .update(
                &ScriptId::from("nope"),
                ScriptUpdate {
                    name: Some("x".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "SCRIPT_NOT_FOUND");
    }

    #[test]
    fn delete_tolerates_missing_payload() {
        let (store, _dir) = store();
        let script = store.create(NewScript::inline("a", "sh", "echo")).unwrap();
        std::fs::remove_file(&script.file_path).unwrap();

        let err = store.get_content(&script.id).unwrap_err();
        assert_eq!(err.code(), "PAYLOAD_MISSING");

        let deleted = store.delete(&script.id).unwrap();
        assert_eq!(deleted.name, "a");
        assert!(!deleted.payload_removed);
        assert!(store.get(&script.id).is_err());
        assert!(store.delete(&script.id).is_err());
    }

    #[test]
    fn reopen_restores_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::in_memory().unwrap());
        let root = dir.path().join("scripts");
        let store = ScriptStore::open(Arc::clone(&db), &root).unwrap();
        store.create(NewScript::inline("first", "sh", "echo 1")).unwrap();
        store.create(NewScript::inline("second", "py", "print(2)")).unwrap();
        let before = store.list_summaries();
        drop(store);

        let reopened = ScriptStore::open(db, &root).unwrap();
        assert_eq!(reopened.list_summaries(), before);
    }
}
