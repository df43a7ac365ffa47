use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use scriptd_core::ScriptType;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{Script, TaskDef};

/// Initialise the registry schema in `conn`.
///
/// Both tables carry a `position` column so listings come back in insertion
/// order after a reload.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scripts (
            id              TEXT    NOT NULL PRIMARY KEY,
            position        INTEGER NOT NULL,
            name            TEXT    NOT NULL,
            script_type     TEXT    NOT NULL,   -- sh | js | py
            file_path       TEXT    NOT NULL,
            cron_expression TEXT    NOT NULL DEFAULT '',
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS tasks (
            id              TEXT    NOT NULL PRIMARY KEY,
            position        INTEGER NOT NULL,
            script_id       TEXT    NOT NULL,
            cron_expression TEXT    NOT NULL,
            created_at      TEXT    NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}

/// The durable side of the registry: one SQLite file holding both collections.
///
/// Every save rewrites the whole table inside a transaction, so a reader
/// after a crash sees either the previous or the new collection, never a mix.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path`, creating parent
    /// directories as required.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::new(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Raw SQL, for tests that need a broken schema.
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Load every script in insertion order.
    ///
    /// Rows with an unrecognised type are skipped with a warning rather than
    /// failing the whole load.
    pub fn load_scripts(&self) -> Result<Vec<Script>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, script_type, file_path, cron_expression, created_at, updated_at
             FROM scripts ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut scripts = Vec::new();
        for row in rows {
            let (id, name, type_str, file_path, cron_expression, created_at, updated_at) = row?;
            let Ok(script_type) = type_str.parse::<ScriptType>() else {
                warn!(script_id = %id, script_type = %type_str, "skipping script with unknown type");
                continue;
            };
            scripts.push(Script {
                id: id.into(),
                name,
                script_type,
                file_path: PathBuf::from(file_path),
                cron_expression,
                created_at,
                updated_at,
            });
        }
        Ok(scripts)
    }

    /// Replace the persisted script collection with `scripts`.
    pub fn save_scripts(&self, scripts: &[Script]) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM scripts", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO scripts
                 (id, position, name, script_type, file_path, cron_expression, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (position, s) in scripts.iter().enumerate() {
                insert.execute(params![
                    s.id.as_str(),
                    position as i64,
                    s.name,
                    s.script_type.as_str(),
                    s.file_path.to_string_lossy().into_owned(),
                    s.cron_expression,
                    s.created_at,
                    s.updated_at,
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = scripts.len(), "scripts saved");
        Ok(())
    }

    /// Load every persisted task definition in insertion order.
    pub fn load_tasks(&self) -> Result<Vec<TaskDef>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, script_id, cron_expression, created_at FROM tasks ORDER BY position",
        )?;
        let tasks = stmt
            .query_map([], |row| {
                Ok(TaskDef {
                    id: row.get::<_, String>(0)?.into(),
                    script_id: row.get::<_, String>(1)?.into(),
                    cron_expression: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Replace the persisted task collection with `tasks`.
    pub fn save_tasks(&self, tasks: &[TaskDef]) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM tasks", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO tasks (id, position, script_id, cron_expression, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, t) in tasks.iter().enumerate() {
                insert.execute(params![
                    t.id.as_str(),
                    position as i64,
                    t.script_id.as_str(),
                    t.cron_expression,
                    t.created_at,
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = tasks.len(), "tasks saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(id: &str, name: &str) -> Script {
        Script {
            id: id.into(),
            name: name.to_string(),
            script_type: ScriptType::Python,
            file_path: PathBuf::from(format!("/data/{id}.py")),
            cron_expression: String::new(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn scripts_keep_insertion_order() {
        let db = Database::in_memory().unwrap();
        let scripts = vec![script("b", "second"), script("a", "first")];
        db.save_scripts(&scripts).unwrap();
        assert_eq!(db.load_scripts().unwrap(), scripts);
    }

    #[test]
    fn save_replaces_whole_collection() {
        let db = Database::in_memory().unwrap();
        db.save_scripts(&[script("a", "one"), script("b", "two")]).unwrap();
        db.save_scripts(&[script("b", "two")]).unwrap();
        let loaded = db.load_scripts().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id.as_str(), "b");
    }

    #[test]
    fn tasks_round_trip() {
        let db = Database::in_memory().unwrap();
        let tasks = vec![TaskDef {
            id: "t1".into(),
            script_id: "a".into(),
            cron_expression: "*/5 * * * *".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }];
        db.save_tasks(&tasks).unwrap();
        assert_eq!(db.load_tasks().unwrap(), tasks);
        db.save_tasks(&[]).unwrap();
        assert!(db.load_tasks().unwrap().is_empty());
    }

    #[test]
    fn unknown_type_rows_are_skipped() {
        let db = Database::in_memory().unwrap();
        db.save_scripts(&[script("a", "ok")]).unwrap();
        db.lock()
            .execute(
                "INSERT INTO scripts VALUES ('z', 9, 'bad', 'rb', '/x.rb', '', 't', 't')",
                [],
            )
            .unwrap();
        let loaded = db.load_scripts().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "ok");
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scriptd.db");
        let db = Database::open(&path).unwrap();
        db.save_scripts(&[script("a", "x")]).unwrap();
        drop(db);
        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.load_scripts().unwrap().len(), 1);
    }
}
