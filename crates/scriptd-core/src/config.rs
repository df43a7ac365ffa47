use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::ScriptType;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_SHELL: &str = "/bin/bash";
pub const DEFAULT_NODE: &str = "node";
pub const DEFAULT_PYTHON: &str = "python3";
/// Capacity of the scheduled-run report channel.
pub const DEFAULT_REPORT_CAPACITY: usize = 256;

/// Legacy override for the shell binary, still honoured.
pub const LEGACY_SHELL_ENV: &str = "SR_BASH_PATH";

/// Top-level config (scriptd.toml + SCRIPTD_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptdConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub interpreters: InterpreterConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Where script payload files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_scripts_dir")]
    pub scripts: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scripts: default_scripts_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// One interpreter binary per script type.
///
/// Values are either absolute paths or program names resolved through `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterpreterConfig {
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default = "default_node")]
    pub node: String,
    #[serde(default = "default_python")]
    pub python: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            node: DEFAULT_NODE.to_string(),
            python: DEFAULT_PYTHON.to_string(),
        }
    }
}

impl InterpreterConfig {
    /// The configured binary for `script_type`.
    pub fn binary_for(&self, script_type: ScriptType) -> &str {
        match script_type {
            ScriptType::Shell => &self.shell,
            ScriptType::Node => &self.node,
            ScriptType::Python => &self.python,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Buffered run reports before scheduled results start being dropped.
    #[serde(default = "default_report_capacity")]
    pub reports: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reports: DEFAULT_REPORT_CAPACITY,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}
fn default_node() -> String {
    DEFAULT_NODE.to_string()
}
fn default_python() -> String {
    DEFAULT_PYTHON.to_string()
}
fn default_report_capacity() -> usize {
    DEFAULT_REPORT_CAPACITY
}
fn default_scripts_dir() -> String {
    data_dir().join("user_scripts").to_string_lossy().into_owned()
}
fn default_db_path() -> String {
    data_dir().join("scriptd.db").to_string_lossy().into_owned()
}

fn data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".scriptd")
}

impl ScriptdConfig {
    /// Load config from a TOML file with SCRIPTD_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.scriptd/scriptd.toml
    ///
    /// A missing file is not an error; defaults fill every section.
    /// `SR_BASH_PATH` still wins for the shell binary so existing
    /// deployments keep working.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let mut config: ScriptdConfig = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SCRIPTD_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        if let Ok(shell) = std::env::var(LEGACY_SHELL_ENV) {
            if !shell.trim().is_empty() {
                config.interpreters.shell = shell;
            }
        }

        Ok(config)
    }
}

fn default_config_path() -> String {
    data_dir().join("scriptd.toml").to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_when_file_missing() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let config = ScriptdConfig::load(Some("does-not-exist.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, DEFAULT_PORT);
            assert_eq!(config.interpreters, InterpreterConfig::default());
            assert_eq!(config.scheduler.reports, DEFAULT_REPORT_CAPACITY);
            Ok(())
        });
    }

    #[test]
    fn toml_then_env_override() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "scriptd.toml",
                r#"
                [server]
                port = 8080

                [interpreters]
                node = "/opt/node/bin/node"
                python = "/usr/bin/python3.12"
                "#,
            )?;
            jail.set_env("SCRIPTD_INTERPRETERS_PYTHON", "pypy3");

            let config = ScriptdConfig::load(Some("scriptd.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.interpreters.node, "/opt/node/bin/node");
            assert_eq!(config.interpreters.python, "pypy3");
            assert_eq!(config.interpreters.shell, DEFAULT_SHELL);
            Ok(())
        });
    }

    #[test]
    fn legacy_bash_path_wins() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SCRIPTD_INTERPRETERS_SHELL", "/bin/sh");
            jail.set_env(LEGACY_SHELL_ENV, "/usr/local/bin/bash");

            let config = ScriptdConfig::load(Some("none.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.interpreters.shell, "/usr/local/bin/bash");
            Ok(())
        });
    }

    #[test]
    fn binary_lookup_by_type() {
        let interpreters = InterpreterConfig::default();
        assert_eq!(interpreters.binary_for(ScriptType::Shell), DEFAULT_SHELL);
        assert_eq!(interpreters.binary_for(ScriptType::Node), DEFAULT_NODE);
        assert_eq!(interpreters.binary_for(ScriptType::Python), DEFAULT_PYTHON);
    }
}
