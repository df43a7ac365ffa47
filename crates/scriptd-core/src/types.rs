//! Identifiers and the script type enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// ScriptId / TaskId
// ---------------------------------------------------------------------------

/// Opaque identifier for a registered script.
///
/// Wraps a `String` so records written by other tools (or older versions)
/// load without a UUID parse step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptId(pub String);

impl ScriptId {
    /// Generate a fresh random script ID (UUIDv4).
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ScriptId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ScriptId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque identifier for a scheduled task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a fresh random task ID (UUIDv4).
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// ScriptType
// ---------------------------------------------------------------------------

/// Interpreter kind of a script. Also decides the payload file extension.
///
/// Serialized as the extension (`sh`, `js`, `py`) for wire compatibility
/// with existing clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    #[serde(rename = "sh")]
    Shell,
    #[serde(rename = "js")]
    Node,
    #[serde(rename = "py")]
    Python,
}

impl ScriptType {
    pub const ALL: [ScriptType; 3] = [ScriptType::Shell, ScriptType::Node, ScriptType::Python];

    /// File extension for the payload, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ScriptType::Shell => "sh",
            ScriptType::Node => "js",
            ScriptType::Python => "py",
        }
    }

    pub fn as_str(self) -> &'static str {
        self.extension()
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptType {
    type Err = CoreError;

    /// Accepts the canonical extension as well as the common long names.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sh" | "shell" | "bash" => Ok(ScriptType::Shell),
            "js" | "node" | "javascript" => Ok(ScriptType::Node),
            "py" | "python" => Ok(ScriptType::Python),
            other => Err(CoreError::UnsupportedType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!("sh".parse::<ScriptType>().unwrap(), ScriptType::Shell);
        assert_eq!("Bash".parse::<ScriptType>().unwrap(), ScriptType::Shell);
        assert_eq!("node".parse::<ScriptType>().unwrap(), ScriptType::Node);
        assert_eq!(" py ".parse::<ScriptType>().unwrap(), ScriptType::Python);
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "ruby".parse::<ScriptType>().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("ruby"));
        assert!("".parse::<ScriptType>().is_err());
    }

    #[test]
    fn wire_format_is_extension() {
        let json = serde_json::to_string(&ScriptType::Node).unwrap();
        assert_eq!(json, r#""js""#);
        let back: ScriptType = serde_json::from_str(r#""py""#).unwrap();
        assert_eq!(back, ScriptType::Python);
    }

    #[test]
    fn ids_are_unique_and_transparent() {
        let a = ScriptId::new();
        let b = ScriptId::new();
        assert_ne!(a, b);
        let json = serde_json::to_string(&TaskId::from("t-1")).unwrap();
        assert_eq!(json, r#""t-1""#);
    }
}
