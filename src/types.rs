use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("No task configuration for task \"{task}\"")]
    TaskNotConfigured { task: String },

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Application error: {0}")]
    Application(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Config file parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Execution-related errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Could not prepare an executable command for task {task}: {source}")]
    Build {
        task: String,
        #[source]
        source: TemplateError,
    },

    #[error("Command '{command}' could not be started: {source}")]
    StartFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Waiting for command '{command}' failed: {source}")]
    WaitFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command '{command}' timed out after {timeout}s")]
    Timeout { command: String, timeout: u64 },
}

/// Template errors, covering both malformed syntax and failed helper calls
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("{source}")]
    Render {
        #[from]
        source: handlebars::RenderError,
    },
}

/// Type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of one task invocation. Exactly one is delivered per `run_task` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub name: String,
    /// 0 means success
    pub exit_code: i32,
    /// Trimmed of surrounding whitespace
    pub stdout: String,
    /// Trimmed of surrounding whitespace
    pub stderr: String,
    /// Rendered notification text with ANSI sequences removed, empty if none
    pub message: String,
}

impl ExecutionResult {
    /// Failure result for a task whose command never ran
    pub fn failed(name: &str, stderr: String) -> Self {
        Self {
            name: name.to_string(),
            exit_code: 1,
            stdout: String::new(),
            stderr,
            message: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Value source supplied per request to populate templates.
///
/// A missing key is not an error: templates render it as an empty string.
pub trait ValueLookup: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl ValueLookup for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ValueLookup for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

/// Lookup with no values, for tasks whose templates take no request input
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValues;

impl ValueLookup for NoValues {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result() {
        let result = ExecutionResult::failed("deploy", "boom".to_string());
        assert_eq!(result.name, "deploy");
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "boom");
        assert!(result.stdout.is_empty());
        assert!(result.message.is_empty());
        assert!(!result.is_success());
    }

    #[test]
    fn test_hashmap_lookup() {
        let mut values = HashMap::new();
        values.insert("id".to_string(), "42".to_string());

        assert_eq!(ValueLookup::get(&values, "id"), Some("42".to_string()));
        assert_eq!(ValueLookup::get(&values, "missing"), None);
        assert_eq!(NoValues.get("id"), None);
    }

    #[test]
    fn test_task_not_configured_message() {
        let err = Error::TaskNotConfigured {
            task: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "No task configuration for task \"nope\"");
    }

    #[test]
    fn test_result_serializes_to_json() {
        let result = ExecutionResult {
            name: "backup".to_string(),
            exit_code: 0,
            stdout: "done".to_string(),
            stderr: String::new(),
            message: "Backup finished".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["name"], "backup");
        assert_eq!(json["exit_code"], 0);
        assert_eq!(json["message"], "Backup finished");
    }
}
