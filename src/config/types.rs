use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::types::{ConfigError, Error, Result};

/// System configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Pending executions a non-reentrant command may hold before submitters wait
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Fallback deadline in seconds for tasks without their own `timeout`
    #[serde(default)]
    pub command_timeout: Option<u64>,
}

/// Task definitions, keyed by task name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default)]
    pub tasks: HashMap<String, TaskConfig>,
}

/// A named, pre-configured command.
///
/// Serialization is keyed on `command`, not `name`: two non-reentrant tasks
/// running the same command share one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Filled from the table key when loaded from a file
    #[serde(default)]
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub success_message: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub reentrant: bool,
    /// Deadline in seconds; absent means run to completion
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl TaskConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            success_message: None,
            error_message: None,
            reentrant: false,
            timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_success_message(mut self, template: impl Into<String>) -> Self {
        self.success_message = Some(template.into());
        self
    }

    pub fn with_error_message(mut self, template: impl Into<String>) -> Self {
        self.error_message = Some(template.into());
        self
    }

    pub fn with_reentrant(mut self, reentrant: bool) -> Self {
        self.reentrant = reentrant;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

impl SystemConfig {
    /// Load system configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = read_config_file(path.as_ref())?;
        let config: SystemConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Like `load_from_file`, but a missing file is `None`. Parse and read
    /// errors are still returned.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        match Self::load_from_file(path) {
            Ok(config) => Ok(Some(config)),
            Err(Error::Config(ConfigError::FileNotFound { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::from(ConfigError::FileNotFound {
            path: path.to_string_lossy().to_string(),
        }),
        _ => Error::Io(e),
    })
}

impl TasksConfig {
    /// Load task definitions from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = read_config_file(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: TasksConfig = toml::from_str(content).map_err(ConfigError::ParseError)?;
        for (name, task) in config.tasks.iter_mut() {
            task.name = name.clone();
        }
        Ok(config)
    }

    /// Apply the system-wide fallback timeout to tasks that have none
    pub fn with_default_timeout(mut self, timeout: Option<u64>) -> Self {
        if let Some(seconds) = timeout {
            for task in self.tasks.values_mut() {
                if task.timeout.is_none() {
                    task.timeout = Some(seconds);
                }
            }
        }
        self
    }

    pub fn into_map(self) -> HashMap<String, TaskConfig> {
        self.tasks
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            command_timeout: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

pub(crate) fn default_queue_capacity() -> usize {
    50
}
