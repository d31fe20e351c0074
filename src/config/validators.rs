use regex::Regex;
use std::sync::OnceLock;

use super::types::{SystemConfig, TaskConfig, TasksConfig};
use crate::types::Result;

const MAX_QUEUE_CAPACITY: usize = 10_000;
const MAX_TASK_NAME_LENGTH: usize = 64;

static TASK_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn task_name_regex() -> &'static Regex {
    TASK_NAME_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid task name regex"))
}

// Validation helper functions

/// Validate positive timeout value
pub(crate) fn validate_positive_timeout(value: u64, field: &str) -> Result<()> {
    if value == 0 {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: "Timeout must be greater than 0".to_string(),
        });
    }
    Ok(())
}

/// Validate a bounded numeric limit
pub(crate) fn validate_limit(value: usize, field: &str, min: usize, max: usize) -> Result<()> {
    if value < min {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: format!("Value {} is below minimum allowed value {}", value, min),
        });
    }
    if value > max {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: format!("Value {} exceeds maximum allowed value {}", value, max),
        });
    }
    Ok(())
}

/// Validate task name characters and length
pub(crate) fn validate_task_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_TASK_NAME_LENGTH {
        return Err(crate::types::Error::Validation {
            field: "tasks".to_string(),
            message: format!(
                "Task name '{}' must be between 1 and {} characters",
                name, MAX_TASK_NAME_LENGTH
            ),
        });
    }
    if !task_name_regex().is_match(name) {
        return Err(crate::types::Error::Validation {
            field: format!("tasks.{}", name),
            message: "Task name may only contain letters, digits, '_', '.' and '-'".to_string(),
        });
    }
    Ok(())
}

/// Validate that a template string compiles
pub(crate) fn validate_template(template: &str, field: &str) -> Result<()> {
    handlebars::Template::compile(template).map_err(|e| crate::types::Error::Validation {
        field: field.to_string(),
        message: format!("Invalid template '{}': {}", template, e),
    })?;
    Ok(())
}

impl SystemConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(crate::types::Error::Validation {
                field: "logging.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ),
            });
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty" | "compact") {
            return Err(crate::types::Error::Validation {
                field: "logging.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Must be one of: json, pretty, compact",
                    self.logging.format
                ),
            });
        }

        validate_limit(
            self.limits.queue_capacity,
            "limits.queue_capacity",
            1,
            MAX_QUEUE_CAPACITY,
        )?;
        if let Some(timeout) = self.limits.command_timeout {
            validate_positive_timeout(timeout, "limits.command_timeout")?;
        }

        Ok(())
    }
}

impl TaskConfig {
    /// Validate a single task definition
    pub fn validate(&self) -> Result<()> {
        validate_task_name(&self.name)?;

        if self.command.trim().is_empty() {
            return Err(crate::types::Error::Validation {
                field: format!("tasks.{}.command", self.name),
                message: "Command cannot be empty".to_string(),
            });
        }

        for (i, arg) in self.args.iter().enumerate() {
            validate_template(arg, &format!("tasks.{}.args[{}]", self.name, i))?;
        }
        if let Some(ref template) = self.success_message {
            validate_template(template, &format!("tasks.{}.success_message", self.name))?;
        }
        if let Some(ref template) = self.error_message {
            validate_template(template, &format!("tasks.{}.error_message", self.name))?;
        }
        if let Some(timeout) = self.timeout {
            validate_positive_timeout(timeout, &format!("tasks.{}.timeout", self.name))?;
        }

        Ok(())
    }
}

impl TasksConfig {
    /// Validate every task definition
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(crate::types::Error::Validation {
                field: "tasks".to_string(),
                message: "At least one task must be configured".to_string(),
            });
        }

        let mut names: Vec<&String> = self.tasks.keys().collect();
        names.sort();
        for name in names {
            let task = &self.tasks[name];
            if task.name != *name {
                return Err(crate::types::Error::Validation {
                    field: format!("tasks.{}.name", name),
                    message: format!("Task name '{}' does not match its key", task.name),
                });
            }
            task.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Error;

    #[test]
    fn test_validate_positive_timeout() {
        assert!(validate_positive_timeout(1, "t").is_ok());
        assert!(validate_positive_timeout(0, "t").is_err());
    }

    #[test]
    fn test_validate_limit() {
        assert!(validate_limit(50, "limits.queue_capacity", 1, 100).is_ok());
        assert!(validate_limit(0, "limits.queue_capacity", 1, 100).is_err());

        match validate_limit(101, "limits.queue_capacity", 1, 100) {
            Err(Error::Validation { field, message }) => {
                assert_eq!(field, "limits.queue_capacity");
                assert!(message.contains("exceeds maximum"));
            }
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[test]
    fn test_validate_task_name() {
        assert!(validate_task_name("deploy-web_1.0").is_ok());
        assert!(validate_task_name("").is_err());
        assert!(validate_task_name("has space").is_err());
        assert!(validate_task_name(&"x".repeat(MAX_TASK_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_template("{{request \"id\"}}", "args[0]").is_ok());
        assert!(validate_template("plain", "args[0]").is_ok());
        assert!(validate_template("{{request \"id\"", "args[0]").is_err());
    }

    #[test]
    fn test_task_validation() {
        let task = TaskConfig::new("backup", "/usr/bin/backup")
            .with_args(["--target", "{{request \"target\"}}"])
            .with_success_message("Backup ok: {{StdOut}}");
        assert!(task.validate().is_ok());

        let empty_command = TaskConfig::new("backup", "  ");
        assert!(empty_command.validate().is_err());

        let bad_message = TaskConfig::new("backup", "backup").with_error_message("{{#if}}");
        assert!(bad_message.validate().is_err());

        let zero_timeout = TaskConfig::new("backup", "backup").with_timeout(0);
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_system_config_validation() {
        let mut config = SystemConfig::default();
        assert!(config.validate().is_ok());

        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = SystemConfig::default();
        config.limits.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = SystemConfig::default();
        config.limits.command_timeout = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tasks_config_requires_tasks() {
        assert!(TasksConfig::default().validate().is_err());
    }
}
