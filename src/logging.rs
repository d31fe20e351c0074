//! Logging setup for hookrun
//!
//! This module provides structured logging with:
//! - JSON, pretty and compact output
//! - Log level from `RUST_LOG`, the CLI, or the system configuration
//! - A task span so every event emitted while a task runs carries its name
//!
//! # Usage
//!
//! ```rust,no_run
//! use hookrun::logging;
//!
//! logging::init(Some("debug"), None, None).unwrap();
//! let _span = logging::task_span("backup").entered();
//! ```

use tracing::{info_span, Span};
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

use crate::config::SystemConfig;
use crate::types::{Error, Result};

/// Span covering one task execution
pub fn task_span(task: &str) -> Span {
    info_span!("task", task = task)
}

/// Log level enum values as strings for configuration
pub mod level {
    pub const TRACE: &str = "trace";
    pub const DEBUG: &str = "debug";
    pub const INFO: &str = "info";
    pub const WARN: &str = "warn";
    pub const ERROR: &str = "error";
}

/// Log format enum values as strings for configuration
pub mod format {
    pub const JSON: &str = "json";
    pub const PRETTY: &str = "pretty";
    pub const COMPACT: &str = "compact";
}

/// Install the global tracing subscriber.
///
/// # Precedence
///
/// 1. `RUST_LOG` (filter only)
/// 2. CLI arguments
/// 3. System configuration file
/// 4. Default values
pub fn init(
    log_level_override: Option<&str>,
    log_format_override: Option<&str>,
    system_config: Option<&SystemConfig>,
) -> Result<()> {
    let log_level = if let Some(level) = log_level_override {
        level
    } else if let Some(config) = system_config {
        &config.logging.level
    } else {
        level::INFO
    };

    let log_format = if let Some(fmt) = log_format_override {
        fmt
    } else if let Some(config) = system_config {
        &config.logging.format
    } else {
        format::PRETTY
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());

    let installed = match log_format {
        format::JSON => tracing_subscriber::fmt()
            .json()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
        format::PRETTY => tracing_subscriber::fmt()
            .pretty()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .compact()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .try_init(),
    };

    installed.map_err(|e| Error::Application(format!("Failed to initialize logging: {}", e)))
}
