//! hookrun runs externally configured commands on behalf of named tasks.
//!
//! Commands marked non-reentrant are serialized through one queue per command
//! string, so two invocations of the same command never overlap. Reentrant
//! commands run concurrently. Arguments and notification messages are rendered
//! from handlebars templates fed by per-request values and captured output.
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use hookrun::{TaskConfig, TaskManager};
//!
//! # async fn demo() -> hookrun::Result<()> {
//! let mut tasks = HashMap::new();
//! tasks.insert(
//!     "greet".to_string(),
//!     TaskConfig::new("greet", "echo").with_args(["hello {{request \"who\"}}"]),
//! );
//! let manager = TaskManager::builder(tasks).build();
//!
//! let mut values = HashMap::new();
//! values.insert("who".to_string(), "world".to_string());
//! let _result = manager.run_task("greet", values).await?.await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod execution;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::{SystemConfig, TaskConfig, TasksConfig};
pub use execution::{
    CommandFactory, ExecutableCommand, ExecutionRunner, LogNotifier, LogSink, Notifier,
    ProductionCommandFactory, Severity, TracingLogSink,
};
pub use manager::{ResultHandle, TaskManager, TaskManagerBuilder};
pub use types::{Error, ExecutionResult, NoValues, Result, ValueLookup};
