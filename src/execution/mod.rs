pub mod ansi;
pub mod command;
pub mod runner;
pub mod templates;

pub use ansi::strip_ansi;
pub use command::{CommandFactory, ExecutableCommand, ProductionCommandFactory};
pub use runner::{ExecutionRunner, LogNotifier, LogSink, Notifier, Severity, TracingLogSink};
pub use templates::{render_arg_template, render_arg_templates, render_message_template};
