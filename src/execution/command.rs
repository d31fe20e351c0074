use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::templates::render_arg_templates;
use crate::types::{TemplateError, ValueLookup};

/// A fully rendered external process, ready to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment; empty means the ambient environment is inherited unchanged
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl ExecutableCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: HashMap::new(),
            working_dir: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Approximate shell form of the command, for log lines
    pub fn display_string(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Process builder with stdin closed and both output streams captured
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Turns a configured command name and argument templates into an executable command.
///
/// The task manager accepts any implementation, so tests can substitute their own
/// process description without touching the queueing logic.
pub trait CommandFactory: Send + Sync {
    fn build(
        &self,
        program: &str,
        arg_templates: &[String],
        values: &dyn ValueLookup,
    ) -> Result<ExecutableCommand, TemplateError>;
}

impl<F> CommandFactory for F
where
    F: Fn(&str, &[String], &dyn ValueLookup) -> Result<ExecutableCommand, TemplateError>
        + Send
        + Sync,
{
    fn build(
        &self,
        program: &str,
        arg_templates: &[String],
        values: &dyn ValueLookup,
    ) -> Result<ExecutableCommand, TemplateError> {
        self(program, arg_templates, values)
    }
}

/// Renders each argument template and runs the program as configured
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionCommandFactory;

impl CommandFactory for ProductionCommandFactory {
    fn build(
        &self,
        program: &str,
        arg_templates: &[String],
        values: &dyn ValueLookup,
    ) -> Result<ExecutableCommand, TemplateError> {
        let args = render_arg_templates(arg_templates, values)?;
        Ok(ExecutableCommand::new(program, args))
    }
}
