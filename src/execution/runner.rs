use std::fmt;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::ansi::strip_ansi;
use super::command::ExecutableCommand;
use super::templates::render_message_template;
use crate::config::TaskConfig;
use crate::metrics;
use crate::types::{ExecutionError, ExecutionResult, ValueLookup};

/// Receives rendered notification text after an execution.
///
/// Called at most once per execution, only when a message template is configured
/// and renders to something non-empty.
pub trait Notifier: Send + Sync {
    fn deliver(&self, message: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str) + Send + Sync,
{
    fn deliver(&self, message: &str) {
        self(message)
    }
}

/// Notifier that only logs what it would have sent
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, message: &str) {
        info!(notification = %message, "Notification");
    }
}

/// Severity of a summary line: successful runs are `Info`, failed runs and
/// build errors are `Warn`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
}

/// Append-only line log for execution summaries
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, line: &str);
}

/// Writes each line as a tracing event at its severity
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, severity: Severity, line: &str) {
        match severity {
            Severity::Info => info!("{}", line),
            Severity::Warn => warn!("{}", line),
        }
    }
}

/// Raw output of a finished, failed or timed-out process
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: Result<ExitStatus, ExecutionError>,
}

/// Drain a pipe chunk by chunk so bytes read before a cancellation are kept
async fn read_pipe<R>(pipe: Option<R>, buf: &mut Vec<u8>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return;
    };
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!(error = %e, "Stopped reading command output");
                return;
            }
        }
    }
}

/// How the process ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum Termination {
    Exited(i32),
    Signaled(i32),
    Unknown,
}

impl Termination {
    fn from_status(status: &ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Termination::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Termination::Signaled(signal);
            }
        }
        Termination::Unknown
    }

    /// Exit code reported on the result; only a real exit status survives
    fn exit_code(&self) -> i32 {
        match self {
            Termination::Exited(code) => *code,
            Termination::Signaled(_) | Termination::Unknown => 1,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exited {}", code),
            Termination::Signaled(signal) => write!(f, "was terminated by signal {}", signal),
            Termination::Unknown => write!(f, "terminated abnormally"),
        }
    }
}

/// Runs one command to completion and turns it into an `ExecutionResult`.
///
/// Performs no concurrency control of its own: the task manager decides whether
/// a run happens on a command queue worker or on its own task.
pub struct ExecutionRunner {
    notifier: Arc<dyn Notifier>,
    log: Arc<dyn LogSink>,
}

impl ExecutionRunner {
    pub fn new(notifier: Arc<dyn Notifier>, log: Arc<dyn LogSink>) -> Self {
        Self { notifier, log }
    }

    pub(crate) fn log_line(&self, severity: Severity, line: &str) {
        self.log.log(severity, &strip_ansi(line));
    }

    /// Launch, capture, classify, render the outcome message, log and notify
    pub async fn run(
        &self,
        command: &ExecutableCommand,
        task: &TaskConfig,
        values: &dyn ValueLookup,
    ) -> ExecutionResult {
        let display_str = command.display_string();
        let start_time = Instant::now();

        debug!(
            task = %task.name,
            command = %display_str,
            timeout_secs = ?task.timeout,
            "Executing command"
        );

        let mut result = ExecutionResult {
            name: task.name.clone(),
            ..Default::default()
        };

        let captured = self.spawn_and_wait(command, task.timeout_duration()).await;
        result.stdout = String::from_utf8_lossy(&captured.stdout).trim().to_string();
        result.stderr = String::from_utf8_lossy(&captured.stderr).trim().to_string();

        let termination = match captured.status {
            Ok(status) => Termination::from_status(&status),
            Err(e) => {
                warn!(
                    task = %task.name,
                    command = %display_str,
                    error = %e,
                    "Command did not complete"
                );
                if !result.stderr.is_empty() {
                    result.stderr.push('\n');
                }
                result.stderr.push_str(&e.to_string());
                Termination::Unknown
            }
        };
        result.exit_code = termination.exit_code();

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let outcome = if result.is_success() {
            metrics::outcome::SUCCESS
        } else {
            metrics::outcome::FAILURE
        };
        metrics::record_execution(&task.name, outcome, duration_ms);

        let (mut log_msg, template, template_kind, fallback_lead) = if result.is_success() {
            (
                format!("Command \"{}\" exited 0.", display_str),
                task.success_message.as_deref(),
                "success",
                "However,",
            )
        } else {
            (
                format!("Command \"{}\" {}!", display_str, termination),
                task.error_message.as_deref(),
                "error",
                "Additionally,",
            )
        };

        let mut notification = String::new();
        if let Some(template) = template.filter(|t| !t.is_empty()) {
            let rendered =
                render_message_template(template, values, &result.stdout, &result.stderr)
                    .unwrap_or_else(|e| {
                        warn!(
                            task = %task.name,
                            error = %e,
                            "Failed to render {} message template",
                            template_kind
                        );
                        format!(
                            "{} {} an error occurred processing the {} message template: {}",
                            log_msg, fallback_lead, template_kind, e
                        )
                    });
            notification = strip_ansi(&rendered);
            if !notification.is_empty() {
                log_msg.push_str(&format!("\nSending notification: \"{}\"", notification));
            }
        }

        if !result.stdout.is_empty() {
            log_msg.push_str(&format!("\nOn StdOut: {}", result.stdout));
        }
        if !result.stderr.is_empty() {
            log_msg.push_str(&format!("\nOn StdErr: {}", result.stderr));
        }

        let severity = if result.is_success() {
            Severity::Info
        } else {
            Severity::Warn
        };
        self.log_line(severity, &log_msg);

        if !notification.is_empty() {
            self.notifier.deliver(&notification);
            result.message = notification;
        }

        debug!(
            task = %task.name,
            exit_code = result.exit_code,
            duration_ms = duration_ms,
            "Command completed"
        );

        result
    }

    async fn spawn_and_wait(
        &self,
        command: &ExecutableCommand,
        deadline: Option<Duration>,
    ) -> Captured {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let mut child = match command.to_command().spawn() {
            Ok(child) => child,
            Err(source) => {
                return Captured {
                    stdout,
                    stderr,
                    status: Err(ExecutionError::StartFailed {
                        command: command.display_string(),
                        source,
                    }),
                }
            }
        };
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let completion = async {
            let (status, _, _) = tokio::join!(
                child.wait(),
                read_pipe(stdout_pipe, &mut stdout),
                read_pipe(stderr_pipe, &mut stderr)
            );
            status
        };

        let wait_failed = |source| ExecutionError::WaitFailed {
            command: command.display_string(),
            source,
        };

        let status = match deadline {
            Some(limit) => {
                let waited = timeout(limit, completion).await;
                match waited {
                    Ok(status) => status.map_err(wait_failed),
                    Err(_) => {
                        if let Err(e) = child.kill().await {
                            debug!(error = %e, "Could not kill timed-out command");
                        }
                        Err(ExecutionError::Timeout {
                            command: command.display_string(),
                            timeout: limit.as_secs(),
                        })
                    }
                }
            }
            None => completion.await.map_err(wait_failed),
        };

        Captured {
            stdout,
            stderr,
            status,
        }
    }
}
