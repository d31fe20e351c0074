//! Task routing
//!
//! The `TaskManager` owns the immutable task table and one serialization queue per
//! command that is configured as non-reentrant anywhere in that table. Reentrant
//! tasks skip the queues and run on their own tokio task.

mod queue;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::{types::default_queue_capacity, TaskConfig};
use crate::execution::{
    CommandFactory, ExecutionRunner, LogNotifier, LogSink, Notifier, ProductionCommandFactory,
    Severity, TracingLogSink,
};
use crate::logging;
use crate::metrics;
use crate::types::{Error, ExecutionError, ExecutionResult, Result, ValueLookup};

use queue::{deliver, ExecutionJob, SerializationQueue};
pub use queue::ResultHandle;

/// Builder for `TaskManager`
pub struct TaskManagerBuilder {
    tasks: HashMap<String, TaskConfig>,
    notifier: Arc<dyn Notifier>,
    log: Arc<dyn LogSink>,
    factory: Arc<dyn CommandFactory>,
    queue_capacity: usize,
}

impl TaskManagerBuilder {
    /// Where rendered success/error messages go
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Where per-execution summary lines go
    pub fn with_log_sink(mut self, log: impl LogSink + 'static) -> Self {
        self.log = Arc::new(log);
        self
    }

    /// Replace the production command builder
    pub fn with_command_factory(mut self, factory: impl CommandFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Pending executions per command queue before submitters wait (minimum 1)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Build the manager and start one worker per non-reentrant command.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> TaskManager {
        let runner = Arc::new(ExecutionRunner::new(self.notifier, self.log));

        let mut tasks = HashMap::with_capacity(self.tasks.len());
        let mut queues: HashMap<String, SerializationQueue> = HashMap::new();

        for (name, mut task) in self.tasks {
            task.name = name.clone();

            if !task.reentrant && !queues.contains_key(&task.command) {
                let queue = SerializationQueue::spawn(
                    task.command.clone(),
                    self.queue_capacity,
                    runner.clone(),
                );
                queues.insert(task.command.clone(), queue);
            }
            tasks.insert(name, Arc::new(task));
        }

        info!(
            tasks = tasks.len(),
            queues = queues.len(),
            queue_capacity = self.queue_capacity,
            "Task manager started"
        );

        TaskManager {
            tasks,
            queues,
            factory: self.factory,
            runner,
        }
    }
}

/// Routes task invocations to serialization queues or concurrent executions
pub struct TaskManager {
    tasks: HashMap<String, Arc<TaskConfig>>,
    queues: HashMap<String, SerializationQueue>,
    factory: Arc<dyn CommandFactory>,
    runner: Arc<ExecutionRunner>,
}

impl TaskManager {
    /// Start building a manager over the given task table, keyed by task name
    pub fn builder(tasks: HashMap<String, TaskConfig>) -> TaskManagerBuilder {
        TaskManagerBuilder {
            tasks,
            notifier: Arc::new(LogNotifier),
            log: Arc::new(TracingLogSink),
            factory: Arc::new(ProductionCommandFactory),
            queue_capacity: default_queue_capacity(),
        }
    }

    pub fn is_task_configured(&self, task_name: &str) -> bool {
        self.tasks.contains_key(task_name)
    }

    pub fn task(&self, task_name: &str) -> Option<&TaskConfig> {
        self.tasks.get(task_name).map(|task| task.as_ref())
    }

    /// Configured task names, sorted
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Commands that have a serialization queue, sorted
    pub fn queued_commands(&self) -> Vec<&str> {
        let mut commands: Vec<&str> = self.queues.values().map(|q| q.command()).collect();
        commands.sort_unstable();
        commands
    }

    /// Run a task with the given request values.
    ///
    /// Returns `Error::TaskNotConfigured` for an unknown name; otherwise the handle
    /// always yields exactly one result. For a non-reentrant task this waits while
    /// the command's queue is full.
    pub async fn run_task<V>(&self, task_name: &str, values: V) -> Result<ResultHandle>
    where
        V: ValueLookup + 'static,
    {
        self.run_task_shared(task_name, Arc::new(values)).await
    }

    /// Same as `run_task`, for values already behind an `Arc`
    pub async fn run_task_shared(
        &self,
        task_name: &str,
        values: Arc<dyn ValueLookup>,
    ) -> Result<ResultHandle> {
        let task = self
            .tasks
            .get(task_name)
            .cloned()
            .ok_or_else(|| Error::TaskNotConfigured {
                task: task_name.to_string(),
            })?;

        let (result_tx, result_rx) = oneshot::channel();
        let handle = ResultHandle::new(task_name, result_rx);

        let command = match self.factory.build(&task.command, &task.args, values.as_ref()) {
            Ok(command) => command,
            Err(source) => {
                let stderr = source.to_string();
                let error = ExecutionError::Build {
                    task: task_name.to_string(),
                    source,
                };
                warn!(task = %task_name, error = %error, "Command build failed");
                self.runner.log_line(Severity::Warn, &error.to_string());
                metrics::record_build_failure(task_name);

                deliver(result_tx, ExecutionResult::failed(task_name, stderr));
                return Ok(handle);
            }
        };

        let job = ExecutionJob {
            command,
            task: task.clone(),
            values,
            result_tx,
            span: logging::task_span(task_name),
        };

        if task.reentrant {
            debug!(task = %task_name, "Starting reentrant execution");
            let runner = self.runner.clone();
            tokio::spawn(async move {
                job.run(&runner).await;
            });
            return Ok(handle);
        }

        match self.queues.get(&task.command) {
            Some(queue) => {
                debug!(task = %task_name, command = %task.command, "Submitting to command queue");
                if let Err(job) = queue.submit(job).await {
                    warn!(
                        task = %task_name,
                        command = %task.command,
                        "Command queue worker is gone"
                    );
                    job.fail(format!("Command queue for \"{}\" is not running", task.command));
                }
            }
            None => {
                warn!(task = %task_name, command = %task.command, "No command queue for task");
                job.fail(format!("No command queue for \"{}\"", task.command));
            }
        }

        Ok(handle)
    }
}
