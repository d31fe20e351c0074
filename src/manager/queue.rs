//! Per-command serialization queues
//!
//! Each non-reentrant command gets one bounded channel and one worker. The worker
//! runs jobs one at a time in arrival order, which is the whole mutual exclusion
//! mechanism: no lock guards the command, only the single consumer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, Instrument, Span};

use crate::config::TaskConfig;
use crate::execution::{ExecutableCommand, ExecutionRunner};
use crate::metrics;
use crate::types::{ExecutionResult, ValueLookup};

/// One pending execution: rendered command, its task, the request values and
/// the slot its result goes to
pub(crate) struct ExecutionJob {
    pub command: ExecutableCommand,
    pub task: Arc<TaskConfig>,
    pub values: Arc<dyn ValueLookup>,
    pub result_tx: oneshot::Sender<ExecutionResult>,
    pub span: Span,
}

impl ExecutionJob {
    pub(crate) async fn run(self, runner: &ExecutionRunner) {
        let ExecutionJob {
            command,
            task,
            values,
            result_tx,
            span,
        } = self;

        let result = runner
            .run(&command, &task, values.as_ref())
            .instrument(span)
            .await;
        deliver(result_tx, result);
    }

    /// Complete the job without running it
    pub(crate) fn fail(self, stderr: String) {
        let result = ExecutionResult::failed(&self.task.name, stderr);
        deliver(self.result_tx, result);
    }
}

pub(crate) fn deliver(tx: oneshot::Sender<ExecutionResult>, result: ExecutionResult) {
    if tx.send(result).is_err() {
        debug!("Result receiver dropped before delivery");
    }
}

/// Bounded FIFO plus its single worker for one command string
pub(crate) struct SerializationQueue {
    command: String,
    sender: mpsc::Sender<ExecutionJob>,
}

impl SerializationQueue {
    /// Create the queue and start its worker. Must be called inside a tokio runtime.
    pub(crate) fn spawn(command: String, capacity: usize, runner: Arc<ExecutionRunner>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<ExecutionJob>(capacity.max(1));

        let worker_command = command.clone();
        tokio::spawn(async move {
            debug!(command = %worker_command, capacity, "Command queue worker started");

            while let Some(job) = receiver.recv().await {
                job.run(&runner).await;
                metrics::dec_queue_pending(&worker_command);
            }

            debug!(command = %worker_command, "Command queue worker stopped");
        });

        Self { command, sender }
    }

    /// Enqueue a job, waiting for a free slot while the queue is full.
    ///
    /// Hands the job back if the worker is gone.
    pub(crate) async fn submit(&self, job: ExecutionJob) -> Result<(), ExecutionJob> {
        if self.sender.capacity() == 0 {
            debug!(command = %self.command, "Command queue full, waiting for a free slot");
        }

        // Reserving first keeps the job with the caller if the wait is abandoned
        match self.sender.reserve().await {
            Ok(permit) => {
                metrics::inc_queue_pending(&self.command);
                permit.send(job);
                Ok(())
            }
            Err(_) => Err(job),
        }
    }

    pub(crate) fn command(&self) -> &str {
        &self.command
    }

    /// Queue whose worker has already exited
    #[cfg(test)]
    pub(crate) fn stopped(command: &str) -> Self {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        Self {
            command: command.to_string(),
            sender,
        }
    }
}

/// Receives the single result of one `run_task` call.
///
/// Resolves to `None` only if the producer went away without sending, which
/// does not happen in normal operation.
pub struct ResultHandle {
    task: String,
    receiver: oneshot::Receiver<ExecutionResult>,
}

impl ResultHandle {
    pub(crate) fn new(task: &str, receiver: oneshot::Receiver<ExecutionResult>) -> Self {
        Self {
            task: task.to_string(),
            receiver,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// Wait for the result
    pub async fn wait(self) -> Option<ExecutionResult> {
        self.await
    }

    /// Take the result if it has already been delivered
    pub fn try_result(&mut self) -> Option<ExecutionResult> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the result from outside the async runtime
    pub fn blocking_wait(self) -> Option<ExecutionResult> {
        self.receiver.blocking_recv().ok()
    }
}

impl Future for ResultHandle {
    type Output = Option<ExecutionResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingLog, RecordingNotifier};
    use crate::types::NoValues;

    fn runner() -> Arc<ExecutionRunner> {
        Arc::new(ExecutionRunner::new(
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingLog::default()),
        ))
    }

    fn job(script: &str) -> (ExecutionJob, ResultHandle) {
        let (tx, rx) = oneshot::channel();
        let job = ExecutionJob {
            command: ExecutableCommand::new("sh", vec!["-c".to_string(), script.to_string()]),
            task: Arc::new(TaskConfig::new("queued", "sh")),
            values: Arc::new(NoValues),
            result_tx: tx,
            span: Span::none(),
        };
        (job, ResultHandle::new("queued", rx))
    }

    #[tokio::test]
    async fn test_queue_runs_jobs_in_order() {
        let queue = SerializationQueue::spawn("sh".to_string(), 4, runner());
        assert_eq!(queue.command(), "sh");

        let mut handles = Vec::new();
        for i in 0..3 {
            let (job, handle) = job(&format!("echo {}", i));
            assert!(queue.submit(job).await.is_ok());
            handles.push(handle);
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap();
            assert_eq!(result.stdout, i.to_string());
        }
    }

    #[tokio::test]
    async fn test_failed_job_delivers_result() {
        let (job, handle) = job("echo never");
        job.fail("worker unavailable".to_string());

        let result = handle.wait().await.unwrap();
        assert_eq!(result.name, "queued");
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "worker unavailable");
    }

    #[tokio::test]
    async fn test_submit_to_stopped_worker_returns_job() {
        let queue = SerializationQueue::stopped("sh");
        let (job, handle) = job("echo never");

        let job = match queue.submit(job).await {
            Err(job) => job,
            Ok(()) => panic!("submit to a stopped worker must hand the job back"),
        };
        job.fail("worker gone".to_string());

        let result = handle.await.unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "worker gone");
        assert!(result.stdout.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_wait_from_sync_code() {
        let queue = SerializationQueue::spawn("sh".to_string(), 1, runner());
        let (job, handle) = job("echo blocking");
        assert!(queue.submit(job).await.is_ok());

        let result = tokio::task::spawn_blocking(move || handle.blocking_wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.stdout, "blocking");
    }

    #[tokio::test]
    async fn test_try_result_before_and_after_delivery() {
        let (tx, rx) = oneshot::channel();
        let mut handle = ResultHandle::new("t", rx);
        assert_eq!(handle.task(), "t");
        assert!(handle.try_result().is_none());

        deliver(tx, ExecutionResult::failed("t", String::new()));
        assert_eq!(handle.try_result().unwrap().exit_code, 1);
    }

    #[tokio::test]
    async fn test_closed_without_value_is_none() {
        let (tx, rx) = oneshot::channel::<ExecutionResult>();
        drop(tx);
        assert!(ResultHandle::new("t", rx).await.is_none());
    }
}
