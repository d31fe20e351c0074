//! Prometheus metrics for task execution
//!
//! Metrics are registered with the prometheus default registry when first touched.
//! `init_metrics` forces registration so an exposition taken before any task ran
//! still lists every family.

use lazy_static::lazy_static;
use prometheus::{
    opts, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, Encoder,
    HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tracing::debug;

/// Outcome label values for `task_executions_total`
pub mod outcome {
    pub const SUCCESS: &str = "success";
    pub const FAILURE: &str = "failure";
    pub const BUILD_ERROR: &str = "build_error";
}

lazy_static! {
    /// Total number of task executions
    /// Labels: task, outcome (success, failure, build_error)
    pub static ref TASK_EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("task_executions_total", "Total number of task executions"),
        &["task", "outcome"]
    )
    .expect("Failed to create task_executions_total metric");

    /// Wall time from process launch to exit
    /// Labels: task
    /// Buckets from 10ms to 10min
    pub static ref TASK_EXECUTION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "task_execution_duration_seconds",
        "Task command execution times",
        &["task"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    )
    .expect("Failed to create task_execution_duration_seconds metric");

    /// Executions submitted to a command queue and not yet finished
    /// Labels: command
    pub static ref COMMAND_QUEUE_PENDING: IntGaugeVec = register_int_gauge_vec!(
        opts!("command_queue_pending", "Executions waiting on or running in a command queue"),
        &["command"]
    )
    .expect("Failed to create command_queue_pending metric");
}

/// Force registration of every metric
pub fn init_metrics() {
    lazy_static::initialize(&TASK_EXECUTIONS_TOTAL);
    lazy_static::initialize(&TASK_EXECUTION_DURATION_SECONDS);
    lazy_static::initialize(&COMMAND_QUEUE_PENDING);

    debug!("Prometheus metrics registered");
}

/// Record a finished execution
pub fn record_execution(task: &str, outcome: &str, duration_ms: u64) {
    TASK_EXECUTIONS_TOTAL
        .with_label_values(&[task, outcome])
        .inc();

    let duration_seconds = duration_ms as f64 / 1000.0;
    TASK_EXECUTION_DURATION_SECONDS
        .with_label_values(&[task])
        .observe(duration_seconds);

    debug!(
        task = %task,
        outcome = %outcome,
        duration_ms = duration_ms,
        "Recorded task execution metric"
    );
}

/// Record a task whose command could not be built
pub fn record_build_failure(task: &str) {
    TASK_EXECUTIONS_TOTAL
        .with_label_values(&[task, outcome::BUILD_ERROR])
        .inc();
}

pub fn inc_queue_pending(command: &str) {
    COMMAND_QUEUE_PENDING.with_label_values(&[command]).inc();
}

pub fn dec_queue_pending(command: &str) {
    COMMAND_QUEUE_PENDING.with_label_values(&[command]).dec();
}

/// Gather all metrics and encode them in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_execution() {
        record_execution("metrics-test", outcome::SUCCESS, 1500);
        record_execution("metrics-test", outcome::FAILURE, 20);

        assert!(
            TASK_EXECUTIONS_TOTAL
                .with_label_values(&["metrics-test", outcome::SUCCESS])
                .get()
                >= 1
        );
    }

    #[test]
    fn test_record_build_failure() {
        record_build_failure("metrics-build-test");
        assert_eq!(
            TASK_EXECUTIONS_TOTAL
                .with_label_values(&["metrics-build-test", outcome::BUILD_ERROR])
                .get(),
            1
        );
    }

    #[test]
    fn test_queue_pending_gauge() {
        inc_queue_pending("metrics-gauge-cmd");
        inc_queue_pending("metrics-gauge-cmd");
        dec_queue_pending("metrics-gauge-cmd");
        assert_eq!(
            COMMAND_QUEUE_PENDING
                .with_label_values(&["metrics-gauge-cmd"])
                .get(),
            1
        );
    }

    #[test]
    fn test_gather_metrics() {
        init_metrics();
        record_execution("metrics-gather-test", outcome::SUCCESS, 10);

        let metrics_text = gather_metrics().unwrap();
        assert!(metrics_text.contains("task_executions_total"));
        assert!(metrics_text.contains("# HELP"));
        assert!(metrics_text.contains("# TYPE"));
    }
}
