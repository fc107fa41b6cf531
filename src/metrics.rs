//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Task outcomes and durations
//! - Abstentions by reason
//! - Retries and permanent failures
//! - Lock waits and timeouts
//! - Catalog call latency per cluster
//! - Circuit breaker state
//! - Executor queue and in-flight tasks
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replication_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! # Usage
//!
//! ```rust,no_run
//! use metastore_replication::metrics;
//! use std::time::Duration;
//!
//! // After a task run
//! metrics::record_task_run("drop", "successful", Duration::from_millis(12));
//!
//! // After a catalog call
//! metrics::record_catalog_call("dst", "drop_object", true, Duration::from_millis(8));
//! ```

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// =============================================================================
// Task Metrics
// =============================================================================

/// Record one task run with its status (successful, not_completable, failed).
pub fn record_task_run(task: &str, status: &str, duration: Duration) {
    counter!(
        "replication_task_runs_total",
        "task" => task.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("replication_task_run_duration_seconds", "task" => task.to_string())
        .record(duration.as_secs_f64());
}

/// Record a task that abstained, by reason.
pub fn record_abstention(task: &str, reason: &str) {
    counter!(
        "replication_task_abstentions_total",
        "task" => task.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record errors by type.
pub fn record_task_error(task: &str, error_type: &str) {
    counter!(
        "replication_task_errors_total",
        "task" => task.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record a task requeued for another attempt.
pub fn record_task_retry(task: &str, attempt: u32) {
    counter!("replication_task_retries_total", "task" => task.to_string()).increment(1);
    histogram!("replication_task_retry_attempt", "task" => task.to_string()).record(attempt as f64);
}

/// Record the final state of a task after the executor is done with it.
pub fn record_task_final(task: &str, state: &str, attempts: u32, duration: Duration) {
    counter!(
        "replication_tasks_total",
        "task" => task.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
    histogram!("replication_task_attempts", "task" => task.to_string()).record(attempts as f64);
    histogram!("replication_task_duration_seconds", "task" => task.to_string())
        .record(duration.as_secs_f64());
}

// =============================================================================
// Lock Metrics
// =============================================================================

/// Record time spent waiting for a task's locks.
pub fn record_lock_wait(task: &str, lock_count: usize, duration: Duration) {
    histogram!("replication_lock_wait_seconds", "task" => task.to_string())
        .record(duration.as_secs_f64());
    histogram!("replication_lock_set_size").record(lock_count as f64);
}

/// Record a lock acquisition that timed out.
pub fn record_lock_timeout(task: &str) {
    counter!("replication_lock_timeouts_total", "task" => task.to_string()).increment(1);
}

// =============================================================================
// Catalog Metrics
// =============================================================================

/// Record a catalog call and its latency.
pub fn record_catalog_call(cluster: &str, operation: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "replication_catalog_calls_total",
        "cluster" => cluster.to_string(),
        "operation" => operation.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!(
        "replication_catalog_call_duration_seconds",
        "cluster" => cluster.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Executor Metrics
// =============================================================================

/// Gauge for tasks currently holding a worker slot.
pub fn set_tasks_in_flight(count: usize) {
    gauge!("replication_tasks_in_flight").set(count as f64);
}

/// Record a task received from the queue.
pub fn record_task_dequeued() {
    counter!("replication_tasks_dequeued_total").increment(1);
}

/// Record a dispatch delayed by the rate limiter.
pub fn record_rate_limited() {
    counter!("replication_rate_limited_total").increment(1);
}

/// Gauge for executor state.
pub fn set_executor_state(state: &str) {
    // 0=created, 1=running, 2=draining, 3=stopped
    let value = match state {
        "Created" => 0.0,
        "Running" => 1.0,
        "Draining" => 2.0,
        "Stopped" => 3.0,
        _ => -1.0,
    };
    gauge!("replication_executor_state").set(value);
}

// =============================================================================
// Circuit Breaker Metrics
// =============================================================================

/// Record circuit breaker call outcome.
pub fn record_circuit_call(circuit_name: &str, outcome: &str) {
    counter!(
        "replication_circuit_calls_total",
        "circuit" => circuit_name.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Set circuit breaker state gauge (0=closed, 1=half_open, 2=open).
pub fn set_circuit_state(circuit_name: &str, state: &str) {
    let value = match state {
        "closed" => 0.0,
        "half_open" => 1.0,
        "open" => 2.0,
        _ => -1.0,
    };
    gauge!("replication_circuit_state", "circuit" => circuit_name.to_string()).set(value);
}

/// Record circuit breaker rejection (circuit was open).
pub fn record_circuit_rejection(circuit_name: &str) {
    counter!(
        "replication_circuit_rejections_total",
        "circuit" => circuit_name.to_string()
    )
    .increment(1);
}
