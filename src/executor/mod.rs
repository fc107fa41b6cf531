// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Task executor.
//!
//! Runs [`ReplicationTask`]s with the guarantees tasks rely on:
//!
//! 1. The declared [`LockSet`](crate::lock::LockSet) is held for the whole run
//!    and released afterwards, whatever the outcome.
//! 2. `Successful` and `NotCompletable` are final.
//! 3. Retryable errors are retried with exponential backoff; every retry runs
//!    the full token check again. Anything else, or an exhausted budget,
//!    ends in `Failed`.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        TaskExecutor                            │
//! │                                                                │
//! │  tasks_rx ──→ [RateLimiter] ──→ [Bulkhead] ──→ execute(task)   │
//! │                                                   │            │
//! │                         ┌─────────────────────────┤            │
//! │                         ↓                         ↓            │
//! │              LockManager::acquire      CircuitBreaker::call    │
//! │               (with lock_timeout)       (task.run() with       │
//! │                                          attempt_timeout)      │
//! │                                                   │            │
//! │  reports_tx ←──────────── TaskReport ←────────────┘            │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use metastore_replication::config::ExecutorConfig;
//! use metastore_replication::executor::TaskExecutor;
//! # use metastore_replication::task::ReplicationTask;
//! # async fn example(task: ReplicationTask) {
//! let executor = TaskExecutor::new(&ExecutorConfig::default());
//! let report = executor.execute(&task).await;
//! println!("{} -> {} after {} attempt(s)", report.spec, report.state, report.attempts);
//! # }
//! ```

mod types;
mod worker;

pub use types::{ExecutorState, RunSummary, TaskReport, TaskState};
pub use worker::TaskSender;

use crate::circuit_breaker::{CircuitBreaker, CircuitError};
use crate::config::{ExecutorConfig, SloConfig};
use crate::error::{ReplicationError, Result};
use crate::events::TaskEvent;
use crate::lock::{KeyedLockManager, LockManager};
use crate::metrics;
use crate::resilience::RetryConfig;
use crate::result::RunInfo;
use crate::task::ReplicationTask;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info_span, warn, Instrument};

/// Name of the circuit guarding task runs.
pub const CATALOG_CIRCUIT: &str = "catalog";

/// Executes replication tasks under locks, retries and a circuit breaker.
pub struct TaskExecutor<L: LockManager = KeyedLockManager> {
    config: ExecutorConfig,
    lock_manager: Arc<L>,
    retry: RetryConfig,
    lock_timeout: Duration,
    slo: SloConfig,
    circuit: Arc<CircuitBreaker>,
    next_id: AtomicU64,
}

impl TaskExecutor<KeyedLockManager> {
    /// Executor with its own in-process lock manager.
    pub fn new(config: &ExecutorConfig) -> Self {
        Self::with_lock_manager(config, Arc::new(KeyedLockManager::new()))
    }
}

impl<L: LockManager> TaskExecutor<L> {
    /// Executor sharing `lock_manager` with other executors.
    pub fn with_lock_manager(config: &ExecutorConfig, lock_manager: Arc<L>) -> Self {
        Self {
            config: config.clone(),
            lock_manager,
            retry: config.retry_config(),
            lock_timeout: config.lock_timeout_duration(),
            slo: config.slo.clone(),
            circuit: Arc::new(CircuitBreaker::new(CATALOG_CIRCUIT, config.circuit_config())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Replace the retry policy (builder style).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the circuit breaker, e.g. to share one between executors.
    #[must_use]
    pub fn with_circuit(mut self, circuit: Arc<CircuitBreaker>) -> Self {
        self.circuit = circuit;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn lock_manager(&self) -> &Arc<L> {
        &self.lock_manager
    }

    pub fn circuit(&self) -> &Arc<CircuitBreaker> {
        &self.circuit
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Drive one task to a terminal state.
    ///
    /// Never returns an error: failures are reported in the [`TaskReport`].
    pub async fn execute(&self, task: &ReplicationTask) -> TaskReport {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("task", id, kind = %task.kind(), spec = %task.spec());
        self.execute_with_id(id, task).instrument(span).await
    }

    async fn execute_with_id(&self, id: u64, task: &ReplicationTask) -> TaskReport {
        let start = Instant::now();
        let mut state = TaskState::Pending;
        let mut attempts: u32 = 0;

        let outcome = loop {
            if let Err(e) = state.advance(TaskState::Running) {
                break Err(e);
            }
            attempts = attempts.saturating_add(1);

            match self.execute_once(task).await {
                Ok(info) => break Ok(info),
                Err(e) if e.is_retryable() && self.retry.allows_retry(attempts) => {
                    let delay = self.retry.delay_for_attempt(attempts);
                    metrics::record_task_retry(task.kind().as_str(), attempts);
                    warn!(
                        attempt = attempts,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    if let Err(e) = state.advance(TaskState::Pending) {
                        break Err(e);
                    }
                    tokio::time::sleep(delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        let (run_info, error) = match outcome {
            Ok(info) => (info, None),
            Err(e) => (RunInfo::failed(), Some(e)),
        };
        let final_state = TaskState::from(run_info.status());
        if let Err(e) = state.advance(final_state) {
            warn!(error = %e, "Task state machine violation");
            state = TaskState::Failed;
        }

        let duration = start.elapsed();
        metrics::record_task_final(task.kind().as_str(), &state.to_string(), attempts, duration);
        match &error {
            Some(e) => warn!(
                attempts,
                retryable = e.is_retryable(),
                error = %e,
                "Task failed permanently"
            ),
            None => debug!(state = %state, attempts, "Task finished"),
        }

        TaskReport {
            id,
            kind: task.kind(),
            spec: task.spec().clone(),
            state,
            attempts,
            run_info,
            error_kind: error.as_ref().map(ReplicationError::kind),
            error: error.map(|e| e.to_string()),
            duration,
        }
    }

    /// One attempt: acquire locks, run through the circuit, release locks.
    ///
    /// No retries. Errors raised before the task body runs (lock timeout,
    /// open circuit) are emitted as task events here.
    pub async fn execute_once(&self, task: &ReplicationTask) -> Result<RunInfo> {
        let locks = task.required_locks();
        let kind = task.kind().as_str();
        let wait_start = Instant::now();

        let guard = match tokio::time::timeout(self.lock_timeout, self.lock_manager.acquire(&locks)).await {
            Ok(acquired) => acquired?,
            Err(_) => {
                metrics::record_lock_timeout(kind);
                let err = ReplicationError::LockTimeout {
                    keys: locks.keys(),
                    waited_ms: wait_start.elapsed().as_millis() as u64,
                };
                TaskEvent::from_error(task.kind(), task.spec(), &err, wait_start.elapsed()).emit();
                return Err(err);
            }
        };

        let waited = wait_start.elapsed();
        metrics::record_lock_wait(kind, locks.len(), waited);
        if self.slo.is_lock_wait_violation(waited) {
            warn!(
                waited_ms = waited.as_millis() as u64,
                threshold_ms = self.slo.max_lock_wait_ms,
                locks = %locks,
                "Slow lock acquisition"
            );
        }

        let attempt_timeout = self.retry.attempt_timeout;
        let run_start = Instant::now();
        let result = self
            .circuit
            .call(|| async {
                match tokio::time::timeout(attempt_timeout, task.run()).await {
                    Ok(result) => result,
                    Err(_) => Err(ReplicationError::AttemptTimeout {
                        timeout_ms: attempt_timeout.as_millis() as u64,
                    }),
                }
            })
            .await;
        drop(guard);

        let took = run_start.elapsed();
        if self.slo.is_task_run_violation(took) {
            warn!(
                took_ms = took.as_millis() as u64,
                threshold_ms = self.slo.max_task_run_ms,
                "Slow task run"
            );
        }

        match result {
            Ok(info) => Ok(info),
            Err(CircuitError::Rejected) => {
                let err = ReplicationError::CircuitOpen(self.circuit.name().to_string());
                TaskEvent::from_error(task.kind(), task.spec(), &err, took).emit();
                Err(err)
            }
            Err(CircuitError::Inner(e @ ReplicationError::AttemptTimeout { .. })) => {
                TaskEvent::from_error(task.kind(), task.spec(), &e, took).emit();
                Err(e)
            }
            Err(CircuitError::Inner(e)) => Err(e),
        }
    }
}

impl<L: LockManager> std::fmt::Debug for TaskExecutor<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("retry", &self.retry)
            .field("lock_timeout", &self.lock_timeout)
            .field("circuit", &self.circuit)
            .finish()
    }
}
