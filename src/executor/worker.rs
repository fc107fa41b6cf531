// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Worker loop: pulls tasks off a queue and executes them concurrently.

use super::{ExecutorState, RunSummary, TaskExecutor, TaskReport, TaskState};
use crate::error::{ReplicationError, Result};
use crate::lock::LockManager;
use crate::metrics;
use crate::resilience::{Bulkhead, RateLimiter};
use crate::task::ReplicationTask;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, info_span, warn, Instrument};

/// Sending half of an executor's task queue.
#[derive(Debug, Clone)]
pub struct TaskSender {
    tx: mpsc::Sender<ReplicationTask>,
}

impl TaskSender {
    /// Queue a task, waiting while the queue is full.
    ///
    /// Fails with [`ReplicationError::Shutdown`] once the executor has
    /// stopped taking tasks; the task is dropped.
    pub async fn submit(&self, task: ReplicationTask) -> Result<()> {
        self.tx.send(task).await.map_err(|_| ReplicationError::Shutdown)
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl<L: LockManager> TaskExecutor<L> {
    /// Task queue holding up to `queue_capacity` tasks. Hand the receiver
    /// to [`run`](Self::run).
    pub fn task_queue(&self) -> (TaskSender, mpsc::Receiver<ReplicationTask>) {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        (TaskSender { tx }, rx)
    }

    /// Run until `shutdown_rx` turns `true` or the task queue closes.
    ///
    /// At most `worker_count` tasks run at once. One [`TaskReport`] is sent
    /// per task taken off the queue. On shutdown, tasks still queued are left
    /// in the channel and in-flight tasks get `drain_timeout` to finish; any
    /// still running after that are aborted (their locks are released as they
    /// drop) and counted as lost.
    pub async fn run(
        self: Arc<Self>,
        mut tasks_rx: mpsc::Receiver<ReplicationTask>,
        reports_tx: mpsc::Sender<TaskReport>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<RunSummary> {
        let span = info_span!("executor", workers = self.config.worker_count);
        async move {
            let bulkhead = Bulkhead::for_workers(self.config.worker_count);
            let limiter = self.config.rate_limit_config().map(RateLimiter::new);
            let mut in_flight: JoinSet<TaskState> = JoinSet::new();
            let mut summary = RunSummary::default();

            info!(
                workers = bulkhead.capacity(),
                rate_limited = limiter.is_some(),
                "Starting task executor"
            );
            set_state(ExecutorState::Running);

            loop {
                if *shutdown_rx.borrow_and_update() {
                    info!("Shutdown signal received");
                    break;
                }

                tokio::select! {
                    biased;

                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            debug!("Shutdown sender dropped, stopping");
                            break;
                        }
                    }

                    Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                        absorb(&mut summary, joined);
                        metrics::set_tasks_in_flight(in_flight.len());
                    }

                    permit = bulkhead.acquire() => {
                        let permit = permit?;

                        let task = tokio::select! {
                            biased;
                            changed = shutdown_rx.changed() => {
                                if changed.is_err() {
                                    debug!("Shutdown sender dropped, stopping");
                                    break;
                                }
                                // Re-check the flag at the top of the loop.
                                continue;
                            }
                            task = tasks_rx.recv() => match task {
                                Some(task) => task,
                                None => {
                                    info!("Task queue closed");
                                    break;
                                }
                            },
                        };

                        if let Some(limiter) = &limiter {
                            if limiter.pace().await {
                                metrics::record_rate_limited();
                            }
                        }

                        metrics::record_task_dequeued();
                        summary.dispatched += 1;

                        let executor = Arc::clone(&self);
                        let reports = reports_tx.clone();
                        in_flight.spawn(async move {
                            let report = executor.execute(&task).await;
                            drop(permit);
                            let state = report.state;
                            if reports.send(report).await.is_err() {
                                debug!("Report receiver dropped");
                            }
                            state
                        });
                        metrics::set_tasks_in_flight(bulkhead.in_flight());
                    }
                }
            }

            set_state(ExecutorState::Draining);
            let pending = in_flight.len();
            if pending > 0 {
                info!(pending, "Waiting for in-flight tasks to finish");
            }

            let drain_timeout = self.config.drain_timeout_duration();
            let drained = tokio::time::timeout(drain_timeout, async {
                while let Some(joined) = in_flight.join_next().await {
                    absorb(&mut summary, joined);
                }
            })
            .await;

            if drained.is_err() {
                let aborted = in_flight.len();
                warn!(
                    aborted,
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "Drain timed out, aborting in-flight tasks"
                );
                in_flight.abort_all();
                while let Some(joined) = in_flight.join_next().await {
                    absorb(&mut summary, joined);
                }
            }

            metrics::set_tasks_in_flight(0);
            set_state(ExecutorState::Stopped);
            info!(
                dispatched = summary.dispatched,
                successful = summary.successful,
                not_completable = summary.not_completable,
                failed = summary.failed,
                lost = summary.lost,
                "Task executor stopped"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }
}

fn absorb(summary: &mut RunSummary, joined: std::result::Result<TaskState, JoinError>) {
    match joined {
        Ok(state) => summary.record(state),
        Err(e) => {
            if e.is_panic() {
                warn!(error = %e, "Task panicked");
            }
            summary.lost += 1;
        }
    }
}

fn set_state(state: ExecutorState) {
    metrics::set_executor_state(&state.to_string());
}
