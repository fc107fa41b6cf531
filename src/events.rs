// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Task outcome events.
//!
//! Tasks do not log their outcome themselves. The dispatcher builds one
//! [`TaskEvent`] per run from the returned result and emits it, which writes a
//! structured log line and updates metrics. Nothing reads events back, so
//! control flow never depends on them.

use crate::error::{ReplicationError, Result};
use crate::metrics;
use crate::object::ObjectSpec;
use crate::result::{RunInfo, RunStatus};
use crate::task::TaskKind;
use std::time::Duration;
use tracing::{info, warn};

/// How a single task run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task returned a run result.
    Completed(RunInfo),
    /// The task propagated an error.
    Errored {
        kind: &'static str,
        retryable: bool,
        message: String,
    },
}

/// One observation of a task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub kind: TaskKind,
    pub spec: ObjectSpec,
    pub outcome: TaskOutcome,
    pub duration: Duration,
}

impl TaskEvent {
    pub fn from_result(kind: TaskKind, spec: &ObjectSpec, result: &Result<RunInfo>, duration: Duration) -> Self {
        let outcome = match result {
            Ok(info) => TaskOutcome::Completed(info.clone()),
            Err(e) => TaskOutcome::Errored {
                kind: e.kind(),
                retryable: e.is_retryable(),
                message: e.to_string(),
            },
        };
        Self {
            kind,
            spec: spec.clone(),
            outcome,
            duration,
        }
    }

    /// Build an event for an error raised outside the task body (lock timeout,
    /// open circuit).
    pub fn from_error(kind: TaskKind, spec: &ObjectSpec, error: &ReplicationError, duration: Duration) -> Self {
        Self {
            kind,
            spec: spec.clone(),
            outcome: TaskOutcome::Errored {
                kind: error.kind(),
                retryable: error.is_retryable(),
                message: error.to_string(),
            },
            duration,
        }
    }

    /// Status label this event counts under.
    pub fn status(&self) -> RunStatus {
        match &self.outcome {
            TaskOutcome::Completed(info) => info.status(),
            TaskOutcome::Errored { .. } => RunStatus::Failed,
        }
    }

    /// Log and record the event.
    pub fn emit(&self) {
        let kind = self.kind.as_str();
        metrics::record_task_run(kind, self.status().as_str(), self.duration);

        match &self.outcome {
            TaskOutcome::Completed(info) => match info.abstention() {
                None => {
                    info!(
                        task = kind,
                        spec = %self.spec,
                        bytes = info.bytes_processed(),
                        duration_ms = self.duration.as_millis() as u64,
                        "Task completed"
                    );
                }
                Some(reason) => {
                    metrics::record_abstention(kind, reason.as_str());
                    info!(
                        task = kind,
                        spec = %self.spec,
                        reason = %reason,
                        "Task not completable, destination left unchanged"
                    );
                }
            },
            TaskOutcome::Errored {
                kind: error_kind,
                retryable,
                message,
            } => {
                metrics::record_task_error(kind, error_kind);
                warn!(
                    task = kind,
                    spec = %self.spec,
                    error_kind = *error_kind,
                    retryable = *retryable,
                    error = %message,
                    "Task attempt failed"
                );
            }
        }
    }
}
