//! Task lifecycle types.
//!
//! # State Transitions
//!
//! ```text
//!   Pending ──────→ Running ──────→ Successful
//!      ↑               │    ╲
//!      │   (retryable  │     ╲────→ NotCompletable
//!      │    error)     │
//!      └───────────────┤
//!                      │ (non-retryable error or
//!                      ↓  retries exhausted)
//!                    Failed
//! ```
//!
//! - **Pending**: Queued, or backing off before another attempt.
//! - **Running**: Holding its locks and executing.
//! - **Successful**: Destination reflects the event. Done.
//! - **NotCompletable**: Safe abstention, destination untouched. Done.
//! - **Failed**: A service error outlived the retry policy.

use crate::error::{ReplicationError, Result};
use crate::object::ObjectSpec;
use crate::result::{RunInfo, RunStatus};
use crate::task::TaskKind;
use std::time::Duration;

/// State of one task inside the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    Running,
    Successful,
    NotCompletable,
    Failed,
}

impl TaskState {
    /// No further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::NotCompletable | Self::Failed)
    }

    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Pending)
                | (Self::Running, Self::Successful)
                | (Self::Running, Self::NotCompletable)
                | (Self::Running, Self::Failed)
        )
    }

    /// Move to `next`, rejecting transitions the diagram does not allow.
    pub fn advance(&mut self, next: TaskState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(ReplicationError::InvalidState {
                expected: format!("a state reachable from {}", self),
                actual: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl From<RunStatus> for TaskState {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Successful => Self::Successful,
            RunStatus::NotCompletable => Self::NotCompletable,
            RunStatus::Failed => Self::Failed,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Successful => write!(f, "Successful"),
            Self::NotCompletable => write!(f, "NotCompletable"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// What the executor reports back for each task it takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Executor-assigned, unique per executor.
    pub id: u64,
    pub kind: TaskKind,
    pub spec: ObjectSpec,
    /// Always terminal.
    pub state: TaskState,
    pub attempts: u32,
    /// Final run result (`RunInfo::failed()` for failures).
    pub run_info: RunInfo,
    /// Last error, for failed tasks.
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
    pub duration: Duration,
}

impl TaskReport {
    /// Successful or NotCompletable: the event is handled.
    pub fn is_done(&self) -> bool {
        matches!(self.state, TaskState::Successful | TaskState::NotCompletable)
    }

    pub fn is_failed(&self) -> bool {
        self.state == TaskState::Failed
    }
}

/// State of the executor's worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Created,
    Running,
    /// Shutdown requested; waiting for in-flight tasks.
    Draining,
    Stopped,
}

impl std::fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Totals for one `run()` of the worker loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub dispatched: u64,
    pub successful: u64,
    pub not_completable: u64,
    pub failed: u64,
    /// Tasks that panicked or were aborted at the drain deadline.
    pub lost: u64,
}

impl RunSummary {
    pub(crate) fn record(&mut self, state: TaskState) {
        match state {
            TaskState::Successful => self.successful += 1,
            TaskState::NotCompletable => self.not_completable += 1,
            TaskState::Failed => self.failed += 1,
            TaskState::Pending | TaskState::Running => self.lost += 1,
        }
    }

    pub fn completed(&self) -> u64 {
        self.successful + self.not_completable + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Successful.is_terminal());
        assert!(TaskState::NotCompletable.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = TaskState::Pending;
        state.advance(TaskState::Running).unwrap();
        state.advance(TaskState::Successful).unwrap();
        assert_eq!(state, TaskState::Successful);
    }

    #[test]
    fn test_retry_transition() {
        let mut state = TaskState::Pending;
        state.advance(TaskState::Running).unwrap();
        state.advance(TaskState::Pending).unwrap();
        state.advance(TaskState::Running).unwrap();
        state.advance(TaskState::Failed).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [TaskState::Successful, TaskState::NotCompletable, TaskState::Failed] {
            for next in [
                TaskState::Pending,
                TaskState::Running,
                TaskState::Successful,
                TaskState::NotCompletable,
                TaskState::Failed,
            ] {
                let mut state = terminal;
                let err = state.advance(next).unwrap_err();
                assert!(matches!(err, ReplicationError::InvalidState { .. }));
                assert_eq!(state, terminal);
            }
        }
    }

    #[test]
    fn test_pending_cannot_complete_without_running() {
        assert!(!TaskState::Pending.can_transition_to(TaskState::Successful));
        assert!(!TaskState::Pending.can_transition_to(TaskState::NotCompletable));
    }

    #[test]
    fn test_from_run_status() {
        assert_eq!(TaskState::from(RunStatus::Successful), TaskState::Successful);
        assert_eq!(TaskState::from(RunStatus::NotCompletable), TaskState::NotCompletable);
        assert_eq!(TaskState::from(RunStatus::Failed), TaskState::Failed);
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskState::NotCompletable.to_string(), "NotCompletable");
        assert_eq!(ExecutorState::Draining.to_string(), "Draining");
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.record(TaskState::Successful);
        summary.record(TaskState::NotCompletable);
        summary.record(TaskState::Failed);
        summary.record(TaskState::Running);
        assert_eq!(summary.completed(), 3);
        assert_eq!(summary.lost, 1);
    }
}
