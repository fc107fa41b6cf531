// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Run results.
//!
//! A task run ends in one of:
//!
//! | Status | Terminal | Meaning |
//! |--------|----------|---------|
//! | `Successful` | Yes | Destination now reflects the source event |
//! | `NotCompletable` | Yes | Preconditions for a safe mutation did not hold; nothing changed |
//! | `Failed` | After retries | A service error propagated; set by the executor |
//!
//! Tasks themselves only produce `Successful` or `NotCompletable`. Service
//! errors travel as `Err(ReplicationError)` so the executor can tell
//! "safe to mark done" from "must retry".

use crate::token::VersionToken;
use std::fmt;

/// Outcome status of one task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Successful,
    NotCompletable,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Successful => "successful",
            Self::NotCompletable => "not_completable",
            Self::Failed => "failed",
        }
    }

    /// Done, do not retry.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Successful | Self::NotCompletable)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task abstained from mutating the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Abstention {
    /// No source token on the event or on the source object; any mutation
    /// could undo newer state.
    MissingSourceToken,
    /// Nothing at the destination to act on.
    DestinationMissing,
    /// Destination holds a different version than the event was computed against.
    TokenMismatch {
        expected: VersionToken,
        actual: Option<VersionToken>,
    },
    /// Source object no longer exists; a later event owns it.
    SourceMissing,
    /// Partition's table is missing on the destination.
    ParentMissing,
    /// Rename target name is already taken on the destination.
    RenameTargetExists,
}

impl Abstention {
    /// Short label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingSourceToken => "missing_source_token",
            Self::DestinationMissing => "destination_missing",
            Self::TokenMismatch { .. } => "token_mismatch",
            Self::SourceMissing => "source_missing",
            Self::ParentMissing => "parent_missing",
            Self::RenameTargetExists => "rename_target_exists",
        }
    }
}

impl fmt::Display for Abstention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(token: &Option<VersionToken>) -> String {
            token
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "<none>".to_string())
        }
        match self {
            Self::TokenMismatch { expected, actual } => write!(
                f,
                "token mismatch (expected {}, destination {})",
                expected,
                show(actual)
            ),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of executing a task once. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    status: RunStatus,
    bytes_processed: u64,
    abstention: Option<Abstention>,
}

impl RunInfo {
    pub fn successful(bytes_processed: u64) -> Self {
        Self {
            status: RunStatus::Successful,
            bytes_processed,
            abstention: None,
        }
    }

    pub fn not_completable(reason: Abstention) -> Self {
        Self {
            status: RunStatus::NotCompletable,
            bytes_processed: 0,
            abstention: Some(reason),
        }
    }

    /// Permanent failure, recorded by the executor after its retry budget.
    pub fn failed() -> Self {
        Self {
            status: RunStatus::Failed,
            bytes_processed: 0,
            abstention: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    /// Reason for a `NotCompletable` result.
    pub fn abstention(&self) -> Option<&Abstention> {
        self.abstention.as_ref()
    }

    pub fn is_successful(&self) -> bool {
        self.status == RunStatus::Successful
    }

    pub fn is_not_completable(&self) -> bool {
        self.status == RunStatus::NotCompletable
    }
}
