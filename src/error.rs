// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for metadata replication.
//!
//! A task that decides *not* to mutate the destination does not produce an
//! error: it returns a `NotCompletable` [`RunInfo`](crate::result::RunInfo).
//! Errors are reserved for things the executor may need to retry or escalate.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Catalog` | Yes | Catalog service failure (unreachable, timeout, denied) |
//! | `LockTimeout` | Yes | Declared locks not granted in time |
//! | `CircuitOpen` | Yes | Destination catalog circuit is open |
//! | `AttemptTimeout` | Yes | Task run exceeded its time limit; outcome unknown |
//! | `LockManager` | No | Lock manager unusable (closed, poisoned) |
//! | `Config` | No | Configuration invalid |
//! | `InvalidState` | No | Executor state machine violation |
//! | `Shutdown` | No | Executor no longer takes tasks |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! Use [`ReplicationError::is_retryable()`] to decide whether the executor
//! should requeue the task with backoff. Any catalog failure counts as
//! transient; the executor's attempt budget decides when to give up.

use crate::catalog::CatalogError;
use crate::object::ObjectSpec;
use thiserror::Error;

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Errors that can occur while executing replication tasks.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// Catalog service call failed.
    ///
    /// Propagated unchanged from the catalog client of either cluster.
    #[error("Catalog error ({operation} {spec} on {cluster}): {source}")]
    Catalog {
        cluster: String,
        operation: &'static str,
        spec: ObjectSpec,
        #[source]
        source: CatalogError,
    },

    /// Locks were not granted within the configured timeout.
    #[error("Timed out after {waited_ms}ms acquiring locks for {keys:?}")]
    LockTimeout { keys: Vec<String>, waited_ms: u64 },

    /// The destination circuit breaker rejected the attempt.
    #[error("Circuit '{0}' open, attempt rejected")]
    CircuitOpen(String),

    /// A task run exceeded the attempt timeout. The mutation may or may not
    /// have been applied; the next attempt re-verifies the token.
    #[error("Attempt timed out after {timeout_ms}ms")]
    AttemptTimeout { timeout_ms: u64 },

    /// The lock manager could not serve the request.
    #[error("Lock manager error: {0}")]
    LockManager(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Executor state machine violation.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// The executor stopped taking tasks.
    #[error("Executor has shut down")]
    Shutdown,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReplicationError {
    /// Wrap a catalog failure with the call that produced it.
    pub fn catalog(
        cluster: impl Into<String>,
        operation: &'static str,
        spec: &ObjectSpec,
        source: CatalogError,
    ) -> Self {
        Self::Catalog {
            cluster: cluster.into(),
            operation,
            spec: spec.clone(),
            source,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Catalog { .. } => true,
            Self::LockTimeout { .. } => true,
            Self::CircuitOpen(_) => true,
            Self::AttemptTimeout { .. } => true,
            Self::LockManager(_) => false,
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
            Self::Shutdown => false,
            Self::Internal(_) => false,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Catalog { .. } => "catalog",
            Self::LockTimeout { .. } => "lock_timeout",
            Self::CircuitOpen(_) => "circuit_open",
            Self::AttemptTimeout { .. } => "attempt_timeout",
            Self::LockManager(_) => "lock_manager",
            Self::Config(_) => "config",
            Self::InvalidState { .. } => "invalid_state",
            Self::Shutdown => "shutdown",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogErrorKind;

    fn spec() -> ObjectSpec {
        ObjectSpec::table("sales", "orders")
    }

    #[test]
    fn test_is_retryable_catalog_unavailable() {
        let err = ReplicationError::catalog(
            "dest",
            "drop_object",
            &spec(),
            CatalogError::unavailable("connection reset"),
        );
        assert!(err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains("drop_object"));
        assert!(msg.contains("sales.orders"));
        assert!(msg.contains("dest"));
    }

    #[test]
    fn test_is_retryable_catalog_permission_denied() {
        // Anything from the catalog is treated as transient at this layer
        let err = ReplicationError::catalog(
            "dest",
            "get_object",
            &spec(),
            CatalogError::new(CatalogErrorKind::PermissionDenied, "no grant"),
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_is_retryable_lock_timeout() {
        let err = ReplicationError::LockTimeout {
            keys: vec!["sales.orders".to_string()],
            waited_ms: 30_000,
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("30000ms"));
    }

    #[test]
    fn test_is_retryable_circuit_open() {
        let err = ReplicationError::CircuitOpen("destination_catalog".to_string());
        assert!(err.is_retryable());
        assert!(err.to_string().contains("destination_catalog"));
    }

    #[test]
    fn test_is_retryable_attempt_timeout() {
        let err = ReplicationError::AttemptTimeout { timeout_ms: 250 };
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "attempt_timeout");
    }

    #[test]
    fn test_not_retryable_lock_manager() {
        let err = ReplicationError::LockManager("closed".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_retryable_config() {
        let err = ReplicationError::Config("worker_count must be > 0".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_retryable_invalid_state() {
        let err = ReplicationError::InvalidState {
            expected: "Running".to_string(),
            actual: "Pending".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Running"));
        assert!(err.to_string().contains("Pending"));
    }

    #[test]
    fn test_not_retryable_shutdown_and_internal() {
        assert!(!ReplicationError::Shutdown.is_retryable());
        assert!(!ReplicationError::Internal("bug".to_string()).is_retryable());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ReplicationError::Shutdown.kind(), "shutdown");
        assert_eq!(
            ReplicationError::CircuitOpen("x".to_string()).kind(),
            "circuit_open"
        );
    }

    #[test]
    fn test_catalog_error_source_chain() {
        use std::error::Error as _;
        let err = ReplicationError::catalog(
            "src",
            "get_object",
            &spec(),
            CatalogError::unavailable("refused"),
        );
        let source = err.source().expect("catalog error has a source");
        assert!(source.to_string().contains("refused"));
    }
}
