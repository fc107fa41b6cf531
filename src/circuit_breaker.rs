//! Circuit breaker for catalog protection.
//!
//! When a catalog service keeps failing, every queued task would otherwise
//! burn its retry budget against it. The executor runs each attempt through a
//! [`CircuitBreaker`]; once it trips, attempts fail fast with a retryable
//! `CircuitOpen` error until the recovery window has passed.
//!
//! # States
//!
//! - **Closed**: Normal operation, attempts pass through
//! - **Open**: Catalog unhealthy, attempts rejected without running
//! - **HalfOpen**: Probing recovery, limited attempts allowed
//!
//! # Usage
//!
//! ```rust,no_run
//! # use metastore_replication::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError};
//! # async fn example() {
//! let circuit = CircuitBreaker::new("catalog", CircuitConfig::default());
//!
//! match circuit.call(|| async { Ok::<(), String>(()) }).await {
//!     Ok(()) => { /* success */ }
//!     Err(CircuitError::Rejected) => { /* circuit open, back off */ }
//!     Err(CircuitError::Inner(e)) => { /* catalog error */ }
//! }
//! # }
//! ```

use crate::metrics;
use recloser::{AsyncRecloser, Error as RecloserError, Recloser};
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Circuit state as observed through calls.
///
/// recloser keeps its own state private, so this is inferred: a rejection
/// means open, an admitted call after a rejection means half-open, and
/// `success_threshold` admitted successes from there mean closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed = 0,
    HalfOpen = 1,
    Open = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::HalfOpen => "half_open",
            Self::Open => "open",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::HalfOpen,
            2 => Self::Open,
            _ => Self::Closed,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time call accounting for a breaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitStats {
    /// Calls offered to the breaker, admitted or not.
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
}

impl CircuitStats {
    /// Share of admitted calls that failed (0.0 - 1.0).
    pub fn failure_rate(&self) -> f64 {
        let admitted = self.successes + self.failures;
        if admitted == 0 {
            return 0.0;
        }
        self.failures as f64 / admitted as f64
    }
}

/// Error type for circuit-protected operations.
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    /// The circuit breaker rejected the call (circuit is open).
    #[error("circuit breaker open, request rejected")]
    Rejected,

    /// The underlying operation failed.
    #[error("operation failed: {0}")]
    Inner(#[source] E),
}

impl<E> CircuitError<E> {
    pub fn is_rejected(&self) -> bool {
        matches!(self, CircuitError::Rejected)
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitError::Inner(e) => Some(e),
            CircuitError::Rejected => None,
        }
    }
}

impl<E> From<RecloserError<E>> for CircuitError<E> {
    fn from(err: RecloserError<E>) -> Self {
        match err {
            RecloserError::Rejected => CircuitError::Rejected,
            RecloserError::Inner(e) => CircuitError::Inner(e),
        }
    }
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitConfig {
    /// Consecutive failures that trip the circuit.
    pub failure_threshold: u32,
    /// Consecutive successes in half-open that close it again.
    pub success_threshold: u32,
    /// How long the circuit stays open before probing.
    pub recovery_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitConfig {
    /// Trips faster and recovers cautiously. For a fragile destination.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
        }
    }

    /// Tolerates more failures before tripping.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 1,
            recovery_timeout: Duration::from_secs(15),
        }
    }

    /// Fast recovery for tests.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            failure_threshold: 2,
            success_threshold: 1,
            recovery_timeout: Duration::from_millis(50),
        }
    }
}

/// A named circuit breaker guarding one catalog.
pub struct CircuitBreaker {
    name: String,
    inner: AsyncRecloser,
    success_threshold: u32,

    state: AtomicU8,
    probe_successes: AtomicU32,

    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitConfig) -> Self {
        let threshold = config.failure_threshold.max(1);
        let success_threshold = config.success_threshold.max(1);
        // Trip only when the whole closed window failed.
        let error_rate = (threshold - 1) as f32 / threshold as f32;
        let recloser = Recloser::custom()
            .error_rate(error_rate)
            .closed_len(threshold as usize)
            .half_open_len(success_threshold as usize)
            .open_wait(config.recovery_timeout)
            .build();

        let name = name.into();
        metrics::set_circuit_state(&name, CircuitState::Closed.as_str());
        Self {
            name,
            inner: recloser.into(),
            success_threshold,
            state: AtomicU8::new(CircuitState::Closed as u8),
            probe_successes: AtomicU32::new(0),
            calls: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn stats(&self) -> CircuitStats {
        CircuitStats {
            calls: self.calls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }

    /// Run `f` through the breaker.
    ///
    /// `f` is only invoked when the circuit admits the call.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.calls.fetch_add(1, Ordering::Relaxed);

        match self.inner.call(f()).await {
            Ok(result) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                metrics::record_circuit_call(&self.name, "success");
                self.on_admitted(true);
                Ok(result)
            }
            Err(RecloserError::Inner(e)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                metrics::record_circuit_call(&self.name, "failure");
                debug!(circuit = %self.name, "Circuit call failed");
                self.on_admitted(false);
                Err(CircuitError::Inner(e))
            }
            Err(RecloserError::Rejected) => {
                self.rejections.fetch_add(1, Ordering::Relaxed);
                metrics::record_circuit_rejection(&self.name);
                self.transition(CircuitState::Open);
                Err(CircuitError::Rejected)
            }
        }
    }

    fn on_admitted(&self, success: bool) {
        let state = self.state();
        if state == CircuitState::Closed {
            return;
        }
        if !success {
            self.probe_successes.store(0, Ordering::Relaxed);
            self.transition(CircuitState::Open);
            return;
        }

        // Admitted after a rejection: recloser is probing.
        let probes = if state == CircuitState::Open {
            self.probe_successes.store(1, Ordering::Relaxed);
            1
        } else {
            self.probe_successes.fetch_add(1, Ordering::Relaxed) + 1
        };
        self.transition(CircuitState::HalfOpen);
        if probes >= self.success_threshold {
            self.transition(CircuitState::Closed);
        }
    }

    fn transition(&self, next: CircuitState) {
        let prev = CircuitState::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        if prev == next {
            return;
        }
        metrics::set_circuit_state(&self.name, next.as_str());
        match next {
            CircuitState::Open => warn!(circuit = %self.name, from = %prev, "Circuit opened"),
            CircuitState::HalfOpen => info!(circuit = %self.name, "Circuit half-open, probing"),
            CircuitState::Closed => info!(circuit = %self.name, "Circuit closed"),
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
