//! Resilience utilities: retry backoff, rate limiting, bulkheads.
//!
//! Used by the [executor](crate::executor) around every task:
//!
//! - [`RetryConfig`]: attempt budget and exponential backoff for retryable errors
//! - [`RateLimiter`]: token bucket pacing task dispatch
//! - [`Bulkhead`]: semaphore capping how many tasks run at once

use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovLimiter,
};
use crate::error::{ReplicationError, Result};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Retry policy for a single task.
///
/// An attempt is one lock acquisition plus one task run. Only errors whose
/// [`is_retryable()`](crate::error::ReplicationError::is_retryable) is true
/// are retried; every retry re-runs the full token check.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first. `u32::MAX` retries forever.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Ceiling for exponential backoff.
    pub max_delay: Duration,

    /// Backoff multiplier (2.0 doubles the delay each retry).
    pub backoff_factor: f64,

    /// Upper bound for one task run. An attempt that exceeds it fails with a
    /// retryable timeout and its mutation state is unknown.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Retry for a long catalog outage before giving up.
    ///
    /// # Backoff Schedule
    ///
    /// ```text
    /// Retry  Delay
    /// -----  -----
    /// 1      1s
    /// 2      2s
    /// 3      4s
    /// ...
    /// 9+     300s (cap)
    /// ```
    pub fn patient() -> Self {
        Self {
            max_attempts: 20,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            backoff_factor: 2.0,
            attempt_timeout: Duration::from_secs(120),
        }
    }

    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Fast-fail retry for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    /// Delay before retry number `retry` (1-indexed).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 {
            return self.initial_delay;
        }

        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let delay_secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs.max(0.0))
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

// =============================================================================
// Dispatch rate
// =============================================================================

/// Token bucket for task dispatch: `refill_rate` tasks per second
/// sustained, up to `burst_size` at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub burst_size: u32,
    pub refill_rate: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst_size: 20,
            refill_rate: 100,
        }
    }
}

type DirectLimiter = GovLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Paces task dispatch so a backlog does not hammer the destination catalog.
pub struct RateLimiter {
    limiter: DirectLimiter,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Zero rates are clamped to one.
    pub fn new(config: RateLimitConfig) -> Self {
        let per_second = NonZeroU32::new(config.refill_rate).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: GovLimiter::direct(Quota::per_second(per_second).allow_burst(burst)),
            config,
        }
    }

    /// Take a dispatch slot, waiting for a refill if the bucket is empty.
    ///
    /// Returns `true` if the caller had to wait.
    pub async fn pace(&self) -> bool {
        if self.limiter.check().is_ok() {
            return false;
        }
        self.limiter.until_ready().await;
        true
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").field("config", &self.config).finish()
    }
}

// =============================================================================
// Worker slots
// =============================================================================

/// Caps how many tasks are in flight.
///
/// A task holds its slot for its whole lifetime, backoff sleeps included.
#[derive(Debug)]
pub struct Bulkhead {
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl Bulkhead {
    /// Bulkhead sized for a worker pool (at least one slot).
    pub fn for_workers(workers: usize) -> Self {
        let capacity = workers.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot. The slot frees when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ReplicationError::Internal("worker slots closed".to_string()))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held by running tasks.
    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.slots.available_permits())
    }
}
