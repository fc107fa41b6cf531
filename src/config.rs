//! Configuration for metadata replication.
//!
//! Configuration is passed to [`TaskExecutor::new()`](crate::executor::TaskExecutor::new)
//! and can be constructed programmatically or deserialized from JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use metastore_replication::config::ReplicationConfig;
//!
//! let config = ReplicationConfig::for_testing("primary", "replica");
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! ReplicationConfig
//! ├── source: ClusterConfig        # Cluster events come from
//! ├── destination: ClusterConfig   # Cluster tasks write to
//! └── executor: ExecutorConfig
//!     ├── worker_count / queue_capacity
//!     ├── lock_timeout / drain_timeout
//!     ├── retry: RetrySettings     # Attempt budget and backoff
//!     ├── circuit: CircuitSettings # Destination circuit breaker
//!     ├── rate_limit_*             # Dispatch rate limiting
//!     └── slo: SloConfig           # Latency thresholds for warnings
//! ```
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "source": { "name": "warehouse-east" },
//!   "destination": { "name": "warehouse-west", "endpoint": "thrift://west:9083" },
//!   "executor": {
//!     "worker_count": 16,
//!     "lock_timeout": "45s",
//!     "retry": { "max_attempts": 8, "initial_delay": "500ms" }
//!   }
//! }
//! ```
//!
//! Durations are human-readable strings (`"250ms"`, `"30s"`, `"5m"`). An
//! unparsable duration falls back to its default at use time;
//! [`ReplicationConfig::validate()`] reports it.

use crate::circuit_breaker::CircuitConfig;
use crate::error::{ReplicationError, Result};
use crate::resilience::{RateLimitConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level replication config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    pub source: ClusterConfig,
    pub destination: ClusterConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl ReplicationConfig {
    /// Minimal config with fast timeouts, for tests.
    pub fn for_testing(source: &str, destination: &str) -> Self {
        Self {
            source: ClusterConfig::named(source),
            destination: ClusterConfig::named(destination),
            executor: ExecutorConfig::for_testing(),
        }
    }

    /// Parse from a JSON string. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ReplicationError::Config(format!("invalid config: {}", e)))
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ReplicationError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }

    /// Check the config for values the executor cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.source.name.trim().is_empty() {
            return Err(ReplicationError::Config("source cluster name is empty".into()));
        }
        if self.destination.name.trim().is_empty() {
            return Err(ReplicationError::Config("destination cluster name is empty".into()));
        }
        if self.source.name == self.destination.name {
            return Err(ReplicationError::Config(format!(
                "source and destination are the same cluster '{}'",
                self.source.name
            )));
        }
        self.executor.validate()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ClusterConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Identity of one cluster.
///
/// The catalog client itself is built by the caller; `endpoint` is carried
/// for whoever builds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ClusterConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ExecutorConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Task executor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum tasks running at once.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Capacity of the task queue feeding the executor.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long one attempt may wait for its locks (e.g. "30s").
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: String,

    /// How long shutdown waits for in-flight tasks.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: String,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub circuit: CircuitSettings,

    // ─────────────────────────────────────────────────────────────────────────
    // Rate Limiting
    // ─────────────────────────────────────────────────────────────────────────

    /// Cap the task dispatch rate.
    #[serde(default = "default_false")]
    pub rate_limit_enabled: bool,

    /// Sustained dispatches per second.
    #[serde(default = "default_rate_limit_per_sec")]
    pub rate_limit_per_sec: u32,

    /// Burst allowance above the sustained rate.
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,

    #[serde(default)]
    pub slo: SloConfig,
}

fn default_worker_count() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_lock_timeout() -> String {
    "30s".to_string()
}

fn default_drain_timeout() -> String {
    "30s".to_string()
}

fn default_false() -> bool {
    false
}

fn default_rate_limit_per_sec() -> u32 {
    100
}

fn default_rate_limit_burst() -> u32 {
    20
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: 8,
            queue_capacity: 1024,
            lock_timeout: "30s".to_string(),
            drain_timeout: "30s".to_string(),
            retry: RetrySettings::default(),
            circuit: CircuitSettings::default(),
            rate_limit_enabled: false,
            rate_limit_per_sec: 100,
            rate_limit_burst: 20,
            slo: SloConfig::default(),
        }
    }
}

impl ExecutorConfig {
    /// Small pool, short timeouts, fast retries.
    pub fn for_testing() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 64,
            lock_timeout: "2s".to_string(),
            drain_timeout: "5s".to_string(),
            retry: RetrySettings {
                max_attempts: 3,
                initial_delay: "10ms".to_string(),
                max_delay: "100ms".to_string(),
                backoff_factor: 2.0,
                attempt_timeout: "5s".to_string(),
            },
            circuit: CircuitSettings {
                failure_threshold: 50,
                success_threshold: 1,
                recovery_timeout: "50ms".to_string(),
            },
            ..Self::default()
        }
    }

    pub fn lock_timeout_duration(&self) -> Duration {
        parse_or(&self.lock_timeout, Duration::from_secs(30))
    }

    pub fn drain_timeout_duration(&self) -> Duration {
        parse_or(&self.drain_timeout, Duration::from_secs(30))
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.to_retry_config()
    }

    pub fn circuit_config(&self) -> CircuitConfig {
        self.circuit.to_circuit_config()
    }

    /// `None` if rate limiting is disabled.
    pub fn rate_limit_config(&self) -> Option<RateLimitConfig> {
        if self.rate_limit_enabled {
            Some(RateLimitConfig {
                burst_size: self.rate_limit_burst,
                refill_rate: self.rate_limit_per_sec,
            })
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(ReplicationError::Config("worker_count must be > 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ReplicationError::Config("queue_capacity must be > 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ReplicationError::Config("retry.max_attempts must be > 0".into()));
        }
        if !(self.retry.backoff_factor >= 1.0 && self.retry.backoff_factor.is_finite()) {
            return Err(ReplicationError::Config(format!(
                "retry.backoff_factor must be >= 1.0, got {}",
                self.retry.backoff_factor
            )));
        }
        if self.circuit.failure_threshold == 0 {
            return Err(ReplicationError::Config("circuit.failure_threshold must be > 0".into()));
        }
        if self.rate_limit_enabled && self.rate_limit_per_sec == 0 {
            return Err(ReplicationError::Config("rate_limit_per_sec must be > 0".into()));
        }
        for (field, value) in [
            ("lock_timeout", &self.lock_timeout),
            ("drain_timeout", &self.drain_timeout),
            ("retry.initial_delay", &self.retry.initial_delay),
            ("retry.max_delay", &self.retry.max_delay),
            ("retry.attempt_timeout", &self.retry.attempt_timeout),
            ("circuit.recovery_timeout", &self.circuit.recovery_timeout),
        ] {
            humantime::parse_duration(value)
                .map_err(|e| ReplicationError::Config(format!("{}: invalid duration '{}': {}", field, value, e)))?;
        }
        Ok(())
    }
}

fn parse_or(value: &str, fallback: Duration) -> Duration {
    humantime::parse_duration(value).unwrap_or(fallback)
}

// ═══════════════════════════════════════════════════════════════════════════════
// RetrySettings / CircuitSettings: serde faces of resilience configs
// ═══════════════════════════════════════════════════════════════════════════════

/// Retry policy as it appears in config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay: String,

    #[serde(default = "default_max_delay")]
    pub max_delay: String,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound for one task run.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout: String,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> String {
    "200ms".to_string()
}

fn default_max_delay() -> String {
    "30s".to_string()
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_attempt_timeout() -> String {
    "60s".to_string()
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: "200ms".to_string(),
            max_delay: "30s".to_string(),
            backoff_factor: 2.0,
            attempt_timeout: "60s".to_string(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: parse_or(&self.initial_delay, defaults.initial_delay),
            max_delay: parse_or(&self.max_delay, defaults.max_delay),
            backoff_factor: self.backoff_factor,
            attempt_timeout: parse_or(&self.attempt_timeout, defaults.attempt_timeout),
        }
    }
}

/// Circuit breaker settings as they appear in config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSettings {
    #[serde(default = "default_circuit_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_circuit_success_threshold")]
    pub success_threshold: u32,

    #[serde(default = "default_circuit_recovery_timeout")]
    pub recovery_timeout: String,
}

fn default_circuit_failure_threshold() -> u32 {
    5
}

fn default_circuit_success_threshold() -> u32 {
    2
}

fn default_circuit_recovery_timeout() -> String {
    "30s".to_string()
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: "30s".to_string(),
        }
    }
}

impl CircuitSettings {
    pub fn to_circuit_config(&self) -> CircuitConfig {
        CircuitConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            recovery_timeout: parse_or(&self.recovery_timeout, Duration::from_secs(30)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SloConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Latency thresholds. Exceeding one logs a warning; it never fails a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SloConfig {
    /// Maximum acceptable wait for a task's locks (ms).
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,

    /// Maximum acceptable single task run (ms).
    #[serde(default = "default_max_task_run_ms")]
    pub max_task_run_ms: u64,
}

fn default_max_lock_wait_ms() -> u64 {
    5_000
}

fn default_max_task_run_ms() -> u64 {
    10_000
}

impl Default for SloConfig {
    fn default() -> Self {
        Self {
            max_lock_wait_ms: 5_000,
            max_task_run_ms: 10_000,
        }
    }
}

impl SloConfig {
    pub fn is_lock_wait_violation(&self, waited: Duration) -> bool {
        waited.as_millis() as u64 > self.max_lock_wait_ms
    }

    pub fn is_task_run_violation(&self, took: Duration) -> bool {
        took.as_millis() as u64 > self.max_task_run_ms
    }
}
