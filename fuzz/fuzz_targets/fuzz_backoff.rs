//! Fuzz target for retry backoff calculation.
//!
//! Delays must stay within max_delay for any policy and attempt count,
//! without panicking on overflow.

#![no_main]

use libfuzzer_sys::fuzz_target;
use metastore_replication::resilience::RetryConfig;
use std::time::Duration;

fuzz_target!(|data: (u32, u64, u64, f64, u32)| {
    let (max_attempts, initial_ms, max_ms, factor, retry) = data;
    if !factor.is_finite() || factor < 0.0 {
        return;
    }

    let config = RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(initial_ms % 3_600_000),
        max_delay: Duration::from_millis(max_ms % 3_600_000),
        backoff_factor: factor,
        attempt_timeout: Duration::from_secs(1),
    };

    let delay = config.delay_for_attempt(retry);
    if retry > 0 {
        assert!(delay <= config.max_delay);
    }
    let _ = config.allows_retry(retry);
});
