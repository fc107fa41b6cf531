//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for all inputs,
//! helping catch edge cases that unit tests might miss.

mod common;

use common::{stamped, Clusters};
use metastore_replication::lock::{LockRequest, LockSet, LockType};
use metastore_replication::resilience::RetryConfig;
use metastore_replication::{ObjectSpec, RunStatus};
use proptest::prelude::*;
use std::time::Duration;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,15}"
}

fn partition_name() -> impl Strategy<Value = String> {
    "[a-z]{1,4}=[0-9a-z-]{1,10}(/[a-z]{1,4}=[0-9]{1,3}){0,2}"
}

fn token() -> impl Strategy<Value = String> {
    "v[0-9]{1,6}"
}

fn spec() -> impl Strategy<Value = ObjectSpec> {
    (name(), name(), proptest::option::of(partition_name())).prop_map(|(ns, obj, sub)| match sub {
        Some(sub) => ObjectSpec::partition(ns, obj, sub),
        None => ObjectSpec::table(ns, obj),
    })
}

// =============================================================================
// ObjectSpec Properties
// =============================================================================

proptest! {
    /// Canonical form parses back to the same spec.
    #[test]
    fn object_spec_display_parse_roundtrip(spec in spec()) {
        let parsed: ObjectSpec = spec.to_string().parse().unwrap();
        prop_assert_eq!(parsed, spec);
    }

    /// Parsing arbitrary input never panics.
    #[test]
    fn object_spec_parse_never_panics(input in ".{0,64}") {
        let _ = input.parse::<ObjectSpec>();
    }

    /// A partition's parent is the table with the same namespace and name.
    #[test]
    fn partition_parent_is_owning_table(ns in name(), obj in name(), sub in partition_name()) {
        let part = ObjectSpec::partition(ns.clone(), obj.clone(), sub);
        let parent = part.parent().unwrap();
        prop_assert_eq!(&parent, &ObjectSpec::table(ns, obj));
        prop_assert!(parent.is_parent_of(&part));
        prop_assert!(parent.parent().is_none());
    }
}

// =============================================================================
// LockSet Properties
// =============================================================================

proptest! {
    /// The strongest requested mode wins, regardless of order.
    #[test]
    fn lock_set_keeps_strongest_mode(modes in prop::collection::vec(any::<bool>(), 1..10)) {
        let mut locks = LockSet::new();
        for exclusive in &modes {
            locks.add(if *exclusive {
                LockRequest::exclusive("sales.orders")
            } else {
                LockRequest::shared("sales.orders")
            });
        }
        let expected = if modes.iter().any(|m| *m) { LockType::Exclusive } else { LockType::Shared };
        prop_assert_eq!(locks.len(), 1);
        prop_assert_eq!(locks.get("sales.orders"), Some(expected));
    }

    /// Declared locks depend only on the task, never on catalog state.
    #[test]
    fn required_locks_are_deterministic(spec in spec(), other in spec()) {
        let env = Clusters::new();
        let before = env.drop(&spec, Some("v1")).required_locks();
        env.dest_catalog.insert(stamped(&spec, "v2"));
        let after = env.drop(&spec, Some("v1")).required_locks();
        prop_assert_eq!(&before, &after);
        prop_assert_eq!(before.get(&spec.key()), Some(LockType::Exclusive));

        let rename = env.rename(&spec, &other, Some("v1")).required_locks();
        prop_assert_eq!(rename.get(&other.key()), Some(LockType::Exclusive));
    }

    /// Partition tasks hold their table in shared mode unless the table is also exclusive.
    #[test]
    fn partition_tasks_share_parent(ns in name(), obj in name(), sub in partition_name()) {
        let env = Clusters::new();
        let part = ObjectSpec::partition(ns, obj, sub);
        let parent = part.parent().unwrap();
        for task in [env.drop(&part, Some("v1")), env.create(&part, Some("v1")), env.alter(&part, Some("v1"))] {
            let locks = task.required_locks();
            prop_assert_eq!(locks.get(&parent.key()), Some(LockType::Shared));
            prop_assert_eq!(locks.get(&part.key()), Some(LockType::Exclusive));
        }
    }
}

// =============================================================================
// Token Guard Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A drop never mutates a destination whose token differs from the expected one.
    #[test]
    fn drop_never_mutates_on_token_mismatch(spec in spec(), expected in token(), actual in token()) {
        prop_assume!(expected != actual);
        let env = Clusters::new();
        env.dest_catalog.insert(stamped(&spec, &actual));

        let info = block_on(env.drop(&spec, Some(&expected)).run()).unwrap();

        prop_assert_eq!(info.status(), RunStatus::NotCompletable);
        prop_assert_eq!(env.dest_catalog.mutation_count(), 0);
        prop_assert_eq!(env.dest_token(&spec), Some(actual));
    }

    /// No task kind mutates anything without an expected token.
    #[test]
    fn absent_token_never_mutates(spec in spec(), other in spec(), actual in token()) {
        let env = Clusters::new();
        env.dest_catalog.insert(stamped(&spec, &actual));
        env.source_catalog.insert(stamped(&spec, &actual));

        let tasks = [
            env.create(&spec, None),
            env.drop(&spec, None),
            env.alter(&spec, None),
            env.rename(&spec, &other, None),
        ];
        for task in &tasks {
            let info = block_on(task.run()).unwrap();
            prop_assert_eq!(info.status(), RunStatus::NotCompletable);
        }
        prop_assert_eq!(env.dest_catalog.mutation_count(), 0);
        prop_assert_eq!(env.dest_catalog.get_count(), 0);
    }

    /// With a matching token, alter always lands the source's token.
    #[test]
    fn alter_with_matching_token_lands_source_state(spec in spec(), old in token(), new in token()) {
        let env = Clusters::new();
        env.dest_catalog.insert(stamped(&spec, &old));
        env.source_catalog.insert(stamped(&spec, &new));

        let info = block_on(env.alter(&spec, Some(&old)).run()).unwrap();

        prop_assert_eq!(info.status(), RunStatus::Successful);
        prop_assert_eq!(env.dest_token(&spec), Some(new));
    }
}

// =============================================================================
// Retry Backoff Properties
// =============================================================================

proptest! {
    /// Backoff never decreases and never exceeds max_delay.
    #[test]
    fn backoff_monotonic_and_capped(
        initial_ms in 1u64..1000,
        max_ms in 1000u64..60_000,
        factor in 1.0f64..4.0,
        retries in 1u32..64,
    ) {
        let config = RetryConfig {
            max_attempts: retries + 1,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            backoff_factor: factor,
            attempt_timeout: Duration::from_secs(1),
        };
        let mut previous = Duration::ZERO;
        for retry in 1..=retries {
            let delay = config.delay_for_attempt(retry);
            prop_assert!(delay >= previous);
            prop_assert!(delay <= config.max_delay);
            previous = delay;
        }
    }

    /// Huge retry counts saturate instead of overflowing.
    #[test]
    fn backoff_saturates(retry in 1000u32..u32::MAX) {
        let config = RetryConfig::default();
        prop_assert_eq!(config.delay_for_attempt(retry), config.max_delay);
    }
}
