//! Fuzz target for lock set construction.
//!
//! Whatever order requests arrive in, each key ends up once, holding the
//! strongest requested mode.

#![no_main]

use libfuzzer_sys::fuzz_target;
use metastore_replication::{LockRequest, LockSet, LockType};
use std::collections::HashMap;

fuzz_target!(|requests: Vec<(u8, bool)>| {
    let mut locks = LockSet::new();
    let mut strongest: HashMap<String, LockType> = HashMap::new();

    for (key, exclusive) in requests {
        let key = format!("db.t{}", key % 16);
        let request = if exclusive {
            LockRequest::exclusive(key.clone())
        } else {
            LockRequest::shared(key.clone())
        };
        let mode = request.lock_type;
        locks.add(request);
        let entry = strongest.entry(key).or_insert(mode);
        if mode > *entry {
            *entry = mode;
        }
    }

    assert_eq!(locks.len(), strongest.len());
    for (key, mode) in &strongest {
        assert_eq!(locks.get(key), Some(*mode));
    }

    // Keys come out sorted
    let keys = locks.keys();
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
});
