//! Fuzz target for object spec parsing.
//!
//! Parsing must never panic, and anything that parses must print back to
//! the same canonical form.

#![no_main]

use libfuzzer_sys::fuzz_target;
use metastore_replication::ObjectSpec;

fuzz_target!(|data: &str| {
    let Ok(spec) = data.parse::<ObjectSpec>() else {
        return;
    };

    // Canonical form round-trips
    let printed = spec.to_string();
    assert_eq!(printed, data);
    let reparsed: ObjectSpec = printed.parse().expect("canonical form must parse");
    assert_eq!(reparsed, spec);

    // A partition always has a table parent
    if let Some(parent) = spec.parent() {
        assert!(spec.is_partition());
        assert!(parent.is_parent_of(&spec));
        assert!(parent.parent().is_none());
    }
});
