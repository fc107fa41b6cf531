// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Drop replication.
//!
//! Deletes the destination object only if it still holds the version that
//! was current on the source when the drop happened there. A destination that
//! was re-created or altered since is left alone.

use crate::cluster::Cluster;
use crate::error::Result;
use crate::lock::LockSet;
use crate::object::ObjectSpec;
use crate::result::{Abstention, RunInfo};
use crate::token::{self, ExpectedToken, TokenCheck};
use tracing::debug;

/// Replays a table or partition drop.
#[derive(Debug, Clone)]
pub struct DropTask {
    source: Cluster,
    destination: Cluster,
    spec: ObjectSpec,
    expected: ExpectedToken,
}

impl DropTask {
    pub fn new(source: Cluster, destination: Cluster, spec: ObjectSpec, expected: ExpectedToken) -> Self {
        Self {
            source,
            destination,
            spec,
            expected,
        }
    }

    pub fn source(&self) -> &Cluster {
        &self.source
    }

    pub fn destination(&self) -> &Cluster {
        &self.destination
    }

    pub fn spec(&self) -> &ObjectSpec {
        &self.spec
    }

    pub fn expected(&self) -> &ExpectedToken {
        &self.expected
    }

    pub fn required_locks(&self) -> LockSet {
        super::target_locks(&self.spec)
    }

    /// Drop the destination object if its token matches.
    ///
    /// Issues at most one `drop_object(spec, cascade = true)` call.
    pub async fn run(&self) -> Result<RunInfo> {
        let Some(expected) = self.expected.as_token() else {
            debug!(spec = %self.spec, "No source token on drop event, skipping");
            return Ok(RunInfo::not_completable(Abstention::MissingSourceToken));
        };

        let existing = self.destination.fetch(&self.spec).await?;
        match token::check(expected, existing.as_ref()) {
            TokenCheck::Absent => {
                debug!(spec = %self.spec, "Destination object already gone");
                Ok(RunInfo::not_completable(Abstention::DestinationMissing))
            }
            TokenCheck::Diverged { actual } => {
                debug!(
                    spec = %self.spec,
                    expected = %expected,
                    actual = ?actual,
                    "Destination token differs, not dropping"
                );
                Ok(RunInfo::not_completable(Abstention::TokenMismatch {
                    expected: expected.clone(),
                    actual,
                }))
            }
            TokenCheck::Matches(_) => {
                self.destination.drop_cascade(&self.spec).await?;
                debug!(spec = %self.spec, token = %expected, "Dropped destination object");
                Ok(RunInfo::successful(0))
            }
        }
    }
}
