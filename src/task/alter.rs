// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Alter replication.

use crate::cluster::Cluster;
use crate::error::Result;
use crate::lock::LockSet;
use crate::object::ObjectSpec;
use crate::result::{Abstention, RunInfo};
use crate::token::{self, ExpectedToken, TokenCheck};
use tracing::debug;

/// Replays an alter of a table or partition.
///
/// `expected` is the version the object had before the alter. The destination
/// must still hold it; the write then carries the source's current definition
/// and token, so a replay of the same event finds a mismatch and abstains.
#[derive(Debug, Clone)]
pub struct AlterTask {
    source: Cluster,
    destination: Cluster,
    spec: ObjectSpec,
    expected: ExpectedToken,
}

impl AlterTask {
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

    pub async fn run(&self) -> Result<RunInfo> {
        let Some(expected) = self.expected.as_token() else {
            debug!(spec = %self.spec, "No source token on alter event, skipping");
            return Ok(RunInfo::not_completable(Abstention::MissingSourceToken));
        };

        let existing = self.destination.fetch(&self.spec).await?;
        match token::check(expected, existing.as_ref()) {
            TokenCheck::Absent => {
                debug!(spec = %self.spec, "Nothing to alter at destination");
                return Ok(RunInfo::not_completable(Abstention::DestinationMissing));
            }
            TokenCheck::Diverged { actual } => {
                debug!(
                    spec = %self.spec,
                    expected = %expected,
                    actual = ?actual,
                    "Destination token differs, not altering"
                );
                return Ok(RunInfo::not_completable(Abstention::TokenMismatch {
                    expected: expected.clone(),
                    actual,
                }));
            }
            TokenCheck::Matches(_) => {}
        }

        let Some(source_object) = self.source.fetch(&self.spec).await? else {
            debug!(spec = %self.spec, "Source object gone since alter event");
            return Ok(RunInfo::not_completable(Abstention::SourceMissing));
        };

        let Some(new_token) = source_object.token().map(str::to_string) else {
            debug!(spec = %self.spec, "Source object carries no token, not altering");
            return Ok(RunInfo::not_completable(Abstention::MissingSourceToken));
        };

        // Parameters (token included) travel verbatim from the source.
        let object = source_object.with_spec(self.spec.clone());
        self.destination.alter(&self.spec, object).await?;
        debug!(
            spec = %self.spec,
            from = %expected,
            to = %new_token,
            "Altered destination object"
        );
        Ok(RunInfo::successful(0))
    }
}
