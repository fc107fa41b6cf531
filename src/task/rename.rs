// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Rename replication.

use crate::cluster::Cluster;
use crate::error::Result;
use crate::lock::LockSet;
use crate::object::ObjectSpec;
use crate::result::{Abstention, RunInfo};
use crate::token::{self, ExpectedToken, TokenCheck, VersionToken};
use tracing::debug;

/// Replays a rename of a table or partition.
///
/// Renames only when the destination object under the old name holds the
/// expected version and the new name is free. The renamed object then takes
/// the source's current definition and token under the new name, so later
/// events on the new name find the token they were computed against. Holds
/// exclusive locks on both names.
#[derive(Debug, Clone)]
pub struct RenameTask {
    source: Cluster,
    destination: Cluster,
    spec: ObjectSpec,
    new_spec: ObjectSpec,
    expected: ExpectedToken,
}

impl RenameTask {
    pub fn new(
        source: Cluster,
        destination: Cluster,
        spec: ObjectSpec,
        new_spec: ObjectSpec,
        expected: ExpectedToken,
    ) -> Self {
        Self {
            source,
            destination,
            spec,
            new_spec,
            expected,
        }
    }

    pub fn source(&self) -> &Cluster {
        &self.source
    }

    pub fn destination(&self) -> &Cluster {
        &self.destination
    }

    /// Name before the rename.
    pub fn spec(&self) -> &ObjectSpec {
        &self.spec
    }

    pub fn new_spec(&self) -> &ObjectSpec {
        &self.new_spec
    }

    pub fn expected(&self) -> &ExpectedToken {
        &self.expected
    }

    pub fn required_locks(&self) -> LockSet {
        let mut locks = super::target_locks(&self.spec);
        super::add_target(&mut locks, &self.new_spec);
        locks
    }

    pub async fn run(&self) -> Result<RunInfo> {
        let Some(expected) = self.expected.as_token() else {
            debug!(from = %self.spec, to = %self.new_spec, "No source token on rename event, skipping");
            return Ok(RunInfo::not_completable(Abstention::MissingSourceToken));
        };

        let existing = self.destination.fetch(&self.spec).await?;
        match token::check(expected, existing.as_ref()) {
            TokenCheck::Absent => {
                let moved = self.destination.fetch(&self.new_spec).await?;
                if !matches!(token::check(expected, moved.as_ref()), TokenCheck::Matches(_)) {
                    debug!(from = %self.spec, "Nothing to rename at destination");
                    return Ok(RunInfo::not_completable(Abstention::DestinationMissing));
                }
                // Renamed by an earlier attempt that did not finish stamping.
                debug!(from = %self.spec, to = %self.new_spec, "Rename already applied");
            }
            TokenCheck::Diverged { actual } => {
                debug!(
                    from = %self.spec,
                    expected = %expected,
                    actual = ?actual,
                    "Destination token differs, not renaming"
                );
                return Ok(RunInfo::not_completable(Abstention::TokenMismatch {
                    expected: expected.clone(),
                    actual,
                }));
            }
            TokenCheck::Matches(_) => {
                if self.destination.fetch(&self.new_spec).await?.is_some() {
                    debug!(to = %self.new_spec, "Rename target already exists at destination");
                    return Ok(RunInfo::not_completable(Abstention::RenameTargetExists));
                }

                self.destination.rename(&self.spec, &self.new_spec).await?;
                debug!(from = %self.spec, to = %self.new_spec, "Renamed destination object");
            }
        }

        self.stamp_renamed(expected).await?;
        Ok(RunInfo::successful(0))
    }

    /// Bring the renamed object up to the source's version under the new name.
    async fn stamp_renamed(&self, expected: &VersionToken) -> Result<()> {
        let Some(source_object) = self.source.fetch(&self.new_spec).await? else {
            debug!(to = %self.new_spec, "Source has no object under the new name, keeping token");
            return Ok(());
        };
        match source_object.token().map(str::to_owned) {
            Some(current) if current != expected.as_str() => {
                let object = source_object.with_spec(self.new_spec.clone());
                self.destination.alter(&self.new_spec, object).await?;
                debug!(to = %self.new_spec, from = %expected, token = current.as_str(), "Stamped renamed object");
            }
            Some(_) => {}
            None => debug!(to = %self.new_spec, "Source object under the new name is unstamped"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{env, stamped, Env};
    use super::*;
    use crate::catalog::{CatalogError, CatalogOp, Mutation};
    use crate::error::ReplicationError;
    use crate::lock::LockType;

    fn rename_task(env: &Env, from: &ObjectSpec, to: &ObjectSpec, expected: ExpectedToken) -> RenameTask {
        RenameTask::new(
            env.source.clone(),
            env.destination.clone(),
            from.clone(),
            to.clone(),
            expected,
        )
    }

    #[tokio::test]
    async fn test_rename_moves_object() {
        let env = env();
        let from = ObjectSpec::table("db", "a");
        let to = ObjectSpec::table("db", "b");
        env.dest_catalog.insert(stamped(&from, "v1"));

        let info = rename_task(&env, &from, &to, ExpectedToken::present("v1"))
            .run()
            .await
            .unwrap();

        assert!(info.is_successful());
        assert!(!env.dest_catalog.contains(&from));
        assert_eq!(env.dest_catalog.object(&to).unwrap().token(), Some("v1"));
        assert_eq!(
            env.dest_catalog.mutations(),
            vec![Mutation::Rename { from: from.clone(), to: to.clone() }]
        );
    }

    #[tokio::test]
    async fn test_second_run_is_successful_without_mutation() {
        let env = env();
        let from = ObjectSpec::table("db", "a");
        let to = ObjectSpec::table("db", "b");
        env.dest_catalog.insert(stamped(&from, "v1"));
        let task = rename_task(&env, &from, &to, ExpectedToken::present("v1"));

        assert!(task.run().await.unwrap().is_successful());
        assert!(task.run().await.unwrap().is_successful());
        assert_eq!(env.dest_catalog.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_old_name_gone_and_new_name_foreign() {
        let env = env();
        let from = ObjectSpec::table("db", "a");
        let to = ObjectSpec::table("db", "b");
        env.dest_catalog.insert(stamped(&to, "v7"));

        let info = rename_task(&env, &from, &to, ExpectedToken::present("v1"))
            .run()
            .await
            .unwrap();

        assert_eq!(info.abstention(), Some(&Abstention::DestinationMissing));
        assert_eq!(env.dest_catalog.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_renamed_object_takes_source_token() {
        let env = env();
        let from = ObjectSpec::table("db", "a");
        let to = ObjectSpec::table("db", "b");
        env.dest_catalog.insert(stamped(&from, "v1"));
        env.source_catalog.insert(stamped(&to, "v2"));

        let info = rename_task(&env, &from, &to, ExpectedToken::present("v1"))
            .run()
            .await
            .unwrap();

        assert!(info.is_successful());
        assert_eq!(env.dest_catalog.object(&to).unwrap().token(), Some("v2"));
        assert_eq!(
            env.dest_catalog.mutations(),
            vec![
                Mutation::Rename { from: from.clone(), to: to.clone() },
                Mutation::Alter(to.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_after_failed_stamp_finishes_rename() {
        let env = env();
        let from = ObjectSpec::table("db", "a");
        let to = ObjectSpec::table("db", "b");
        env.dest_catalog.insert(stamped(&from, "v1"));
        env.source_catalog.insert(stamped(&to, "v2"));
        env.dest_catalog
            .fail_next(CatalogOp::Alter, CatalogError::unavailable("refused"));
        let task = rename_task(&env, &from, &to, ExpectedToken::present("v1"));

        assert!(task.run().await.is_err());
        assert_eq!(env.dest_catalog.object(&to).unwrap().token(), Some("v1"));

        assert!(task.run().await.unwrap().is_successful());
        assert_eq!(env.dest_catalog.object(&to).unwrap().token(), Some("v2"));
    }

    #[tokio::test]
    async fn test_absent_token() {
        let env = env();
        let from = ObjectSpec::table("db", "a");
        env.dest_catalog.insert(stamped(&from, "v1"));

        let info = rename_task(&env, &from, &ObjectSpec::table("db", "b"), ExpectedToken::Absent)
            .run()
            .await
            .unwrap();

        assert_eq!(info.abstention(), Some(&Abstention::MissingSourceToken));
        assert_eq!(env.dest_catalog.get_count(), 0);
    }

    #[tokio::test]
    async fn test_token_mismatch() {
        let env = env();
        let from = ObjectSpec::table("db", "a");
        env.dest_catalog.insert(stamped(&from, "v2"));

        let info = rename_task(&env, &from, &ObjectSpec::table("db", "b"), ExpectedToken::present("v1"))
            .run()
            .await
            .unwrap();

        assert!(matches!(info.abstention(), Some(Abstention::TokenMismatch { .. })));
        assert!(env.dest_catalog.contains(&from));
    }

    #[tokio::test]
    async fn test_target_taken() {
        let env = env();
        let from = ObjectSpec::table("db", "a");
        let to = ObjectSpec::table("db", "b");
        env.dest_catalog.insert(stamped(&from, "v1"));
        env.dest_catalog.insert(stamped(&to, "other"));

        let info = rename_task(&env, &from, &to, ExpectedToken::present("v1"))
            .run()
            .await
            .unwrap();

        assert_eq!(info.abstention(), Some(&Abstention::RenameTargetExists));
        assert_eq!(env.dest_catalog.object(&to).unwrap().token(), Some("other"));
        assert_eq!(env.dest_catalog.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_table_rename_carries_partitions() {
        let env = env();
        let from = ObjectSpec::table("db", "a");
        let to = ObjectSpec::table("db", "b");
        env.dest_catalog.insert(stamped(&from, "v1"));
        env.dest_catalog
            .insert(stamped(&ObjectSpec::partition("db", "a", "dt=1"), "p1"));

        let info = rename_task(&env, &from, &to, ExpectedToken::present("v1"))
            .run()
            .await
            .unwrap();

        assert!(info.is_successful());
        assert!(env.dest_catalog.contains(&ObjectSpec::partition("db", "b", "dt=1")));
        assert!(!env.dest_catalog.contains(&ObjectSpec::partition("db", "a", "dt=1")));
    }

    #[tokio::test]
    async fn test_rename_failure_propagates() {
        let env = env();
        let from = ObjectSpec::table("db", "a");
        env.dest_catalog.insert(stamped(&from, "v1"));
        env.dest_catalog
            .fail_next(CatalogOp::Rename, CatalogError::unavailable("refused"));

        let err = rename_task(&env, &from, &ObjectSpec::table("db", "b"), ExpectedToken::present("v1"))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, ReplicationError::Catalog { operation: "rename_object", .. }));
        assert!(env.dest_catalog.contains(&from));
    }

    #[test]
    fn test_locks_cover_both_names() {
        let env = env();
        let task = rename_task(
            &env,
            &ObjectSpec::table("db", "a"),
            &ObjectSpec::table("db", "b"),
            ExpectedToken::Absent,
        );
        let locks = task.required_locks();
        assert_eq!(locks.len(), 2);
        assert_eq!(locks.get("db.a"), Some(LockType::Exclusive));
        assert_eq!(locks.get("db.b"), Some(LockType::Exclusive));
    }

    #[test]
    fn test_partition_locks_share_parent() {
        let env = env();
        let task = rename_task(
            &env,
            &ObjectSpec::partition("db", "t", "dt=1"),
            &ObjectSpec::partition("db", "t", "dt=2"),
            ExpectedToken::Absent,
        );
        let locks = task.required_locks();
        assert_eq!(locks.len(), 3);
        assert_eq!(locks.get("db.t"), Some(LockType::Shared));
        assert_eq!(locks.get("db.t/dt=1"), Some(LockType::Exclusive));
        assert_eq!(locks.get("db.t/dt=2"), Some(LockType::Exclusive));
    }
}
