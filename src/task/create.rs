// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Create replication.

use crate::cluster::Cluster;
use crate::error::Result;
use crate::lock::LockSet;
use crate::object::ObjectSpec;
use crate::result::{Abstention, RunInfo};
use crate::token::{ExpectedToken, VersionToken};
use tracing::debug;

/// Replays a table or partition creation.
///
/// Copies the source's current definition, stamped with the source's current
/// token. The source may have moved past the create event; later alter events
/// then find the newer token and abstain. A rerun against an already
/// replicated destination is a successful no-op.
#[derive(Debug, Clone)]
pub struct CreateTask {
    source: Cluster,
    destination: Cluster,
    spec: ObjectSpec,
    expected: ExpectedToken,
}

impl CreateTask {
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
            debug!(spec = %self.spec, "No source token on create event, skipping");
            return Ok(RunInfo::not_completable(Abstention::MissingSourceToken));
        };

        let Some(source_object) = self.source.fetch(&self.spec).await? else {
            debug!(spec = %self.spec, "Source object gone since create event");
            return Ok(RunInfo::not_completable(Abstention::SourceMissing));
        };
        let Some(current) = source_object.token().map(VersionToken::from) else {
            debug!(spec = %self.spec, "Source object carries no token, not creating");
            return Ok(RunInfo::not_completable(Abstention::MissingSourceToken));
        };
        if &current != expected {
            debug!(
                spec = %self.spec,
                expected = %expected,
                current = %current,
                "Source moved past create event, copying current version"
            );
        }

        if let Some(parent) = self.spec.parent() {
            if self.destination.fetch(&parent).await?.is_none() {
                debug!(spec = %self.spec, parent = %parent, "Destination table missing for partition");
                return Ok(RunInfo::not_completable(Abstention::ParentMissing));
            }
        }

        let existing = self.destination.fetch(&self.spec).await?;
        let Some(existing) = existing else {
            let object = source_object.with_spec(self.spec.clone()).with_token(&current);
            self.destination.create(object).await?;
            debug!(spec = %self.spec, token = %current, "Created destination object");
            return Ok(RunInfo::successful(0));
        };

        match existing.token() {
            Some(actual) if actual == expected.as_str() || actual == current.as_str() => {
                debug!(spec = %self.spec, token = actual, "Destination already replicated");
                Ok(RunInfo::successful(0))
            }
            actual => {
                debug!(
                    spec = %self.spec,
                    expected = %expected,
                    actual = ?actual,
                    "Destination holds another version, not creating"
                );
                Ok(RunInfo::not_completable(Abstention::TokenMismatch {
                    expected: expected.clone(),
                    actual: actual.map(VersionToken::from),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{env, stamped, Env};
    use super::*;
    use crate::catalog::{CatalogError, CatalogObject, CatalogOp, Mutation};
    use crate::error::ReplicationError;
    use crate::result::RunStatus;

    fn create_task(env: &Env, spec: &ObjectSpec, expected: ExpectedToken) -> CreateTask {
        CreateTask::new(env.source.clone(), env.destination.clone(), spec.clone(), expected)
    }

    #[tokio::test]
    async fn test_creates_with_token_stamped() {
        let env = env();
        let spec = ObjectSpec::table("db", "t");
        env.source_catalog.insert(stamped(&spec, "v1"));

        let info = create_task(&env, &spec, ExpectedToken::present("v1")).run().await.unwrap();

        assert_eq!(info.status(), RunStatus::Successful);
        let created = env.dest_catalog.object(&spec).unwrap();
        assert_eq!(created.token(), Some("v1"));
        assert_eq!(created.definition, env.source_catalog.object(&spec).unwrap().definition);
        assert_eq!(env.dest_catalog.mutations(), vec![Mutation::Create(spec.clone())]);
    }

    #[tokio::test]
    async fn test_rerun_is_successful_without_mutation() {
        let env = env();
        let spec = ObjectSpec::table("db", "t");
        env.source_catalog.insert(stamped(&spec, "v1"));
        let task = create_task(&env, &spec, ExpectedToken::present("v1"));

        assert!(task.run().await.unwrap().is_successful());
        assert!(task.run().await.unwrap().is_successful());
        assert_eq!(env.dest_catalog.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_absent_token_makes_no_calls() {
        let env = env();
        let spec = ObjectSpec::table("db", "t");
        env.source_catalog.insert(stamped(&spec, "v1"));

        let info = create_task(&env, &spec, ExpectedToken::Absent).run().await.unwrap();

        assert_eq!(info.abstention(), Some(&Abstention::MissingSourceToken));
        assert_eq!(env.source_catalog.get_count(), 0);
        assert_eq!(env.dest_catalog.get_count(), 0);
    }

    #[tokio::test]
    async fn test_source_missing() {
        let env = env();
        let spec = ObjectSpec::table("db", "t");

        let info = create_task(&env, &spec, ExpectedToken::present("v1")).run().await.unwrap();

        assert_eq!(info.abstention(), Some(&Abstention::SourceMissing));
        assert!(env.dest_catalog.is_empty());
    }

    #[tokio::test]
    async fn test_source_moved_on_copies_current_version() {
        let env = env();
        let spec = ObjectSpec::table("db", "t");
        env.source_catalog.insert(stamped(&spec, "v2"));
        let task = create_task(&env, &spec, ExpectedToken::present("v1"));

        let info = task.run().await.unwrap();

        assert!(info.is_successful());
        assert_eq!(env.dest_catalog.object(&spec).unwrap().token(), Some("v2"));

        // Rerun finds the source's version already in place.
        assert!(task.run().await.unwrap().is_successful());
        assert_eq!(env.dest_catalog.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_unstamped_source_is_not_copied() {
        let env = env();
        let spec = ObjectSpec::table("db", "t");
        env.source_catalog
            .insert(CatalogObject::new(spec.clone(), serde_json::json!({})));

        let info = create_task(&env, &spec, ExpectedToken::present("v1")).run().await.unwrap();

        assert_eq!(info.abstention(), Some(&Abstention::MissingSourceToken));
        assert!(env.dest_catalog.is_empty());
    }

    #[tokio::test]
    async fn test_destination_with_other_version_is_left_alone() {
        let env = env();
        let spec = ObjectSpec::table("db", "t");
        env.source_catalog.insert(stamped(&spec, "v1"));
        env.dest_catalog.insert(stamped(&spec, "v0"));

        let info = create_task(&env, &spec, ExpectedToken::present("v1")).run().await.unwrap();

        assert!(matches!(info.abstention(), Some(Abstention::TokenMismatch { .. })));
        assert_eq!(env.dest_catalog.object(&spec).unwrap().token(), Some("v0"));
        assert_eq!(env.dest_catalog.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_partition_requires_destination_table() {
        let env = env();
        let partition = ObjectSpec::partition("db", "t", "dt=1");
        env.source_catalog.insert(stamped(&ObjectSpec::table("db", "t"), "v1"));
        env.source_catalog.insert(stamped(&partition, "p1"));

        let info = create_task(&env, &partition, ExpectedToken::present("p1"))
            .run()
            .await
            .unwrap();

        assert_eq!(info.abstention(), Some(&Abstention::ParentMissing));
        assert!(env.dest_catalog.is_empty());
    }

    #[tokio::test]
    async fn test_partition_created_under_existing_table() {
        let env = env();
        let table = ObjectSpec::table("db", "t");
        let partition = ObjectSpec::partition("db", "t", "dt=1");
        env.source_catalog.insert(stamped(&table, "v1"));
        env.source_catalog.insert(stamped(&partition, "p1"));
        env.dest_catalog.insert(stamped(&table, "v1"));

        let info = create_task(&env, &partition, ExpectedToken::present("p1"))
            .run()
            .await
            .unwrap();

        assert!(info.is_successful());
        assert_eq!(env.dest_catalog.object(&partition).unwrap().token(), Some("p1"));
    }

    #[tokio::test]
    async fn test_create_failure_propagates() {
        let env = env();
        let spec = ObjectSpec::table("db", "t");
        env.source_catalog.insert(stamped(&spec, "v1"));
        env.dest_catalog
            .fail_next(CatalogOp::Create, CatalogError::unavailable("refused"));

        let err = create_task(&env, &spec, ExpectedToken::present("v1"))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, ReplicationError::Catalog { operation: "create_object", .. }));
        assert!(!env.dest_catalog.contains(&spec));
    }
}
