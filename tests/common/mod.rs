//! Shared test utilities for integration and chaos tests.
//!
//! This module provides:
//! - Source/destination cluster pairs backed by in-memory catalogs
//! - Stamped catalog object helpers
//! - Task constructors
//! - An instrumented catalog for overlap detection

#![allow(dead_code)]

pub mod mock_catalog;

pub use mock_catalog::*;

use metastore_replication::catalog::{CatalogObject, InMemoryCatalog};
use metastore_replication::{
    AlterTask, Cluster, CreateTask, DropTask, ExpectedToken, ObjectSpec, RenameTask,
    ReplicationTask, VersionToken,
};
use std::sync::Arc;

/// A source and a destination cluster, with direct access to their catalogs.
pub struct Clusters {
    pub source_catalog: Arc<InMemoryCatalog>,
    pub dest_catalog: Arc<InMemoryCatalog>,
    pub source: Cluster,
    pub destination: Cluster,
}

impl Clusters {
    pub fn new() -> Self {
        let source_catalog = Arc::new(InMemoryCatalog::new());
        let dest_catalog = Arc::new(InMemoryCatalog::new());
        Self {
            source: Cluster::new("source", source_catalog.clone()),
            destination: Cluster::new("destination", dest_catalog.clone()),
            source_catalog,
            dest_catalog,
        }
    }

    pub fn create(&self, spec: &ObjectSpec, expected: Option<&str>) -> ReplicationTask {
        CreateTask::new(
            self.source.clone(),
            self.destination.clone(),
            spec.clone(),
            expected_token(expected),
        )
        .into()
    }

    pub fn drop(&self, spec: &ObjectSpec, expected: Option<&str>) -> ReplicationTask {
        DropTask::new(
            self.source.clone(),
            self.destination.clone(),
            spec.clone(),
            expected_token(expected),
        )
        .into()
    }

    pub fn alter(&self, spec: &ObjectSpec, expected: Option<&str>) -> ReplicationTask {
        AlterTask::new(
            self.source.clone(),
            self.destination.clone(),
            spec.clone(),
            expected_token(expected),
        )
        .into()
    }

    pub fn rename(&self, from: &ObjectSpec, to: &ObjectSpec, expected: Option<&str>) -> ReplicationTask {
        RenameTask::new(
            self.source.clone(),
            self.destination.clone(),
            from.clone(),
            to.clone(),
            expected_token(expected),
        )
        .into()
    }

    /// Destination token of `spec`, `None` if absent or unstamped.
    pub fn dest_token(&self, spec: &ObjectSpec) -> Option<String> {
        self.dest_catalog
            .object(spec)
            .and_then(|o| o.token().map(str::to_string))
    }
}

pub fn expected_token(token: Option<&str>) -> ExpectedToken {
    ExpectedToken::from(token.map(str::to_string))
}

/// Catalog object for `spec` carrying `token`.
pub fn stamped(spec: &ObjectSpec, token: &str) -> CatalogObject {
    CatalogObject::new(spec.clone(), serde_json::json!({ "location": format!("/warehouse/{}", spec) }))
        .with_token(&VersionToken::from(token))
}
