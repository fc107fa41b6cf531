// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cluster handles.

use crate::catalog::{CatalogClient, CatalogObject};
use crate::error::{ReplicationError, Result};
use crate::metrics;
use crate::object::ObjectSpec;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// A named cluster and its catalog client.
///
/// Built by whoever owns cluster configuration; tasks keep cheap clones.
#[derive(Clone)]
pub struct Cluster {
    name: Arc<str>,
    catalog: Arc<dyn CatalogClient>,
}

impl Cluster {
    pub fn new(name: impl Into<String>, catalog: Arc<dyn CatalogClient>) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            catalog,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &dyn CatalogClient {
        self.catalog.as_ref()
    }

    /// `get_object` with the error wrapped and latency recorded.
    pub(crate) async fn fetch(&self, spec: &ObjectSpec) -> Result<Option<CatalogObject>> {
        let start = Instant::now();
        let result = self.catalog.get_object(spec).await;
        metrics::record_catalog_call(&self.name, "get_object", result.is_ok(), start.elapsed());
        result.map_err(|e| ReplicationError::catalog(self.name(), "get_object", spec, e))
    }

    pub(crate) async fn create(&self, object: CatalogObject) -> Result<()> {
        let spec = object.spec.clone();
        let start = Instant::now();
        let result = self.catalog.create_object(object).await;
        metrics::record_catalog_call(&self.name, "create_object", result.is_ok(), start.elapsed());
        result.map_err(|e| ReplicationError::catalog(self.name(), "create_object", &spec, e))
    }

    pub(crate) async fn alter(&self, spec: &ObjectSpec, object: CatalogObject) -> Result<()> {
        let start = Instant::now();
        let result = self.catalog.alter_object(spec, object).await;
        metrics::record_catalog_call(&self.name, "alter_object", result.is_ok(), start.elapsed());
        result.map_err(|e| ReplicationError::catalog(self.name(), "alter_object", spec, e))
    }

    pub(crate) async fn drop_cascade(&self, spec: &ObjectSpec) -> Result<()> {
        let start = Instant::now();
        let result = self.catalog.drop_object(spec, true).await;
        metrics::record_catalog_call(&self.name, "drop_object", result.is_ok(), start.elapsed());
        result.map_err(|e| ReplicationError::catalog(self.name(), "drop_object", spec, e))
    }

    pub(crate) async fn rename(&self, from: &ObjectSpec, to: &ObjectSpec) -> Result<()> {
        let start = Instant::now();
        let result = self.catalog.rename_object(from, to).await;
        metrics::record_catalog_call(&self.name, "rename_object", result.is_ok(), start.elapsed());
        result.map_err(|e| ReplicationError::catalog(self.name(), "rename_object", from, e))
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster").field("name", &self.name).finish()
    }
}
