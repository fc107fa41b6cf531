//! Instrumented catalog for concurrency tests.
//!
//! Wraps [`InMemoryCatalog`] with optional per-call latency and tracks which
//! mutating calls are in progress at once. Mutations of different partitions
//! of one table may overlap; anything else on the same table is a conflict.

use metastore_replication::catalog::{
    CatalogClient, CatalogFuture, CatalogObject, InMemoryCatalog,
};
use metastore_replication::object::ObjectSpec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Family {
    tables: usize,
    partitions: HashMap<String, usize>,
}

impl Family {
    fn total(&self) -> usize {
        self.tables + self.partitions.values().sum::<usize>()
    }

    fn conflicting(&self) -> bool {
        let partition_overlap = self.partitions.values().any(|n| *n > 1);
        let partitions_active = self.partitions.values().any(|n| *n > 0);
        self.tables > 1 || (self.tables == 1 && partitions_active) || partition_overlap
    }
}

/// A catalog that records overlapping mutations.
pub struct ProbedCatalog {
    inner: Arc<InMemoryCatalog>,
    latency: Duration,
    active: Mutex<HashMap<String, Family>>,
    max_overlap: AtomicUsize,
    conflicts: AtomicUsize,
    calls: AtomicUsize,
}

impl ProbedCatalog {
    pub fn new(inner: Arc<InMemoryCatalog>, latency: Duration) -> Self {
        Self {
            inner,
            latency,
            active: Mutex::new(HashMap::new()),
            max_overlap: AtomicUsize::new(0),
            conflicts: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<InMemoryCatalog> {
        &self.inner
    }

    /// Highest number of concurrent mutations seen on any one table,
    /// counting its partitions.
    pub fn max_overlap(&self) -> usize {
        self.max_overlap.load(Ordering::SeqCst)
    }

    /// Number of mutations that started while a conflicting one was running.
    pub fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn family_key(spec: &ObjectSpec) -> String {
        spec.parent().unwrap_or_else(|| spec.clone()).key()
    }

    fn enter(&self, spec: &ObjectSpec) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut active = self.active.lock().unwrap();
        let family = active.entry(Self::family_key(spec)).or_default();
        if spec.is_partition() {
            *family.partitions.entry(spec.key()).or_insert(0) += 1;
        } else {
            family.tables += 1;
        }
        if family.conflicting() {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
        }
        self.max_overlap.fetch_max(family.total(), Ordering::SeqCst);
    }

    fn leave(&self, spec: &ObjectSpec) {
        let mut active = self.active.lock().unwrap();
        if let Some(family) = active.get_mut(&Self::family_key(spec)) {
            if spec.is_partition() {
                if let Some(n) = family.partitions.get_mut(&spec.key()) {
                    *n -= 1;
                }
            } else {
                family.tables -= 1;
            }
        }
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl CatalogClient for ProbedCatalog {
    fn get_object<'a>(&'a self, spec: &'a ObjectSpec) -> CatalogFuture<'a, Option<CatalogObject>> {
        Box::pin(async move {
            self.pause().await;
            self.inner.get_object(spec).await
        })
    }

    fn create_object(&self, object: CatalogObject) -> CatalogFuture<'_, ()> {
        Box::pin(async move {
            let spec = object.spec.clone();
            self.enter(&spec);
            self.pause().await;
            let result = self.inner.create_object(object).await;
            self.leave(&spec);
            result
        })
    }

    fn alter_object<'a>(&'a self, spec: &'a ObjectSpec, object: CatalogObject) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            self.enter(spec);
            self.pause().await;
            let result = self.inner.alter_object(spec, object).await;
            self.leave(spec);
            result
        })
    }

    fn drop_object<'a>(&'a self, spec: &'a ObjectSpec, cascade: bool) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            self.enter(spec);
            self.pause().await;
            let result = self.inner.drop_object(spec, cascade).await;
            self.leave(spec);
            result
        })
    }

    fn rename_object<'a>(&'a self, from: &'a ObjectSpec, to: &'a ObjectSpec) -> CatalogFuture<'a, ()> {
        Box::pin(async move {
            self.enter(from);
            self.pause().await;
            let result = self.inner.rename_object(from, to).await;
            self.leave(from);
            result
        })
    }
}
