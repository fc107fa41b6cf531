// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory catalog.
//!
//! Behaves like a single catalog service: tables own partitions, cascading
//! drops remove partitions, renames of tables carry their partitions along.
//! Every mutating call is journaled so callers can assert on side effects,
//! and failures can be injected per operation.

use super::{CatalogClient, CatalogError, CatalogErrorKind, CatalogFuture, CatalogObject, CatalogResult};
use crate::object::ObjectSpec;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Catalog operations, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogOp {
    Get,
    Create,
    Alter,
    Drop,
    Rename,
}

/// A mutating call received by the catalog (recorded whether or not it succeeded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(ObjectSpec),
    Alter(ObjectSpec),
    Drop { spec: ObjectSpec, cascade: bool },
    Rename { from: ObjectSpec, to: ObjectSpec },
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectSpec, CatalogObject>,
    journal: Vec<Mutation>,
    failures: HashMap<CatalogOp, VecDeque<CatalogError>>,
}

/// Thread-safe in-memory [`CatalogClient`].
#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<State>,
    gets: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed an object directly, bypassing the journal.
    pub fn insert(&self, object: CatalogObject) {
        self.state().objects.insert(object.spec.clone(), object);
    }

    /// Read an object directly, bypassing injected failures.
    pub fn object(&self, spec: &ObjectSpec) -> Option<CatalogObject> {
        self.state().objects.get(spec).cloned()
    }

    pub fn contains(&self, spec: &ObjectSpec) -> bool {
        self.state().objects.contains_key(spec)
    }

    pub fn len(&self) -> usize {
        self.state().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().objects.is_empty()
    }

    /// All mutating calls received so far, in order.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.state().journal.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state().journal.len()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Make the next call of `op` fail with `error`. Queued failures are
    /// consumed in order, one per call.
    pub fn fail_next(&self, op: CatalogOp, error: CatalogError) {
        self.state().failures.entry(op).or_default().push_back(error);
    }

    /// Make the next `n` calls of `op` fail with `error`.
    pub fn fail_times(&self, op: CatalogOp, n: usize, error: CatalogError) {
        let mut state = self.state();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..n {
            queue.push_back(error.clone());
        }
    }

    fn take_failure(state: &mut State, op: CatalogOp) -> CatalogResult<()> {
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn partitions_of(state: &State, table: &ObjectSpec) -> Vec<ObjectSpec> {
        state
            .objects
            .keys()
            .filter(|spec| table.is_parent_of(spec))
            .cloned()
            .collect()
    }

    fn apply_get(&self, spec: &ObjectSpec) -> CatalogResult<Option<CatalogObject>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        Self::take_failure(&mut state, CatalogOp::Get)?;
        Ok(state.objects.get(spec).cloned())
    }

    fn apply_create(&self, object: CatalogObject) -> CatalogResult<()> {
        let mut state = self.state();
        state.journal.push(Mutation::Create(object.spec.clone()));
        Self::take_failure(&mut state, CatalogOp::Create)?;

        if state.objects.contains_key(&object.spec) {
            return Err(CatalogError::new(
                CatalogErrorKind::AlreadyExists,
                format!("{} already exists", object.spec),
            ));
        }
        if let Some(parent) = object.spec.parent() {
            if !state.objects.contains_key(&parent) {
                return Err(CatalogError::new(
                    CatalogErrorKind::NotFound,
                    format!("parent table {} does not exist", parent),
                ));
            }
        }
        state.objects.insert(object.spec.clone(), object);
        Ok(())
    }

    fn apply_alter(&self, spec: &ObjectSpec, object: CatalogObject) -> CatalogResult<()> {
        let mut state = self.state();
        state.journal.push(Mutation::Alter(spec.clone()));
        Self::take_failure(&mut state, CatalogOp::Alter)?;

        match state.objects.get_mut(spec) {
            Some(existing) => {
                *existing = object.with_spec(spec.clone());
                Ok(())
            }
            None => Err(CatalogError::new(
                CatalogErrorKind::NotFound,
                format!("{} does not exist", spec),
            )),
        }
    }

    fn apply_drop(&self, spec: &ObjectSpec, cascade: bool) -> CatalogResult<()> {
        let mut state = self.state();
        state.journal.push(Mutation::Drop {
            spec: spec.clone(),
            cascade,
        });
        Self::take_failure(&mut state, CatalogOp::Drop)?;

        if !state.objects.contains_key(spec) {
            return Err(CatalogError::new(
                CatalogErrorKind::NotFound,
                format!("{} does not exist", spec),
            ));
        }

        let children = Self::partitions_of(&state, spec);
        if !children.is_empty() && !cascade {
            return Err(CatalogError::new(
                CatalogErrorKind::InvalidOperation,
                format!("{} has {} partitions, cascade required", spec, children.len()),
            ));
        }
        for child in children {
            state.objects.remove(&child);
        }
        state.objects.remove(spec);
        Ok(())
    }

    fn apply_rename(&self, from: &ObjectSpec, to: &ObjectSpec) -> CatalogResult<()> {
        let mut state = self.state();
        state.journal.push(Mutation::Rename {
            from: from.clone(),
            to: to.clone(),
        });
        Self::take_failure(&mut state, CatalogOp::Rename)?;

        if from.kind() != to.kind() || (from.is_partition() && from.parent() != to.parent()) {
            return Err(CatalogError::new(
                CatalogErrorKind::InvalidOperation,
                format!("cannot rename {} to {}", from, to),
            ));
        }
        if state.objects.contains_key(to) {
            return Err(CatalogError::new(
                CatalogErrorKind::AlreadyExists,
                format!("{} already exists", to),
            ));
        }
        let object = state.objects.remove(from).ok_or_else(|| {
            CatalogError::new(CatalogErrorKind::NotFound, format!("{} does not exist", from))
        })?;

        // Tables carry their partitions to the new name.
        for child in Self::partitions_of(&state, from) {
            if let (Some(moved), Some(sub)) = (state.objects.remove(&child), child.sub_object()) {
                let new_spec = ObjectSpec::partition(to.namespace(), to.object(), sub);
                state.objects.insert(new_spec.clone(), moved.with_spec(new_spec));
            }
        }
        state.objects.insert(to.clone(), object.with_spec(to.clone()));
        Ok(())
    }
}

impl CatalogClient for InMemoryCatalog {
    fn get_object<'a>(&'a self, spec: &'a ObjectSpec) -> CatalogFuture<'a, Option<CatalogObject>> {
        Box::pin(async move { self.apply_get(spec) })
    }

    fn create_object(&self, object: CatalogObject) -> CatalogFuture<'_, ()> {
        Box::pin(async move { self.apply_create(object) })
    }

    fn alter_object<'a>(&'a self, spec: &'a ObjectSpec, object: CatalogObject) -> CatalogFuture<'a, ()> {
        Box::pin(async move { self.apply_alter(spec, object) })
    }

    fn drop_object<'a>(&'a self, spec: &'a ObjectSpec, cascade: bool) -> CatalogFuture<'a, ()> {
        Box::pin(async move { self.apply_drop(spec, cascade) })
    }

    fn rename_object<'a>(&'a self, from: &'a ObjectSpec, to: &'a ObjectSpec) -> CatalogFuture<'a, ()> {
        Box::pin(async move { self.apply_rename(from, to) })
    }
}
