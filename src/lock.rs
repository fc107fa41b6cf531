// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lock declaration and the lock manager seam.
//!
//! Tasks only *declare* the locks they need ([`LockSet`]); the executor
//! acquires them through a [`LockManager`] before running the task and drops
//! the returned guard afterwards, whatever the outcome.
//!
//! # Compatibility
//!
//! ```text
//!              held: Shared   held: Exclusive
//! Shared         granted        waits
//! Exclusive      waits          waits
//! ```
//!
//! [`KeyedLockManager`] acquires keys in sorted order, so two lock sets
//! with overlapping keys can never deadlock against each other.

use crate::error::Result;
use std::collections::{btree_map, BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::trace;

/// Lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockType {
    Shared,
    Exclusive,
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "shared"),
            Self::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// A single named lock request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockRequest {
    pub lock_type: LockType,
    pub key: String,
}

impl LockRequest {
    pub fn shared(key: impl Into<String>) -> Self {
        Self {
            lock_type: LockType::Shared,
            key: key.into(),
        }
    }

    pub fn exclusive(key: impl Into<String>) -> Self {
        Self {
            lock_type: LockType::Exclusive,
            key: key.into(),
        }
    }
}

/// Locks a task must hold while it runs. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockSet {
    locks: BTreeMap<String, LockType>,
}

impl LockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request. If the key is already present the stronger mode wins.
    pub fn add(&mut self, request: LockRequest) {
        match self.locks.entry(request.key) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(request.lock_type);
            }
            btree_map::Entry::Occupied(mut entry) => {
                if request.lock_type > *entry.get() {
                    entry.insert(request.lock_type);
                }
            }
        }
    }

    #[must_use]
    pub fn with(mut self, request: LockRequest) -> Self {
        self.add(request);
        self
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<LockType> {
        self.locks.get(key).copied()
    }

    /// Requests in key order.
    pub fn iter(&self) -> impl Iterator<Item = LockRequest> + '_ {
        self.locks.iter().map(|(key, lock_type)| LockRequest {
            lock_type: *lock_type,
            key: key.clone(),
        })
    }

    pub fn keys(&self) -> Vec<String> {
        self.locks.keys().cloned().collect()
    }
}

impl FromIterator<LockRequest> for LockSet {
    fn from_iter<I: IntoIterator<Item = LockRequest>>(iter: I) -> Self {
        let mut set = LockSet::new();
        for request in iter {
            set.add(request);
        }
        set
    }
}

impl fmt::Display for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .locks
            .iter()
            .map(|(key, lock_type)| format!("{}:{}", lock_type, key))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Boxed future returned by [`LockManager::acquire`].
pub type LockFuture<'a, G> = Pin<Box<dyn Future<Output = Result<G>> + Send + 'a>>;

/// Grants lock sets to the executor.
///
/// `acquire` waits until every lock in the set is granted and returns a
/// guard; dropping the guard releases all of them.
pub trait LockManager: Send + Sync + 'static {
    type Guard: Send + 'static;

    fn acquire<'a>(&'a self, locks: &'a LockSet) -> LockFuture<'a, Self::Guard>;
}

enum HeldLock {
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

/// Guard for a lock set granted by [`KeyedLockManager`].
pub struct KeyedLockGuard {
    keys: Vec<String>,
    _held: Vec<HeldLock>,
}

impl KeyedLockGuard {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        trace!(keys = ?self.keys, "Releasing locks");
    }
}

/// In-process reader/writer lock manager keyed by string.
///
/// Idle key entries are pruned once the table grows past `prune_threshold`.
pub struct KeyedLockManager {
    table: Mutex<HashMap<String, Arc<RwLock<()>>>>,
    prune_threshold: usize,
}

impl Default for KeyedLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyedLockManager {
    pub fn new() -> Self {
        Self::with_prune_threshold(1024)
    }

    pub fn with_prune_threshold(prune_threshold: usize) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            prune_threshold,
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<RwLock<()>>>> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, key: &str) -> Arc<RwLock<()>> {
        let mut table = self.table();
        if table.len() >= self.prune_threshold {
            // Only the table references an idle entry.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        table
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Number of keys currently tracked (held or not yet pruned).
    pub fn tracked_keys(&self) -> usize {
        self.table().len()
    }

    /// Whether some task currently holds `key` in any mode.
    pub fn is_locked(&self, key: &str) -> bool {
        match self.table().get(key) {
            Some(lock) => lock.try_write().is_err(),
            None => false,
        }
    }

    /// Grant `locks` or return `None` without waiting.
    pub fn try_acquire(&self, locks: &LockSet) -> Option<KeyedLockGuard> {
        let mut held = Vec::with_capacity(locks.len());
        for request in locks.iter() {
            let slot = self.slot(&request.key);
            let lock = match request.lock_type {
                LockType::Shared => HeldLock::Shared(slot.try_read_owned().ok()?),
                LockType::Exclusive => HeldLock::Exclusive(slot.try_write_owned().ok()?),
            };
            held.push(lock);
        }
        Some(KeyedLockGuard {
            keys: locks.keys(),
            _held: held,
        })
    }
}

impl LockManager for KeyedLockManager {
    type Guard = KeyedLockGuard;

    fn acquire<'a>(&'a self, locks: &'a LockSet) -> LockFuture<'a, KeyedLockGuard> {
        Box::pin(async move {
            let mut held = Vec::with_capacity(locks.len());
            // LockSet iterates in key order: global ordering, no deadlocks.
            for request in locks.iter() {
                let slot = self.slot(&request.key);
                trace!(key = %request.key, mode = %request.lock_type, "Waiting for lock");
                let lock = match request.lock_type {
                    LockType::Shared => HeldLock::Shared(slot.read_owned().await),
                    LockType::Exclusive => HeldLock::Exclusive(slot.write_owned().await),
                };
                held.push(lock);
            }
            Ok(KeyedLockGuard {
                keys: locks.keys(),
                _held: held,
            })
        })
    }
}
