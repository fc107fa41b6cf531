// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication tasks.
//!
//! One task replays one catalog event (create, alter, drop, rename) from a
//! source cluster onto a destination cluster. Every task follows the same
//! contract:
//!
//! 1. [`required_locks()`](ReplicationTask::required_locks) declares the keys
//!    the executor must hold. It is a pure function of the task's fields.
//! 2. [`run()`](ReplicationTask::run) verifies the version token and mutates the
//!    destination only when the token proves it is safe. Otherwise it returns a
//!    `NotCompletable` [`RunInfo`]. Catalog failures propagate as errors.
//!
//! Tasks never take locks themselves and never retry.
//!
//! # Example
//!
//! ```rust,no_run
//! use metastore_replication::catalog::InMemoryCatalog;
//! use metastore_replication::cluster::Cluster;
//! use metastore_replication::object::ObjectSpec;
//! use metastore_replication::task::{DropTask, ReplicationTask};
//! use metastore_replication::token::ExpectedToken;
//! use std::sync::Arc;
//!
//! # async fn example() -> metastore_replication::Result<()> {
//! let source = Cluster::new("src", Arc::new(InMemoryCatalog::new()));
//! let destination = Cluster::new("dst", Arc::new(InMemoryCatalog::new()));
//!
//! let task = ReplicationTask::from(DropTask::new(
//!     source,
//!     destination,
//!     ObjectSpec::table("sales", "orders"),
//!     ExpectedToken::present("1700000000"),
//! ));
//! let info = task.run().await?;
//! println!("{}", info.status());
//! # Ok(())
//! # }
//! ```

mod alter;
mod create;
mod drop;
mod rename;

pub use alter::AlterTask;
pub use create::CreateTask;
pub use drop::DropTask;
pub use rename::RenameTask;

use crate::error::Result;
use crate::events::TaskEvent;
use crate::lock::{LockRequest, LockSet};
use crate::object::ObjectSpec;
use crate::result::RunInfo;
use crate::token::ExpectedToken;
use std::fmt;
use std::time::Instant;

/// Which catalog event a task replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Create,
    Drop,
    Alter,
    Rename,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Drop => "drop",
            Self::Alter => "alter",
            Self::Rename => "rename",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of replication work.
#[derive(Debug, Clone)]
pub enum ReplicationTask {
    Create(CreateTask),
    Drop(DropTask),
    Alter(AlterTask),
    Rename(RenameTask),
}

impl ReplicationTask {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Create(_) => TaskKind::Create,
            Self::Drop(_) => TaskKind::Drop,
            Self::Alter(_) => TaskKind::Alter,
            Self::Rename(_) => TaskKind::Rename,
        }
    }

    /// The object this task acts on (the old name for renames).
    pub fn spec(&self) -> &ObjectSpec {
        match self {
            Self::Create(t) => t.spec(),
            Self::Drop(t) => t.spec(),
            Self::Alter(t) => t.spec(),
            Self::Rename(t) => t.spec(),
        }
    }

    pub fn expected(&self) -> &ExpectedToken {
        match self {
            Self::Create(t) => t.expected(),
            Self::Drop(t) => t.expected(),
            Self::Alter(t) => t.expected(),
            Self::Rename(t) => t.expected(),
        }
    }

    /// Locks the executor must hold for the whole of [`run()`](Self::run).
    pub fn required_locks(&self) -> LockSet {
        match self {
            Self::Create(t) => t.required_locks(),
            Self::Drop(t) => t.required_locks(),
            Self::Alter(t) => t.required_locks(),
            Self::Rename(t) => t.required_locks(),
        }
    }

    /// Run the task once and emit a [`TaskEvent`] describing the outcome.
    ///
    /// Assumes the caller holds [`required_locks()`](Self::required_locks).
    pub async fn run(&self) -> Result<RunInfo> {
        let start = Instant::now();
        let result = match self {
            Self::Create(t) => t.run().await,
            Self::Drop(t) => t.run().await,
            Self::Alter(t) => t.run().await,
            Self::Rename(t) => t.run().await,
        };
        TaskEvent::from_result(self.kind(), self.spec(), &result, start.elapsed()).emit();
        result
    }
}

impl fmt::Display for ReplicationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rename(t) => write!(f, "rename {} -> {}", t.spec(), t.new_spec()),
            other => write!(f, "{} {}", other.kind(), other.spec()),
        }
    }
}

impl From<CreateTask> for ReplicationTask {
    fn from(task: CreateTask) -> Self {
        Self::Create(task)
    }
}

impl From<DropTask> for ReplicationTask {
    fn from(task: DropTask) -> Self {
        Self::Drop(task)
    }
}

impl From<AlterTask> for ReplicationTask {
    fn from(task: AlterTask) -> Self {
        Self::Alter(task)
    }
}

impl From<RenameTask> for ReplicationTask {
    fn from(task: RenameTask) -> Self {
        Self::Rename(task)
    }
}

/// Exclusive on the target, plus shared on the owning table for partitions.
pub(crate) fn target_locks(spec: &ObjectSpec) -> LockSet {
    let mut locks = LockSet::new();
    add_target(&mut locks, spec);
    locks
}

pub(crate) fn add_target(locks: &mut LockSet, spec: &ObjectSpec) {
    locks.add(LockRequest::exclusive(spec.key()));
    if let Some(parent) = spec.parent() {
        locks.add(LockRequest::shared(parent.key()));
    }
}
