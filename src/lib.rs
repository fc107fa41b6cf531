//! # Metastore Replication
//!
//! Replays catalog events (create, alter, drop, rename of tables and
//! partitions) from a source cluster's catalog onto a destination cluster's
//! catalog, safely under concurrency, reordering and retries.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                         metastore-replication                             │
//! │                                                                           │
//! │  events ──► ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐  │
//! │  (queue)    │ TaskExecutor │───►│ LockManager  │───►│ ReplicationTask  │  │
//! │             │ retry/backoff│    │ (LockSet)    │    │ token check +    │  │
//! │             └──────────────┘    └──────────────┘    │ one mutation     │  │
//! │                    │                                └──────────────────┘  │
//! │                    ▼                                    │          │      │
//! │             TaskReport                          source catalog  dest      │
//! │          (Successful / NotCompletable / Failed)                 catalog   │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Safety Model
//!
//! Every catalog object carries a version token. A task captures the source's
//! token when its event is produced and only mutates a destination object that
//! still holds exactly that token. Anything else is a `NotCompletable` no-op,
//! so stale, duplicated or reordered events cannot undo newer state. Locks
//! declared by each task keep concurrent tasks on the same object apart.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use metastore_replication::catalog::InMemoryCatalog;
//! use metastore_replication::{
//!     Cluster, DropTask, ExecutorConfig, ExpectedToken, ObjectSpec, ReplicationTask, TaskExecutor,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = Cluster::new("east", Arc::new(InMemoryCatalog::new()));
//!     let destination = Cluster::new("west", Arc::new(InMemoryCatalog::new()));
//!
//!     let task = ReplicationTask::from(DropTask::new(
//!         source,
//!         destination,
//!         ObjectSpec::table("sales", "orders"),
//!         ExpectedToken::present("1700000000"),
//!     ));
//!
//!     let executor = TaskExecutor::new(&ExecutorConfig::default());
//!     let report = executor.execute(&task).await;
//!     println!("{} {}", report.spec, report.state);
//! }
//! ```

pub mod catalog;
pub mod circuit_breaker;
pub mod cluster;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod lock;
pub mod metrics;
pub mod object;
pub mod resilience;
pub mod result;
pub mod task;
pub mod token;

// Re-exports for convenience
pub use catalog::{CatalogClient, CatalogError, CatalogObject};
pub use circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError, CircuitState, CircuitStats};
pub use cluster::Cluster;
pub use config::{ClusterConfig, ExecutorConfig, ReplicationConfig};
pub use error::{ReplicationError, Result};
pub use executor::{TaskExecutor, TaskReport, TaskSender, TaskState};
pub use lock::{KeyedLockManager, LockManager, LockRequest, LockSet, LockType};
pub use object::ObjectSpec;
pub use result::{Abstention, RunInfo, RunStatus};
pub use task::{AlterTask, CreateTask, DropTask, RenameTask, ReplicationTask, TaskKind};
pub use token::{ExpectedToken, VersionToken};
