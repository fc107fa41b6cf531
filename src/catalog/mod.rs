// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Catalog service interface.
//!
//! Defines what replication needs from a cluster's catalog service. The real
//! client (thrift, REST, ...) lives outside this crate and implements
//! [`CatalogClient`]; [`InMemoryCatalog`] is the reference implementation used
//! standalone and in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use metastore_replication::catalog::{CatalogClient, CatalogFuture, CatalogObject};
//! use metastore_replication::object::ObjectSpec;
//!
//! struct MyCatalog { /* ... */ }
//!
//! impl CatalogClient for MyCatalog {
//!     fn get_object<'a>(&'a self, _spec: &'a ObjectSpec) -> CatalogFuture<'a, Option<CatalogObject>> {
//!         Box::pin(async move { Ok(None) })
//!     }
//!
//!     fn create_object(&self, _object: CatalogObject) -> CatalogFuture<'_, ()> {
//!         Box::pin(async move { Ok(()) })
//!     }
//!
//!     fn alter_object<'a>(&'a self, _spec: &'a ObjectSpec, _object: CatalogObject) -> CatalogFuture<'a, ()> {
//!         Box::pin(async move { Ok(()) })
//!     }
//!
//!     fn drop_object<'a>(&'a self, _spec: &'a ObjectSpec, _cascade: bool) -> CatalogFuture<'a, ()> {
//!         Box::pin(async move { Ok(()) })
//!     }
//!
//!     fn rename_object<'a>(&'a self, _from: &'a ObjectSpec, _to: &'a ObjectSpec) -> CatalogFuture<'a, ()> {
//!         Box::pin(async move { Ok(()) })
//!     }
//! }
//! ```

mod memory;

pub use memory::{CatalogOp, InMemoryCatalog, Mutation};

use crate::object::{ObjectKind, ObjectSpec};
use crate::token::{VersionToken, TOKEN_PARAM};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Result type for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Boxed future returned by [`CatalogClient`] methods.
pub type CatalogFuture<'a, T> = Pin<Box<dyn Future<Output = CatalogResult<T>> + Send + 'a>>;

/// Broad classification of catalog failures (for logs and metrics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    /// Service unreachable, timed out or overloaded.
    Unavailable,
    PermissionDenied,
    AlreadyExists,
    NotFound,
    /// Request rejected as invalid (e.g. non-cascading drop of a table with partitions).
    InvalidOperation,
    Other,
}

impl CatalogErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::PermissionDenied => "permission_denied",
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::InvalidOperation => "invalid_operation",
            Self::Other => "other",
        }
    }
}

/// Error raised by a catalog client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogError {
    pub kind: CatalogErrorKind,
    pub message: String,
}

impl CatalogError {
    pub fn new(kind: CatalogErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Unavailable, message)
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for CatalogError {}

/// A catalog object (table or partition) as seen by replication.
///
/// `definition` is the catalog's own description of the object (schema,
/// storage descriptor, ...) and is copied verbatim. `parameters` holds
/// key/value properties, including the reserved version token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub spec: ObjectSpec,
    pub definition: serde_json::Value,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl CatalogObject {
    pub fn new(spec: ObjectSpec, definition: serde_json::Value) -> Self {
        Self {
            spec,
            definition,
            parameters: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.spec.kind()
    }

    /// The stored version token, if the object was ever stamped.
    pub fn token(&self) -> Option<&str> {
        self.parameters.get(TOKEN_PARAM).map(String::as_str)
    }

    /// Copy of this object with `token` stamped.
    #[must_use]
    pub fn with_token(mut self, token: &VersionToken) -> Self {
        self.parameters
            .insert(TOKEN_PARAM.to_string(), token.as_str().to_string());
        self
    }

    /// Copy of this object relocated to `spec` (used when replaying onto the destination).
    #[must_use]
    pub fn with_spec(mut self, spec: ObjectSpec) -> Self {
        self.spec = spec;
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// What replication needs from a cluster's catalog service.
///
/// Each call may block on network I/O and may fail with a [`CatalogError`].
/// Implementations must not retry internally in a way that hides failures:
/// retry policy belongs to the executor.
pub trait CatalogClient: Send + Sync + 'static {
    /// Fetch an object, `None` if it does not exist.
    fn get_object<'a>(&'a self, spec: &'a ObjectSpec) -> CatalogFuture<'a, Option<CatalogObject>>;

    /// Create a new object. Fails with `AlreadyExists` if present.
    fn create_object(&self, object: CatalogObject) -> CatalogFuture<'_, ()>;

    /// Replace the definition and parameters of an existing object.
    fn alter_object<'a>(&'a self, spec: &'a ObjectSpec, object: CatalogObject) -> CatalogFuture<'a, ()>;

    /// Delete an object. With `cascade`, dependent sub-objects (partitions)
    /// go in the same logical delete.
    fn drop_object<'a>(&'a self, spec: &'a ObjectSpec, cascade: bool) -> CatalogFuture<'a, ()>;

    /// Move an object to a new name, keeping its parameters.
    fn rename_object<'a>(&'a self, from: &'a ObjectSpec, to: &'a ObjectSpec) -> CatalogFuture<'a, ()>;
}
