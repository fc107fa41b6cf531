// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Qualified names of catalog objects.
//!
//! An [`ObjectSpec`] names the same object on both clusters. Its canonical
//! string form doubles as the lock key:
//!
//! ```text
//! sales.orders                 table
//! sales.orders/ds=2024-01-01   partition (sub-object)
//! sales.orders/ds=1/hr=3       partition names may contain '/'
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What kind of object a spec points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Table,
    Partition,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Partition => write!(f, "partition"),
        }
    }
}

/// Namespace-qualified identifier of a catalog object.
///
/// Equality is structural: two specs with the same names are
/// interchangeable as lock keys and catalog lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectSpec {
    namespace: String,
    object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_object: Option<String>,
}

impl ObjectSpec {
    /// Spec for a table.
    ///
    /// Names are taken as given. See [`ObjectSpec::validate`] for the names
    /// that keep the canonical form unambiguous.
    pub fn table(namespace: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            object: object.into(),
            sub_object: None,
        }
    }

    /// Spec for a partition of a table.
    pub fn partition(
        namespace: impl Into<String>,
        object: impl Into<String>,
        sub_object: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            object: object.into(),
            sub_object: Some(sub_object.into()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn sub_object(&self) -> Option<&str> {
        self.sub_object.as_deref()
    }

    pub fn kind(&self) -> ObjectKind {
        if self.sub_object.is_some() {
            ObjectKind::Partition
        } else {
            ObjectKind::Table
        }
    }

    pub fn is_partition(&self) -> bool {
        self.sub_object.is_some()
    }

    /// The table owning this partition, `None` for tables.
    pub fn parent(&self) -> Option<ObjectSpec> {
        self.sub_object
            .as_ref()
            .map(|_| ObjectSpec::table(self.namespace.clone(), self.object.clone()))
    }

    /// Whether `other` is a partition of this table.
    pub fn is_parent_of(&self, other: &ObjectSpec) -> bool {
        self.sub_object.is_none()
            && other.sub_object.is_some()
            && self.namespace == other.namespace
            && self.object == other.object
    }

    /// Canonical string form, used as the lock key.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Check that the canonical form parses back to this spec.
    ///
    /// A namespace or table name holding '.' or '/' prints to a string that
    /// does not parse, and two such specs can share a lock key
    /// (`a.b` + `c` and `a` + `b.c` both print as `a.b.c`).
    pub fn validate(&self) -> Result<(), ParseSpecError> {
        let fail = |reason| {
            Err(ParseSpecError {
                input: self.to_string(),
                reason,
            })
        };

        if self.namespace.is_empty() {
            return fail("empty namespace");
        }
        if self.namespace.contains(['.', '/']) {
            return fail("namespace contains '.' or '/'");
        }
        if self.object.is_empty() {
            return fail("empty object name");
        }
        if self.object.contains('.') {
            return fail("object name contains '.'");
        }
        if self.object.contains('/') {
            return fail("object name contains '/'");
        }
        if self.sub_object.as_deref() == Some("") {
            return fail("empty sub-object name");
        }
        Ok(())
    }
}

impl fmt::Display for ObjectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_object {
            Some(sub) => write!(f, "{}.{}/{}", self.namespace, self.object, sub),
            None => write!(f, "{}.{}", self.namespace, self.object),
        }
    }
}

/// Error parsing the canonical form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object spec '{input}': {reason}")]
pub struct ParseSpecError {
    pub input: String,
    pub reason: &'static str,
}

impl FromStr for ObjectSpec {
    type Err = ParseSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (qualified, sub_object) = match s.split_once('/') {
            Some((q, sub)) => (q, Some(sub)),
            None => (s, None),
        };

        let (namespace, object) = qualified.split_once('.').ok_or_else(|| ParseSpecError {
            input: s.to_string(),
            reason: "missing '.' between namespace and object",
        })?;

        let spec = Self {
            namespace: namespace.to_string(),
            object: object.to_string(),
            sub_object: sub_object.map(str::to_string),
        };
        spec.validate()?;
        Ok(spec)
    }
}
