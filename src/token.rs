// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Version tokens: the idempotency and ordering guard.
//!
//! Every catalog object carries a token under [`TOKEN_PARAM`]. The replication
//! pipeline stamps it whenever it writes a destination object, so a matching
//! token means "the destination reflects exactly this source version".
//!
//! A task may only mutate a destination object whose current token equals
//! the token captured from the source when the triggering event was produced.
//! Any other combination is a safe no-op.

use crate::catalog::CatalogObject;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved parameter key holding the version token.
pub const TOKEN_PARAM: &str = "transient_lastDdlTime";

/// Opaque version marker. Compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for VersionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The source-observed token a task was derived from.
///
/// `Absent` is meaningful: without a known source version a task cannot tell
/// a newer destination from a stale one, so it must abstain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedToken {
    Present(VersionToken),
    Absent,
}

impl ExpectedToken {
    pub fn present(value: impl Into<VersionToken>) -> Self {
        Self::Present(value.into())
    }

    pub fn as_token(&self) -> Option<&VersionToken> {
        match self {
            Self::Present(token) => Some(token),
            Self::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<Option<String>> for ExpectedToken {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => Self::Present(VersionToken(v)),
            None => Self::Absent,
        }
    }
}

impl fmt::Display for ExpectedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present(token) => write!(f, "{}", token),
            Self::Absent => write!(f, "<absent>"),
        }
    }
}

/// Where a destination object stands relative to the expected token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCheck<'a> {
    /// No object at the destination.
    Absent,
    /// Destination holds exactly the expected version.
    Matches(&'a CatalogObject),
    /// Destination moved to another version (or was never stamped).
    Diverged { actual: Option<VersionToken> },
}

/// Compare a live destination object against the expected token.
pub fn check<'a>(expected: &VersionToken, destination: Option<&'a CatalogObject>) -> TokenCheck<'a> {
    match destination {
        None => TokenCheck::Absent,
        Some(object) => match object.token() {
            Some(actual) if actual == expected.as_str() => TokenCheck::Matches(object),
            actual => TokenCheck::Diverged {
                actual: actual.map(VersionToken::from),
            },
        },
    }
}
