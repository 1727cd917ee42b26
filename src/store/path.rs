//! Dotted key path parsing.
//!
//! Locations in the tree are addressed by dotted strings such as
//! `"bar.name"`. Parsing is explicit: a path is an ordered sequence of
//! non-empty segments, and nothing is created implicitly from malformed
//! input.

use crate::core::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated, ordered sequence of path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse a dotted path string.
    ///
    /// Fails with [`StoreError::InvalidPath`] when the string is empty or
    /// any segment between dots is empty (`"a..b"`, `".a"`, `"a."`).
    pub fn parse(raw: &str) -> StoreResult<Self> {
        if raw.is_empty() {
            return Err(StoreError::invalid_path(raw));
        }

        let segments: Vec<String> = raw.split('.').map(str::to_owned).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(StoreError::invalid_path(raw));
        }

        Ok(Self { segments })
    }

    /// The path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// A path always has at least one segment.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl FromStr for KeyPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl TryFrom<String> for KeyPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<KeyPath> for String {
    fn from(path: KeyPath) -> Self {
        path.to_string()
    }
}
