//! Logical resource paths
//!
//! A logical path is the user-facing address of a resource (`/teams/team-a`)
//! or of a collection (`/teams/`). Segments may be remote identifiers or
//! human aliases; resolving them is the engine's job, not this type's.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// A normalized, validated logical path.
///
/// Normalized form always starts with `/`, never contains empty segments,
/// and ends with `/` exactly when it addresses a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalPath {
    segments: Vec<String>,
    collection: bool,
}

impl LogicalPath {
    /// Parse and normalize a raw path string.
    ///
    /// A trailing slash marks a collection; `/` alone is the root collection.
    /// Empty input and `.`/`..` segments are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyPath);
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(Error::InvalidPath {
                    path: raw.to_string(),
                    reason: format!("relative segment '{segment}' is not allowed"),
                });
            }
            segments.push(segment.to_string());
        }

        let collection = segments.is_empty() || trimmed.ends_with('/');
        Ok(Self {
            segments,
            collection,
        })
    }

    /// The root collection `/`.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
            collection: true,
        }
    }

    pub fn from_segments(segments: Vec<String>, collection: bool) -> Self {
        let collection = collection || segments.is_empty();
        Self {
            segments,
            collection,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_collection(&self) -> bool {
        self.collection
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The resource path made of the first `depth` segments.
    pub fn prefix(&self, depth: usize) -> Self {
        let depth = depth.min(self.segments.len());
        Self::from_segments(self.segments[..depth].to_vec(), false)
    }

    /// The collection that owns this path (`/teams/a` -> `/teams/`).
    ///
    /// The owner of a collection is its parent collection; the root owns itself.
    pub fn parent_collection(&self) -> Self {
        match self.segments.split_last() {
            Some((_, parent)) => Self::from_segments(parent.to_vec(), true),
            None => Self::root(),
        }
    }

    /// Append a segment, producing a resource path.
    pub fn child(&self, segment: &str) -> Result<Self> {
        let segment = segment.trim_matches('/');
        if segment.is_empty() || segment.contains('/') || segment == "." || segment == ".." {
            return Err(Error::InvalidPath {
                path: format!("{self}{segment}"),
                reason: format!("'{segment}' is not a single path segment"),
            });
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self::from_segments(segments, false))
    }

    pub fn as_collection(&self) -> Self {
        Self::from_segments(self.segments.clone(), true)
    }

    pub fn as_resource(&self) -> Self {
        Self::from_segments(self.segments.clone(), false)
    }

    /// The normalized path without a trailing slash (`/` for the root).
    ///
    /// Used wherever the collection/resource distinction must not matter,
    /// such as secret store keys.
    pub fn key(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        write!(f, "/{}", self.segments.join("/"))?;
        if self.collection {
            f.write_str("/")?;
        }
        Ok(())
    }
}

impl FromStr for LogicalPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for LogicalPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LogicalPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
