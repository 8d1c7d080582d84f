// SPDX-License-Identifier: MIT

//! Pack references: `publisher/package` with an optional revision.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a pack reference
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackRefError {
    #[error("missing '/' separator in '{0}' (expected publisher/package)")]
    MissingSeparator(String),
    #[error("empty publisher in '{0}'")]
    EmptyPublisher(String),
    #[error("empty package in '{0}'")]
    EmptyPackage(String),
    #[error("invalid character '{1}' in publisher '{0}'")]
    InvalidPublisher(String, char),
    #[error("invalid revision '{0}' (expected integer)")]
    InvalidRevision(String),
}

/// Reference to a pack: publisher, package name, and optionally a pinned
/// revision. Written as `publisher/package` or `publisher/package@rev`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackRef {
    pub publisher: String,
    pub package: String,
    pub revision: Option<u32>,
}

impl PackRef {
    pub fn new(publisher: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            publisher: publisher.into(),
            package: package.into(),
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = Some(revision);
        self
    }

    /// The admission-control key: at most one non-ephemeral live transaction
    /// may exist per tuple.
    pub fn tuple(&self) -> (&str, &str) {
        (&self.publisher, &self.package)
    }

    /// File stem used for on-disk pack files: `publisher-package-revision`.
    /// Requires a pinned revision.
    pub fn file_stem(&self) -> Option<String> {
        self.revision
            .map(|rev| format!("{}-{}-{}", self.publisher, self.package, rev))
    }

    /// Parse a pack-file stem back into a reference. The publisher may not
    /// contain `-` (enforced at parse time), so the split is unambiguous:
    /// the trailing segment is the revision, the leading one the publisher.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let (rest, rev) = stem.rsplit_once('-')?;
        let rev: u32 = rev.parse().ok()?;
        let (publisher, package) = rest.split_once('-')?;
        if publisher.is_empty() || package.is_empty() {
            return None;
        }
        Some(PackRef::new(publisher, package).with_revision(rev))
    }
}

impl FromStr for PackRef {
    type Err = PackRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (spec, revision) = match s.split_once('@') {
            Some((spec, rev)) => {
                let rev = rev
                    .parse::<u32>()
                    .map_err(|_| PackRefError::InvalidRevision(rev.to_string()))?;
                (spec, Some(rev))
            }
            None => (s, None),
        };

        let (publisher, package) = spec
            .split_once('/')
            .ok_or_else(|| PackRefError::MissingSeparator(s.to_string()))?;
        if publisher.is_empty() {
            return Err(PackRefError::EmptyPublisher(s.to_string()));
        }
        if package.is_empty() {
            return Err(PackRefError::EmptyPackage(s.to_string()));
        }
        // The publisher ends up as the leading segment of pack file names,
        // which are '-'-delimited, so '-' is reserved.
        if let Some(bad) = publisher.chars().find(|c| !c.is_alphanumeric() && *c != '_' && *c != '.')
        {
            return Err(PackRefError::InvalidPublisher(publisher.to_string(), bad));
        }

        Ok(Self {
            publisher: publisher.to_string(),
            package: package.to_string(),
            revision,
        })
    }
}

impl fmt::Display for PackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(rev) => write!(f, "{}/{}@{}", self.publisher, self.package, rev),
            None => write!(f, "{}/{}", self.publisher, self.package),
        }
    }
}

impl Serialize for PackRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "pack_tests.rs"]
mod tests;
