// SPDX-License-Identifier: MIT

//! Pack manifest: metadata read from a mounted image.

use crate::pack::PackRef;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Manifest file name inside a mounted pack image.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Errors from loading a pack manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found at {0}")]
    NotFound(String),
    #[error("IO error reading manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid manifest: {0}")]
    Json(#[from] serde_json::Error),
}

/// A command the pack exports; a launcher wrapper is generated for each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    /// Path of the executable inside the mounted image.
    pub path: String,
}

/// A long-running service the pack declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    /// Command line executed by the container backend.
    pub exec: String,
}

/// Metadata bundled with a pack image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackManifest {
    pub pack: PackRef,
    /// Target platform/arch string, e.g. `linux/amd64`.
    pub platform: String,
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
    #[serde(default)]
    pub dependencies: Vec<PackRef>,
}

impl PackManifest {
    /// Read the manifest from a mounted image directory.
    pub fn load(mount_dir: &Path) -> Result<Self, ManifestError> {
        let path = mount_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(ManifestError::NotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
