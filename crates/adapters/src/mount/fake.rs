// SPDX-License-Identifier: MIT

//! Fake image mounter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ImageMounter, MountError};
use async_trait::async_trait;
use chef_core::{PackManifest, PackRef, MANIFEST_FILE};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded mount call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    Mount { pack_file: PathBuf, mountpoint: PathBuf },
    Unmount { mountpoint: PathBuf },
}

#[derive(Default)]
struct FakeMounterState {
    calls: Vec<MountCall>,
    /// mountpoint -> pack file
    table: HashMap<PathBuf, PathBuf>,
    /// Scripted manifests keyed by pack-file stem; otherwise a minimal
    /// manifest is derived from the file name.
    manifests: HashMap<String, PackManifest>,
    /// Mountpoints that refuse to unmount with `Busy`.
    busy: Vec<PathBuf>,
    /// Packs whose mount attempt fails outright.
    failing: Vec<PathBuf>,
}

/// Fake mounter keeping an in-memory mount table.
///
/// Mounting materializes the pack's manifest at the mountpoint so the load
/// handler can read it, mimicking what the image driver exposes.
#[derive(Clone, Default)]
pub struct FakeMounter {
    inner: Arc<Mutex<FakeMounterState>>,
}

impl FakeMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<MountCall> {
        self.inner.lock().calls.clone()
    }

    /// Script the manifest exposed when the pack with the given file stem
    /// (e.g. `acme-foo-1`) is mounted.
    pub fn set_manifest(&self, stem: &str, manifest: PackManifest) {
        self.inner.lock().manifests.insert(stem.to_string(), manifest);
    }

    /// Make unmounting the given mountpoint fail with `Busy`.
    pub fn set_busy(&self, mountpoint: &Path) {
        self.inner.lock().busy.push(mountpoint.to_owned());
    }

    /// Make mounting the given pack file fail.
    pub fn set_failing(&self, pack_file: &Path) {
        self.inner.lock().failing.push(pack_file.to_owned());
    }

    /// Simulate a reboot: the host mount table is empty, the mountpoint
    /// directories (and their manifests) are gone.
    pub fn clear_mount_table(&self) {
        let mut inner = self.inner.lock();
        for mountpoint in inner.table.keys() {
            let _ = std::fs::remove_dir_all(mountpoint);
        }
        inner.table.clear();
    }

    pub fn is_mounted(&self, mountpoint: &Path) -> bool {
        self.inner.lock().table.contains_key(mountpoint)
    }

    fn manifest_for(state: &FakeMounterState, pack_file: &Path) -> PackManifest {
        let stem = pack_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if let Some(manifest) = state.manifests.get(stem) {
            return manifest.clone();
        }
        let pack = PackRef::from_file_stem(stem)
            .unwrap_or_else(|| PackRef::new("unknown", "pack").with_revision(0));
        PackManifest {
            pack,
            platform: "linux/amd64".to_string(),
            commands: Vec::new(),
            services: Vec::new(),
            dependencies: Vec::new(),
        }
    }
}

#[async_trait]
impl ImageMounter for FakeMounter {
    async fn mount(&self, pack_file: &Path, mountpoint: &Path) -> Result<(), MountError> {
        let manifest = {
            let mut inner = self.inner.lock();
            inner.calls.push(MountCall::Mount {
                pack_file: pack_file.to_owned(),
                mountpoint: mountpoint.to_owned(),
            });
            if inner.failing.contains(&pack_file.to_owned()) {
                return Err(MountError::Failed(format!(
                    "scripted mount failure for {}",
                    pack_file.display()
                )));
            }
            let manifest = Self::manifest_for(&inner, pack_file);
            inner
                .table
                .insert(mountpoint.to_owned(), pack_file.to_owned());
            manifest
        };

        std::fs::create_dir_all(mountpoint)?;
        let data = serde_json::to_vec(&manifest)
            .map_err(|e| MountError::Failed(format!("manifest encode: {e}")))?;
        std::fs::write(mountpoint.join(MANIFEST_FILE), data)?;
        Ok(())
    }

    async fn unmount(&self, mountpoint: &Path) -> Result<(), MountError> {
        {
            let mut inner = self.inner.lock();
            inner.calls.push(MountCall::Unmount {
                mountpoint: mountpoint.to_owned(),
            });
            if inner.busy.contains(&mountpoint.to_owned()) {
                return Err(MountError::Busy(mountpoint.display().to_string()));
            }
            if inner.table.remove(mountpoint).is_none() {
                return Err(MountError::NotMounted(mountpoint.display().to_string()));
            }
        }
        let _ = std::fs::remove_dir_all(mountpoint);
        Ok(())
    }

    async fn mounted(&self) -> Result<Vec<PathBuf>, MountError> {
        let mut mountpoints: Vec<_> = self.inner.lock().table.keys().cloned().collect();
        mountpoints.sort();
        Ok(mountpoints)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
