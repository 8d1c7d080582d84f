// SPDX-License-Identifier: MIT

//! On-disk layout of everything the daemon persists, rooted at a
//! configurable prefix (default `/`).

use crate::pack::PackRef;
use std::path::{Path, PathBuf};

/// Extension of on-disk pack files.
pub const PACK_EXT: &str = "pack";

/// Path derivations for the pack store, mountpoints, per-package data,
/// command wrappers, and the boot cookie.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding content-addressed pack files.
    pub fn pack_store_dir(&self) -> PathBuf {
        self.root.join("var/chef/packs")
    }

    /// On-disk pack file for a revision-pinned reference.
    /// `<root>/var/chef/packs/<publisher>-<package>-<revision>.pack`
    pub fn pack_file(&self, pack: &PackRef) -> Option<PathBuf> {
        let stem = pack.file_stem()?;
        Some(self.pack_store_dir().join(format!("{stem}.{PACK_EXT}")))
    }

    /// Directory downloads are staged in before install/update moves them
    /// into the pack store. Kept beside the store so the final move is a
    /// same-filesystem rename.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("var/chef/staging")
    }

    /// Staged download location for a revision-pinned reference.
    pub fn staging_file(&self, pack: &PackRef) -> Option<PathBuf> {
        let stem = pack.file_stem()?;
        Some(self.staging_dir().join(format!("{stem}.{PACK_EXT}")))
    }

    /// Deterministic mountpoint for a pack's read-only image.
    /// `<root>/run/chef/mounts/<publisher>/<package>`
    pub fn mountpoint(&self, pack: &PackRef) -> PathBuf {
        self.root
            .join("run/chef/mounts")
            .join(&pack.publisher)
            .join(&pack.package)
    }

    /// Per-package data directory (shared across revisions).
    pub fn package_dir(&self, pack: &PackRef) -> PathBuf {
        self.root
            .join("var/chef/data")
            .join(&pack.publisher)
            .join(&pack.package)
    }

    /// Per-revision data directory.
    /// `<root>/var/chef/data/<publisher>/<package>/<revision>`
    pub fn data_dir(&self, pack: &PackRef) -> Option<PathBuf> {
        Some(self.package_dir(pack).join(pack.revision?.to_string()))
    }

    /// Marker recording that a pack's image could not be released and the
    /// host must reboot before the pack can be touched again.
    pub fn reboot_marker(&self, pack: &PackRef) -> PathBuf {
        self.package_dir(pack).join("needs-reboot")
    }

    /// Command launcher wrapper location.
    /// `<root>/usr/local/bin/<command>`
    pub fn wrapper_file(&self, command: &str) -> PathBuf {
        self.root.join("usr/local/bin").join(command)
    }

    /// Boot cookie, persisted outside the journal.
    /// `<root>/run/chef/boot-id`
    pub fn boot_cookie(&self) -> PathBuf {
        self.root.join("run/chef/boot-id")
    }

    /// Scan the pack store for installed packs: every parseable
    /// `<publisher>-<package>-<revision>.pack` file. This is the
    /// restoration manifest used by the mount-all pass.
    pub fn installed_packs(&self) -> std::io::Result<Vec<(PackRef, PathBuf)>> {
        let dir = self.pack_store_dir();
        let mut packs = Vec::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(packs),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PACK_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(pack) = PackRef::from_file_stem(stem) {
                packs.push((pack, path));
            }
        }
        packs.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        Ok(packs)
    }

    /// The revision of a package currently present in the pack store, if
    /// any. When multiple revisions are present the highest wins.
    pub fn installed_revision(&self, pack: &PackRef) -> std::io::Result<Option<u32>> {
        let mut best = None;
        for (installed, _) in self.installed_packs()? {
            if installed.tuple() == pack.tuple() {
                best = best.max(installed.revision);
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
