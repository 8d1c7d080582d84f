// SPDX-License-Identifier: MIT

//! Image mounter adapter: mounts pack images read-only at deterministic
//! mountpoints via the user-space filesystem driver.

mod process;

pub use process::ProcessMounter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMounter, MountCall};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from mount operations
#[derive(Debug, Error)]
pub enum MountError {
    /// The image is still held open by the host; a reboot releases it.
    #[error("mountpoint busy: {0}")]
    Busy(String),
    #[error("mount failed: {0}")]
    Failed(String),
    #[error("not mounted: {0}")]
    NotMounted(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Adapter for the read-only image filesystem driver.
#[async_trait]
pub trait ImageMounter: Clone + Send + Sync + 'static {
    /// Mount the pack image at the given mountpoint, creating it.
    /// Mounting an already-mounted pack at the same mountpoint succeeds.
    async fn mount(&self, pack_file: &Path, mountpoint: &Path) -> Result<(), MountError>;

    /// Unmount and remove the mountpoint.
    async fn unmount(&self, mountpoint: &Path) -> Result<(), MountError>;

    /// The host's current view of mounted pack images. Restoration uses
    /// this to detect a lost mount table after a reboot.
    async fn mounted(&self) -> Result<Vec<PathBuf>, MountError>;
}
