// SPDX-License-Identifier: MIT

//! Mounter backed by the `chef-imgmount` helper binary.

use super::{ImageMounter, MountError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Exit code the helper uses when the image is still held open.
const EXIT_BUSY: i32 = 16;

/// Mount adapter that shells out to the image filesystem helper.
#[derive(Debug, Clone)]
pub struct ProcessMounter {
    helper: PathBuf,
}

impl ProcessMounter {
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, MountError> {
        tokio::process::Command::new(&self.helper)
            .args(args)
            .output()
            .await
            .map_err(|e| MountError::Failed(format!("failed to run mount helper: {e}")))
    }
}

#[async_trait]
impl ImageMounter for ProcessMounter {
    async fn mount(&self, pack_file: &Path, mountpoint: &Path) -> Result<(), MountError> {
        tokio::fs::create_dir_all(mountpoint).await?;

        let pack = pack_file.display().to_string();
        let target = mountpoint.display().to_string();
        let output = self.run(&["mount", &pack, &target]).await?;
        if !output.status.success() {
            return Err(MountError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        info!(pack = %pack, mountpoint = %target, "mounted pack image");
        Ok(())
    }

    async fn unmount(&self, mountpoint: &Path) -> Result<(), MountError> {
        let target = mountpoint.display().to_string();
        let output = self.run(&["unmount", &target]).await?;
        match output.status.code() {
            Some(0) => {
                let _ = tokio::fs::remove_dir(mountpoint).await;
                info!(mountpoint = %target, "unmounted pack image");
                Ok(())
            }
            Some(EXIT_BUSY) => Err(MountError::Busy(target)),
            _ => Err(MountError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
        }
    }

    async fn mounted(&self) -> Result<Vec<PathBuf>, MountError> {
        let output = self.run(&["list"]).await?;
        if !output.status.success() {
            return Err(MountError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| PathBuf::from(line.trim()))
            .filter(|p| !p.as_os_str().is_empty())
            .collect())
    }
}
