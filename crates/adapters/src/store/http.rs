// SPDX-License-Identifier: MIT

//! Pack store backed by the `chef-fetch` helper binary.
//!
//! The remote index protocol lives in the helper; this adapter only shells
//! out to it and interprets exit codes, keeping network concerns out of
//! the daemon process.

use super::{FetchStatus, FetchTicket, PackStore, ProofBundle, ResolvedPack, StoreError};
use async_trait::async_trait;
use chef_core::PackRef;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Exit code the helper uses for retryable failures.
const EXIT_TRANSIENT: i32 = 75;

/// Store adapter that delegates index and transfer work to an external
/// fetch helper.
#[derive(Debug, Clone)]
pub struct HttpPackStore {
    helper: PathBuf,
    index_url: String,
}

impl HttpPackStore {
    pub fn new(helper: impl Into<PathBuf>, index_url: impl Into<String>) -> Self {
        Self {
            helper: helper.into(),
            index_url: index_url.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, StoreError> {
        tokio::process::Command::new(&self.helper)
            .arg("--index")
            .arg(&self.index_url)
            .args(args)
            .output()
            .await
            .map_err(|e| StoreError::Network(format!("failed to run fetch helper: {e}")))
    }
}

#[async_trait]
impl PackStore for HttpPackStore {
    async fn resolve(&self, pack: &PackRef) -> Result<ResolvedPack, StoreError> {
        let spec = pack.to_string();
        let output = self.run(&["resolve", &spec]).await?;
        if !output.status.success() {
            return Err(StoreError::NotFound(spec));
        }

        // Helper prints a JSON object: {"revision":N,"size":N,"digest":"..",
        // "platform":"..","dependencies":["pub/pkg", ...]}
        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| StoreError::Network(format!("bad resolve output: {e}")))?;
        let revision = value["revision"].as_u64().unwrap_or(0) as u32;
        let dependencies = value["dependencies"]
            .as_array()
            .map(|deps| {
                deps.iter()
                    .filter_map(|d| d.as_str())
                    .filter_map(|d| d.parse().ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(ResolvedPack {
            pack: pack.clone().with_revision(revision),
            size_bytes: value["size"].as_u64().unwrap_or(0),
            digest: value["digest"].as_str().unwrap_or_default().to_string(),
            platform: value["platform"].as_str().unwrap_or_default().to_string(),
            dependencies,
        })
    }

    async fn fetch(
        &self,
        resolved: &ResolvedPack,
        dest: &Path,
        _ticket: FetchTicket,
    ) -> Result<FetchStatus, StoreError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let spec = resolved.pack.to_string();
        let dest_str = dest.display().to_string();
        info!(pack = %spec, dest = %dest_str, "fetching pack");

        let output = self.run(&["fetch", &spec, "--out", &dest_str]).await?;
        if output.status.success() {
            return Ok(FetchStatus::Complete);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(pack = %spec, code = ?output.status.code(), error = %stderr, "fetch failed");
        match output.status.code() {
            Some(EXIT_TRANSIENT) => Ok(FetchStatus::Transient(stderr)),
            _ => Ok(FetchStatus::Denied(stderr)),
        }
    }

    async fn ensure_proof(&self, pack: &PackRef) -> Result<ProofBundle, StoreError> {
        let spec = pack.to_string();
        let output = self.run(&["proof", &spec]).await?;
        if !output.status.success() {
            return Err(StoreError::NotFound(format!("proof for {spec}")));
        }

        // Helper prints the publisher proof and the pack proof separated by
        // a blank line.
        let text = String::from_utf8_lossy(&output.stdout);
        let (publisher, pack_proof) = text.split_once("\n\n").unwrap_or((text.as_ref(), ""));
        Ok(ProofBundle {
            publisher_proof: publisher.as_bytes().to_vec(),
            pack_proof: pack_proof.as_bytes().to_vec(),
        })
    }
}
