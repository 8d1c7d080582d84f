// SPDX-License-Identifier: MIT

//! Verifier backed by the `chef-verify` helper binary.

use super::{ProofVerifier, VerifyError};
use crate::store::ProofBundle;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Runs the external verifier helper: proofs on stdin, artifact path as an
/// argument, exit code 0 means the signature chain is valid.
#[derive(Debug, Clone)]
pub struct ProcessVerifier {
    helper: PathBuf,
}

impl ProcessVerifier {
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
        }
    }
}

#[async_trait]
impl ProofVerifier for ProcessVerifier {
    async fn verify(&self, artifact: &Path, proof: &ProofBundle) -> Result<bool, VerifyError> {
        let mut child = tokio::process::Command::new(&self.helper)
            .arg(artifact)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VerifyError::Unavailable(format!("failed to spawn verifier: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&proof.publisher_proof).await?;
            stdin.write_all(b"\n\n").await?;
            stdin.write_all(&proof.pack_proof).await?;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| VerifyError::Unavailable(format!("verifier did not exit: {e}")))?;

        info!(artifact = %artifact.display(), valid = status.success(), "proof verified");
        Ok(status.success())
    }
}
