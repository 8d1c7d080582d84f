// SPDX-License-Identifier: MIT

//! Proof verifier adapter: the trust boundary's yes/no oracle.
//!
//! Cryptographic internals live outside the daemon; the engine only
//! consumes the boolean verdict.

mod process;

pub use process::ProcessVerifier;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeVerifier;

use crate::store::ProofBundle;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from proof verification (infrastructure failures, not verdicts)
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Adapter for the external proof verifier.
#[async_trait]
pub trait ProofVerifier: Clone + Send + Sync + 'static {
    /// Check the signature chain of `artifact` against the publisher and
    /// pack proofs. `Ok(false)` is a verdict (reject); `Err` means the
    /// verifier itself could not run.
    async fn verify(&self, artifact: &Path, proof: &ProofBundle) -> Result<bool, VerifyError>;
}
