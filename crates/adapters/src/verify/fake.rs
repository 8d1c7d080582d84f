// SPDX-License-Identifier: MIT

//! Fake proof verifier for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ProofVerifier, VerifyError};
use crate::store::ProofBundle;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct FakeVerifierState {
    reject: bool,
    unavailable: bool,
    checked: Vec<PathBuf>,
}

/// Fake verifier: accepts everything unless scripted otherwise.
#[derive(Clone, Default)]
pub struct FakeVerifier {
    inner: Arc<Mutex<FakeVerifierState>>,
}

impl FakeVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject all subsequent verifications (verdict false).
    pub fn reject_all(&self) {
        self.inner.lock().reject = true;
    }

    /// Fail verification at the infrastructure level.
    pub fn set_unavailable(&self) {
        self.inner.lock().unavailable = true;
    }

    /// Artifacts that have been checked.
    pub fn checked(&self) -> Vec<PathBuf> {
        self.inner.lock().checked.clone()
    }
}

#[async_trait]
impl ProofVerifier for FakeVerifier {
    async fn verify(&self, artifact: &Path, _proof: &ProofBundle) -> Result<bool, VerifyError> {
        let mut inner = self.inner.lock();
        inner.checked.push(artifact.to_owned());
        if inner.unavailable {
            return Err(VerifyError::Unavailable("scripted outage".to_string()));
        }
        Ok(!inner.reject)
    }
}
