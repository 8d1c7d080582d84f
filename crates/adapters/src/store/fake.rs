// SPDX-License-Identifier: MIT

//! Fake pack store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{FetchDone, FetchStatus, FetchTicket, PackStore, ProofBundle, ResolvedPack, StoreError};
use async_trait::async_trait;
use chef_core::PackRef;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded store call
#[derive(Debug, Clone)]
pub enum StoreCall {
    Resolve { pack: String },
    Fetch { pack: String, dest: PathBuf },
    EnsureProof { pack: String },
}

#[derive(Default)]
struct FakeStoreState {
    calls: Vec<StoreCall>,
    /// Scripted dependencies per `publisher/package`.
    dependencies: HashMap<String, Vec<PackRef>>,
    /// Scripted latest revision per `publisher/package` (default 1).
    revisions: HashMap<String, u32>,
    /// Scripted platform per pack (defaults to the host-matching value).
    platforms: HashMap<String, String>,
    /// Packs the index refuses to resolve.
    unknown: Vec<String>,
    /// Remaining fetch calls to fail with a transient error.
    transient_failures: u32,
    /// Permanent fetch denial, when set.
    denied: Option<String>,
    /// Park fetches as in-progress instead of completing inline.
    park_fetches: bool,
    /// Parked tickets by transaction, with their destination.
    parked: HashMap<u64, (FetchTicket, ResolvedPack, PathBuf)>,
    fetch_count: u32,
}

/// Fake pack store with scriptable failure behavior.
///
/// By default every pack resolves to revision 1 with deterministic
/// contents, and fetches complete inline by writing the pack file.
#[derive(Clone, Default)]
pub struct FakePackStore {
    inner: Arc<Mutex<FakeStoreState>>,
}

/// Deterministic pack-file contents for a resolved reference.
fn pack_contents(pack: &PackRef) -> Vec<u8> {
    format!("pack contents for {pack}\n").into_bytes()
}

fn hex_digest(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

impl FakePackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of fetch attempts observed.
    pub fn fetch_count(&self) -> u32 {
        self.inner.lock().fetch_count
    }

    /// Script the dependency set returned when resolving `pack`.
    pub fn set_dependencies(&self, pack: &str, deps: Vec<&str>) {
        let deps = deps.iter().filter_map(|d| d.parse().ok()).collect();
        self.inner.lock().dependencies.insert(pack.to_string(), deps);
    }

    /// Script the latest revision an unpinned resolve of `pack` pins to.
    pub fn set_revision(&self, pack: &str, revision: u32) {
        self.inner
            .lock()
            .revisions
            .insert(pack.to_string(), revision);
    }

    /// Script the platform string returned when resolving `pack`.
    pub fn set_platform(&self, pack: &str, platform: &str) {
        self.inner
            .lock()
            .platforms
            .insert(pack.to_string(), platform.to_string());
    }

    /// Make the index refuse to resolve `pack`.
    pub fn set_unknown(&self, pack: &str) {
        self.inner.lock().unknown.push(pack.to_string());
    }

    /// Fail the next `n` fetch calls with a transient error.
    pub fn fail_transient(&self, n: u32) {
        self.inner.lock().transient_failures = n;
    }

    /// Permanently deny all fetches with the given reason.
    pub fn deny_fetches(&self, reason: &str) {
        self.inner.lock().denied = Some(reason.to_string());
    }

    /// Park subsequent fetches as in-progress; complete them later with
    /// [`FakePackStore::finish_parked`].
    pub fn park_fetches(&self, park: bool) {
        self.inner.lock().park_fetches = park;
    }

    /// Complete a parked fetch: write the pack file and deliver the
    /// completion notice through the parked ticket.
    pub async fn finish_parked(&self, txn: u64) {
        let parked = self.inner.lock().parked.remove(&txn);
        if let Some((ticket, resolved, dest)) = parked {
            std::fs::write(&dest, pack_contents(&resolved.pack)).ok();
            let _ = ticket
                .tx
                .send(FetchDone {
                    txn: ticket.txn,
                    status: FetchStatus::Complete,
                })
                .await;
        }
    }

    /// The digest the store would report for a pack, for test assertions.
    pub fn digest_for(pack: &PackRef) -> String {
        hex_digest(&pack_contents(pack))
    }
}

#[async_trait]
impl PackStore for FakePackStore {
    async fn resolve(&self, pack: &PackRef) -> Result<ResolvedPack, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.push(StoreCall::Resolve {
            pack: pack.to_string(),
        });

        let tuple = format!("{}/{}", pack.publisher, pack.package);
        if inner.unknown.contains(&tuple) {
            return Err(StoreError::NotFound(tuple));
        }

        let resolved_ref = match pack.revision {
            Some(_) => pack.clone(),
            None => {
                let latest = inner.revisions.get(&tuple).copied().unwrap_or(1);
                pack.clone().with_revision(latest)
            }
        };
        let contents = pack_contents(&resolved_ref);
        Ok(ResolvedPack {
            pack: resolved_ref,
            size_bytes: contents.len() as u64,
            digest: hex_digest(&contents),
            platform: inner
                .platforms
                .get(&tuple)
                .cloned()
                .unwrap_or_else(|| "linux/amd64".to_string()),
            dependencies: inner.dependencies.get(&tuple).cloned().unwrap_or_default(),
        })
    }

    async fn fetch(
        &self,
        resolved: &ResolvedPack,
        dest: &Path,
        ticket: FetchTicket,
    ) -> Result<FetchStatus, StoreError> {
        let mut inner = self.inner.lock();
        inner.fetch_count += 1;
        inner.calls.push(StoreCall::Fetch {
            pack: resolved.pack.to_string(),
            dest: dest.to_owned(),
        });

        if let Some(reason) = &inner.denied {
            return Ok(FetchStatus::Denied(reason.clone()));
        }
        if inner.transient_failures > 0 {
            inner.transient_failures -= 1;
            return Ok(FetchStatus::Transient("connection reset".to_string()));
        }
        if inner.park_fetches {
            inner
                .parked
                .insert(ticket.txn.as_u64(), (ticket, resolved.clone(), dest.to_owned()));
            return Ok(FetchStatus::InProgress);
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, pack_contents(&resolved.pack))?;
        Ok(FetchStatus::Complete)
    }

    async fn ensure_proof(&self, pack: &PackRef) -> Result<ProofBundle, StoreError> {
        self.inner.lock().calls.push(StoreCall::EnsureProof {
            pack: pack.to_string(),
        });
        Ok(ProofBundle {
            publisher_proof: format!("publisher-proof:{}", pack.publisher).into_bytes(),
            pack_proof: format!("pack-proof:{pack}").into_bytes(),
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
