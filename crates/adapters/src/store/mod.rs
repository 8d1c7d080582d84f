// SPDX-License-Identifier: MIT

//! Package store adapter: resolves pack references against the remote
//! index and produces local, content-addressed pack files.

mod http;

pub use http::HttpPackStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePackStore, StoreCall};

use async_trait::async_trait;
use chef_core::{PackRef, TxnId};
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from package store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pack not found in index: {0}")]
    NotFound(String),
    #[error("index request failed: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A pack reference resolved against the index: revision pinned, size and
/// content digest known, dependency set attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPack {
    /// The reference with its revision pinned.
    pub pack: PackRef,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the pack file contents.
    pub digest: String,
    pub platform: String,
    pub dependencies: Vec<PackRef>,
}

/// Result of a fetch request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus {
    /// The pack file is present at the destination and digest-complete.
    Complete,
    /// The store took ownership of the download; a [`FetchDone`] will be
    /// delivered through the ticket when it settles.
    InProgress,
    /// Transient failure (network, 5xx); worth retrying.
    Transient(String),
    /// Permanent failure (404, missing signature metadata); do not retry.
    Denied(String),
}

/// Completion notice for an in-progress fetch, delivered through the
/// ticket's channel back to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchDone {
    pub txn: TxnId,
    pub status: FetchStatus,
}

/// Routing handle passed to [`PackStore::fetch`] so an asynchronous
/// download can report back to the driving transaction.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub txn: TxnId,
    pub tx: mpsc::Sender<FetchDone>,
}

/// Proof material fetched alongside a pack, consumed by the proof verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBundle {
    pub publisher_proof: Vec<u8>,
    pub pack_proof: Vec<u8>,
}

/// Adapter for the remote package index and downloader.
#[async_trait]
pub trait PackStore: Clone + Send + Sync + 'static {
    /// Resolve a reference against the index. Pins the revision when the
    /// reference leaves it open.
    async fn resolve(&self, pack: &PackRef) -> Result<ResolvedPack, StoreError>;

    /// Produce the pack file at `dest`. Must return in bounded time: a
    /// long download is started in the background and reported through the
    /// ticket, with `InProgress` returned immediately.
    async fn fetch(
        &self,
        resolved: &ResolvedPack,
        dest: &Path,
        ticket: FetchTicket,
    ) -> Result<FetchStatus, StoreError>;

    /// Fetch the publisher and pack proofs for verification.
    async fn ensure_proof(&self, pack: &PackRef) -> Result<ProofBundle, StoreError>;
}
