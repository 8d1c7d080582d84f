// SPDX-License-Identifier: MIT

//! Per-transaction handler context.
//!
//! Nothing here is durable: the context is rebuilt from the transaction's
//! identity after a restart, and every handler tolerates starting from an
//! empty one by re-deriving what it needs (re-resolving the pack,
//! re-reading the manifest from the mounted image).

use chef_adapters::{ProofBundle, ResolvedPack};
use chef_core::{PackManifest, PackRef, TxnId, Wait};
use std::time::Duration;

/// Mutable working state the action handlers share within one transaction.
#[derive(Debug, Default)]
pub struct TxnCtx {
    /// Index resolution result; populated by precheck, re-derived on
    /// re-entry when absent.
    pub resolved: Option<ResolvedPack>,
    /// Proof material fetched for verification.
    pub proof: Option<ProofBundle>,
    /// Manifest read from the mounted image by load.
    pub manifest: Option<PackManifest>,
    /// Dependency install transactions spawned on behalf of this one.
    pub children: Vec<TxnId>,
    /// Dependencies the handler wants spawned; drained by the scheduler.
    pub dep_requests: Vec<PackRef>,
    /// Backoff the retry state asked for; drained by the scheduler.
    pub backoff: Option<Duration>,
    /// Wait condition to record when the transaction parks.
    pub pending_wait: Wait,
    /// Cooperative cancellation flag; handlers check it on entry.
    pub cancel_requested: bool,
    /// The cancel arrived during irreversible teardown and was downgraded:
    /// the transaction runs forward to completed or error regardless.
    pub cancel_downgraded: bool,
    /// Mount every installed pack instead of just this transaction's
    /// (restoration's synthetic pass).
    pub mount_all: bool,
    /// Revision installed before an update/rollback swap.
    pub previous_revision: Option<u32>,
}

impl TxnCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for the synthetic restoration transaction.
    pub fn for_mount_all() -> Self {
        Self {
            mount_all: true,
            ..Self::default()
        }
    }
}
