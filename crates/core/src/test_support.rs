// SPDX-License-Identifier: MIT

//! Test builders shared with other crates' tests.
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::pack::PackRef;
use crate::state::StateTag;
use crate::txn::{Transaction, TxnKind};
use crate::TxnId;

/// Build a transaction for tests with sensible defaults.
pub struct TxnBuilder {
    id: u64,
    kind: TxnKind,
    pack: String,
    state: StateTag,
    epoch_ms: u64,
}

impl TxnBuilder {
    pub fn install(pack: &str) -> Self {
        Self {
            id: 1,
            kind: TxnKind::Install,
            pack: pack.to_string(),
            state: StateTag::Precheck,
            epoch_ms: 1_000,
        }
    }

    pub fn kind(mut self, kind: TxnKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    pub fn state(mut self, state: StateTag) -> Self {
        self.state = state;
        self
    }

    pub fn created_at(mut self, epoch_ms: u64) -> Self {
        self.epoch_ms = epoch_ms;
        self
    }

    pub fn build(self) -> Transaction {
        let pack: PackRef = self.pack.parse().unwrap_or_else(|_| PackRef::new("test", "pack"));
        Transaction::new(TxnId::new(self.id), self.kind, pack, self.state, self.epoch_ms)
    }
}
