// SPDX-License-Identifier: MIT

//! The durable transaction record.

use crate::id::TxnId;
use crate::log::{LogLevel, TxnLog};
use crate::pack::PackRef;
use crate::progress::Progress;
use crate::state::StateTag;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of transaction, selecting the state set it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnKind {
    /// Internal transaction exempt from tuple admission control (e.g. the
    /// synthetic restoration mount pass).
    Ephemeral,
    Install,
    Uninstall,
    Update,
    /// Runs the update sequence against the previously installed revision.
    Rollback,
    /// Refreshes the application index and command wrappers in place.
    Configure,
}

impl TxnKind {
    pub fn is_ephemeral(self) -> bool {
        matches!(self, TxnKind::Ephemeral)
    }
}

impl fmt::Display for TxnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnKind::Ephemeral => write!(f, "ephemeral"),
            TxnKind::Install => write!(f, "install"),
            TxnKind::Uninstall => write!(f, "uninstall"),
            TxnKind::Update => write!(f, "update"),
            TxnKind::Rollback => write!(f, "rollback"),
            TxnKind::Configure => write!(f, "configure"),
        }
    }
}

/// The external condition a suspended transaction is parked on.
///
/// Non-`None` only while the current state is a waiting state. A
/// timer-driven wait (download backoff) is `None`: nothing external is
/// being waited for, the scheduler owns the wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Wait {
    #[default]
    None,
    /// Waiting for another transaction (a spawned dependency) to finish.
    OnTxn { id: TxnId },
    /// Waiting for the host to reboot; paired with the boot cookie
    /// persisted outside the journal.
    OnReboot,
}

impl Wait {
    pub fn is_none(&self) -> bool {
        matches!(self, Wait::None)
    }
}

/// A durable transaction record.
///
/// Everything here survives restarts via the journal; the live handler
/// context is rebuilt from identity on restore. Once a transaction is
/// terminal its `state` and `completed_at_ms` never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxnId,
    pub kind: TxnKind,
    /// The pack this transaction operates on.
    pub pack: PackRef,
    /// Short human name, e.g. `install acme/foo`. Immutable after creation.
    pub name: String,
    /// Longer human description. Immutable after creation.
    pub description: String,
    pub state: StateTag,
    #[serde(default)]
    pub wait: Wait,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub log: TxnLog,
    /// Cumulative retry count across the transaction (telemetry).
    #[serde(default)]
    pub retries: u32,
    /// Download attempts so far. Durable so the retry cap holds across
    /// restarts.
    #[serde(default)]
    pub attempts: u32,
}

impl Transaction {
    pub fn new(id: TxnId, kind: TxnKind, pack: PackRef, initial: StateTag, epoch_ms: u64) -> Self {
        let name = format!("{kind} {pack}");
        let description = format!("{kind} transaction for pack {pack}");
        Self {
            id,
            kind,
            pack,
            name,
            description,
            state: initial,
            wait: Wait::None,
            created_at_ms: epoch_ms,
            completed_at_ms: None,
            progress: Progress::default(),
            log: TxnLog::new(),
            retries: 0,
            attempts: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Record entry into a new state. Clears any wait condition. A terminal
    /// transaction is frozen: the call is ignored.
    pub fn enter_state(&mut self, state: StateTag) {
        if self.is_terminal() {
            return;
        }
        self.state = state;
        self.wait = Wait::None;
    }

    /// Set the wait condition. Only meaningful in a waiting state.
    pub fn set_wait(&mut self, wait: Wait) {
        if !self.is_terminal() {
            self.wait = wait;
        }
    }

    /// Stamp the completion time, once. Repeated calls are ignored so a
    /// terminal record never changes.
    pub fn finish(&mut self, epoch_ms: u64) {
        if self.completed_at_ms.is_none() {
            self.completed_at_ms = Some(epoch_ms);
        }
    }

    pub fn log_info(&mut self, at_ms: u64, message: impl Into<String>) {
        self.log.push(LogLevel::Info, at_ms, self.state, message);
    }

    pub fn log_warning(&mut self, at_ms: u64, message: impl Into<String>) {
        self.log.push(LogLevel::Warning, at_ms, self.state, message);
    }

    pub fn log_error(&mut self, at_ms: u64, message: impl Into<String>) {
        self.log.push(LogLevel::Error, at_ms, self.state, message);
    }

    pub fn summary(&self) -> TxnSummary {
        TxnSummary {
            id: self.id,
            kind: self.kind,
            pack: self.pack.clone(),
            name: self.name.clone(),
            state: self.state,
            wait: self.wait,
            pct: self.progress.last_reported_pct,
            retries: self.retries,
            created_at_ms: self.created_at_ms,
            completed_at_ms: self.completed_at_ms,
        }
    }
}

/// Status DTO returned by the scheduler's observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxnSummary {
    pub id: TxnId,
    pub kind: TxnKind,
    pub pack: PackRef,
    pub name: String,
    pub state: StateTag,
    pub wait: Wait,
    pub pct: u8,
    pub retries: u32,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

#[cfg(test)]
#[path = "txn_tests.rs"]
mod tests;
