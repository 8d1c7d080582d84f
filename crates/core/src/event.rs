// SPDX-License-Identifier: MIT

//! Events published to the RPC surface.
//!
//! Serializes with `{"type": "txn:name", ...fields}` format; subscribers
//! stream these over whatever transport the daemon front-end provides.

use crate::id::TxnId;
use crate::log::LogEntry;
use crate::state::StateTag;
use serde::{Deserialize, Serialize};

/// Notification emitted by the scheduler after it mutates a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The transaction transitioned into a new state.
    #[serde(rename = "txn:state-changed")]
    StateChanged { id: TxnId, state: StateTag },

    /// The integer progress percentage advanced.
    #[serde(rename = "txn:progress")]
    Progress {
        id: TxnId,
        pct: u8,
        bytes_current: u64,
        bytes_total: u64,
    },

    /// A log entry was appended to the transaction's log sink.
    #[serde(rename = "txn:log")]
    Log { id: TxnId, entry: LogEntry },

    /// The transaction reached a terminal state.
    #[serde(rename = "txn:terminal")]
    Terminal {
        id: TxnId,
        state: StateTag,
        completed_at_ms: u64,
    },
}

impl Event {
    /// The transaction this event concerns.
    pub fn txn_id(&self) -> TxnId {
        match self {
            Event::StateChanged { id, .. }
            | Event::Progress { id, .. }
            | Event::Log { id, .. }
            | Event::Terminal { id, .. } => *id,
        }
    }

    /// Short name for tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Event::StateChanged { .. } => "state-changed",
            Event::Progress { .. } => "progress",
            Event::Log { .. } => "log",
            Event::Terminal { .. } => "terminal",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
