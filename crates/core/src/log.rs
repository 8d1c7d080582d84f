// SPDX-License-Identifier: MIT

//! Per-transaction log sink: a bounded, ordered ring of state-tagged entries.

use crate::state::StateTag;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Maximum stored length of a log message, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 512;

/// Hard cap on retained entries per transaction.
pub const MAX_ENTRIES: usize = 256;

/// Severity of a transaction log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// A single log entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub at_ms: u64,
    /// State the transaction was in when the entry was written.
    pub state: StateTag,
    pub message: String,
}

/// Bounded ordered log for one transaction.
///
/// Appending is O(1). When the cap is reached the oldest entry is evicted
/// and an eviction marker is synthesized at the head of [`TxnLog::entries`]
/// so readers can tell entries were lost rather than never written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnLog {
    entries: VecDeque<LogEntry>,
    #[serde(default)]
    evicted: u64,
}

impl TxnLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, truncating the message to [`MAX_MESSAGE_BYTES`] and
    /// evicting the oldest entry once the cap is reached.
    pub fn push(&mut self, level: LogLevel, at_ms: u64, state: StateTag, message: impl Into<String>) {
        let mut message = message.into();
        if message.len() > MAX_MESSAGE_BYTES {
            let mut cut = MAX_MESSAGE_BYTES;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }

        if self.entries.len() == MAX_ENTRIES {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(LogEntry {
            level,
            at_ms,
            state,
            message,
        });
    }

    /// Number of retained entries (excluding any synthesized marker).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries lost to eviction.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Snapshot of the log in order, prefixed by an eviction marker when
    /// entries have been lost.
    pub fn entries(&self) -> Vec<LogEntry> {
        let mut out = Vec::with_capacity(self.entries.len() + 1);
        if self.evicted > 0 {
            let first_ms = self.entries.front().map(|e| e.at_ms).unwrap_or(0);
            let first_state = self
                .entries
                .front()
                .map(|e| e.state)
                .unwrap_or(StateTag::Precheck);
            out.push(LogEntry {
                level: LogLevel::Warning,
                at_ms: first_ms,
                state: first_state,
                message: format!("({} earlier entries evicted)", self.evicted),
            });
        }
        out.extend(self.entries.iter().cloned());
        out
    }

    /// The most recent entry, if any.
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
