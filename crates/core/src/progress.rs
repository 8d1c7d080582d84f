// SPDX-License-Identifier: MIT

//! Byte-oriented transaction progress with rate-limited reporting.

use serde::{Deserialize, Serialize};

/// I/O progress counters for a transaction.
///
/// `bytes_current` never exceeds `bytes_total` (when a total is known), and
/// `last_reported_pct` is monotonic non-decreasing: progress events are
/// emitted only when the integer percentage advances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub bytes_current: u64,
    pub bytes_total: u64,
    pub last_reported_pct: u8,
}

impl Progress {
    /// Set the expected total. An already-advanced current count is kept.
    pub fn set_total(&mut self, total: u64) {
        self.bytes_total = total;
        if total > 0 && self.bytes_current > total {
            self.bytes_current = total;
        }
    }

    /// Set the current byte count, clamped to the total when one is known.
    pub fn set_current(&mut self, current: u64) {
        self.bytes_current = if self.bytes_total > 0 {
            current.min(self.bytes_total)
        } else {
            current
        };
    }

    /// Integer percentage of completion; 0 when no total is known.
    pub fn percentage(&self) -> u8 {
        if self.bytes_total == 0 {
            return 0;
        }
        ((self.bytes_current * 100) / self.bytes_total) as u8
    }

    /// Returns `Some(pct)` exactly when the integer percentage has advanced
    /// past the last reported value, recording the new high-water mark.
    pub fn report(&mut self) -> Option<u8> {
        let pct = self.percentage();
        if pct > self.last_reported_pct {
            self.last_reported_pct = pct;
            Some(pct)
        } else {
            None
        }
    }

    /// Force the counters to a completed 100%.
    ///
    /// Used on terminal success so a transaction with no byte work still
    /// finishes at 100.
    pub fn complete(&mut self) -> Option<u8> {
        if self.bytes_total == 0 {
            self.bytes_total = 1;
        }
        self.bytes_current = self.bytes_total;
        self.report()
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
