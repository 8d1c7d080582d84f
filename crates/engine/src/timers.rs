// SPDX-License-Identifier: MIT

//! Per-transaction timer wheel: retry backoff and dependency timeouts.

use chef_core::TxnId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Manages the wake-up timers parked transactions are sleeping on.
///
/// At most one timer per transaction: setting a new one replaces the old.
#[derive(Debug, Default)]
pub struct Timers {
    timers: HashMap<TxnId, Instant>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer for a transaction.
    pub fn set(&mut self, id: TxnId, duration: Duration, now: Instant) {
        self.timers.insert(id, now + duration);
    }

    /// Disarm a transaction's timer.
    pub fn cancel(&mut self, id: TxnId) {
        self.timers.remove(&id);
    }

    /// Pop every transaction whose timer has fired.
    pub fn fired(&mut self, now: Instant) -> Vec<TxnId> {
        let mut fired: Vec<TxnId> = self
            .timers
            .iter()
            .filter(|(_, fires_at)| **fires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        fired.sort();
        for id in &fired {
            self.timers.remove(id);
        }
        fired
    }

    /// The next wake-up instant, if any timer is armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
#[path = "timers_tests.rs"]
mod tests;
