// SPDX-License-Identifier: MIT

//! Event bus: fan-out of scheduler events to RPC subscribers.
//!
//! The scheduler publishes [`chef_core::Event`]s as it mutates
//! transactions; the RPC surface subscribes here and streams them to
//! clients. Slow subscribers lag and observe a gap rather than blocking
//! the engine.

use chef_core::Event;
use tokio::sync::broadcast;

/// Broadcast bus for published transaction events.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// The sending half handed to the scheduler.
    pub fn sender(&self) -> broadcast::Sender<Event> {
        self.tx.clone()
    }

    /// Subscribe to the event stream from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
