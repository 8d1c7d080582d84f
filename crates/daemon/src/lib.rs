// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! chef-daemon: lifecycle and wiring for the chefd pack daemon

pub mod bus;
pub mod config;
pub mod lifecycle;

pub use bus::EventBus;
pub use config::Config;
pub use lifecycle::{startup, Daemon, DaemonScheduler, LifecycleError};
