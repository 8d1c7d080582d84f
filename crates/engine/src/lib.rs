// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! chef-engine: the transaction engine of the chef pack daemon

pub mod catalog;
mod context;
mod error;
mod handlers;
mod index;
pub mod machine;
mod restore;
mod scheduler;
mod timers;

pub use context::TxnCtx;
pub use error::{EngineError, SubmitError};
pub use index::AppIndex;
pub use machine::{Machine, MachineError, StateDescriptor, StateSet, Step};
pub use scheduler::{
    host_platform, CancelReply, Cmd, EngineConfig, Scheduler, SchedulerDeps, SchedulerHandle,
};
pub use timers::Timers;
