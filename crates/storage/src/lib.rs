// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for the chef pack daemon

mod boot;
mod journal;
mod seq;

pub use boot::{BootCookie, RebootCheck};
pub use journal::{Journal, JournalError};
pub use seq::TxnIdAllocator;
