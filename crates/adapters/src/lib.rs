// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Collaborator adapters for the chef pack daemon: package store, proof
//! verifier, image mounter, and service backend.

pub mod mount;
pub mod services;
pub mod store;
pub mod verify;

pub use mount::{ImageMounter, MountError, ProcessMounter};
pub use services::{scoped_service, ProcessBackend, ServiceBackend, ServiceError};
pub use store::{
    FetchDone, FetchStatus, FetchTicket, HttpPackStore, PackStore, ProofBundle, ResolvedPack,
    StoreError,
};
pub use verify::{ProcessVerifier, ProofVerifier, VerifyError};

#[cfg(any(test, feature = "test-support"))]
pub use mount::FakeMounter;
#[cfg(any(test, feature = "test-support"))]
pub use services::FakeBackend;
#[cfg(any(test, feature = "test-support"))]
pub use store::FakePackStore;
#[cfg(any(test, feature = "test-support"))]
pub use verify::FakeVerifier;
