// SPDX-License-Identifier: MIT

//! Service backend adapter: starts and stops the long-running services a
//! pack declares, via the container backend.

mod process;

pub use process::ProcessBackend;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBackend, ServiceCall};

use async_trait::async_trait;
use chef_core::{PackRef, ServiceSpec};
use thiserror::Error;

/// Errors from service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to start service {0}: {1}")]
    StartFailed(String, String),
    #[error("service not running: {0}")]
    NotRunning(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Scoped service name as the backend tracks it: `publisher/package/name`.
pub fn scoped_service(pack: &PackRef, name: &str) -> String {
    format!("{}/{}/{}", pack.publisher, pack.package, name)
}

/// Adapter for the container backend that hosts pack services.
#[async_trait]
pub trait ServiceBackend: Clone + Send + Sync + 'static {
    /// Start a service declared by the pack. Idempotent: starting an
    /// already-running service succeeds.
    async fn start(&self, pack: &PackRef, service: &ServiceSpec) -> Result<(), ServiceError>;

    /// Stop a service by name.
    async fn stop(&self, pack: &PackRef, name: &str) -> Result<(), ServiceError>;

    /// Scoped names of currently running services.
    async fn running(&self) -> Result<Vec<String>, ServiceError>;
}
