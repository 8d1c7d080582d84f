// SPDX-License-Identifier: MIT

//! Fake service backend for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{scoped_service, ServiceBackend, ServiceError};
use async_trait::async_trait;
use chef_core::{PackRef, ServiceSpec};
use parking_lot::Mutex;
use std::sync::Arc;

/// Recorded service call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Start { scoped: String },
    Stop { scoped: String },
}

#[derive(Default)]
struct FakeBackendState {
    calls: Vec<ServiceCall>,
    running: Vec<String>,
    start_count: u32,
    /// 1-based start call index that fails, when set.
    fail_start_at: Option<u32>,
}

/// Fake backend recording calls, with a scriptable Nth-start failure.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<FakeBackendState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.inner.lock().calls.clone()
    }

    /// Fail the `n`th start call (1-based).
    pub fn fail_start_at(&self, n: u32) {
        self.inner.lock().fail_start_at = Some(n);
    }
}

#[async_trait]
impl ServiceBackend for FakeBackend {
    async fn start(&self, pack: &PackRef, service: &ServiceSpec) -> Result<(), ServiceError> {
        let scoped = scoped_service(pack, &service.name);
        let mut inner = self.inner.lock();
        inner.start_count += 1;
        inner.calls.push(ServiceCall::Start {
            scoped: scoped.clone(),
        });
        if inner.fail_start_at == Some(inner.start_count) {
            return Err(ServiceError::StartFailed(
                scoped,
                "scripted failure".to_string(),
            ));
        }
        if !inner.running.contains(&scoped) {
            inner.running.push(scoped);
        }
        Ok(())
    }

    async fn stop(&self, pack: &PackRef, name: &str) -> Result<(), ServiceError> {
        let scoped = scoped_service(pack, name);
        let mut inner = self.inner.lock();
        inner.calls.push(ServiceCall::Stop {
            scoped: scoped.clone(),
        });
        let before = inner.running.len();
        inner.running.retain(|s| s != &scoped);
        if inner.running.len() == before {
            return Err(ServiceError::NotRunning(scoped));
        }
        Ok(())
    }

    async fn running(&self) -> Result<Vec<String>, ServiceError> {
        let mut names = self.inner.lock().running.clone();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
