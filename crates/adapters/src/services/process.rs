// SPDX-License-Identifier: MIT

//! Service backend that spawns service processes directly.
//!
//! Stand-in for a full container backend: each service runs as a child
//! process of the daemon, keyed by its scoped name.

use super::{scoped_service, ServiceBackend, ServiceError};
use async_trait::async_trait;
use chef_core::{PackRef, ServiceSpec};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Process-per-service backend.
#[derive(Clone, Default)]
pub struct ProcessBackend {
    children: Arc<Mutex<HashMap<String, tokio::process::Child>>>,
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceBackend for ProcessBackend {
    async fn start(&self, pack: &PackRef, service: &ServiceSpec) -> Result<(), ServiceError> {
        let scoped = scoped_service(pack, &service.name);

        {
            let mut children = self.children.lock();
            if let Some(child) = children.get_mut(&scoped) {
                if child.try_wait().ok().flatten().is_none() {
                    return Ok(()); // already running
                }
                children.remove(&scoped);
            }
        }

        let mut parts = service.exec.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ServiceError::StartFailed(scoped.clone(), "empty exec".to_string()))?;
        let child = tokio::process::Command::new(program)
            .args(parts)
            .spawn()
            .map_err(|e| ServiceError::StartFailed(scoped.clone(), e.to_string()))?;

        info!(service = %scoped, "started service");
        self.children.lock().insert(scoped, child);
        Ok(())
    }

    async fn stop(&self, pack: &PackRef, name: &str) -> Result<(), ServiceError> {
        let scoped = scoped_service(pack, name);
        let child = self.children.lock().remove(&scoped);
        match child {
            Some(mut child) => {
                if let Err(e) = child.start_kill() {
                    warn!(service = %scoped, error = %e, "kill failed");
                }
                let _ = child.wait().await;
                info!(service = %scoped, "stopped service");
                Ok(())
            }
            None => Err(ServiceError::NotRunning(scoped)),
        }
    }

    async fn running(&self) -> Result<Vec<String>, ServiceError> {
        let mut children = self.children.lock();
        children.retain(|_, child| child.try_wait().ok().flatten().is_none());
        let mut names: Vec<_> = children.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
