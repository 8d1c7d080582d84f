// SPDX-License-Identifier: MIT

//! Daemon lifecycle management: startup, restoration, shutdown.

use std::fs::File;
use std::path::PathBuf;

use fs2::FileExt;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use chef_adapters::{HttpPackStore, ProcessBackend, ProcessMounter, ProcessVerifier};
use chef_core::SystemClock;
use chef_engine::{EngineError, Scheduler, SchedulerDeps, SchedulerHandle};
use chef_storage::{BootCookie, Journal, TxnIdAllocator};
use thiserror::Error;

use crate::bus::EventBus;
use crate::config::Config;

/// Scheduler with the daemon's concrete adapter types.
pub type DaemonScheduler =
    Scheduler<HttpPackStore, ProcessVerifier, ProcessMounter, ProcessBackend, SystemClock>;

type ProductionDeps = SchedulerDeps<HttpPackStore, ProcessVerifier, ProcessMounter, ProcessBackend>;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("invalid config {path}: {msg}", path = .0.display(), msg = .1)]
    BadConfig(PathBuf, String),

    #[error("journal error: {0}")]
    Journal(#[from] chef_storage::JournalError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A started daemon: the scheduler task plus everything needed to talk to
/// it and to shut it down.
#[derive(Debug)]
pub struct Daemon {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Handle the RPC surface submits through
    pub handle: SchedulerHandle,
    /// Event fan-out for subscribers
    pub bus: EventBus,
    /// The scheduler's driver task
    pub engine: JoinHandle<Result<(), EngineError>>,
}

impl Daemon {
    /// Graceful shutdown: stop the scheduler (flushing the journal), then
    /// release the pid file.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("shutting down chefd");
        self.handle.shutdown().await;
        match self.engine.await {
            Ok(result) => result?,
            Err(e) => warn!(error = %e, "scheduler task did not join cleanly"),
        }

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove pid file");
            }
        }
        info!("chefd shutdown complete");
        Ok(())
    }
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    match startup_inner(config).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock:
            // the pid file belongs to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) && config.lock_path.exists() {
                let _ = std::fs::remove_file(&config.lock_path);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Acquire the lock FIRST - prevents races. Avoid truncating before the
    // lock is held, which would wipe the running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    {
        use std::io::Write;
        let mut lock_file = &lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    let layout = config.layout();

    // Journal and id allocator
    let (journal, records) = Journal::open(&config.journal_path)?;
    let floor = Journal::max_id(&records);
    let allocator = TxnIdAllocator::open(&config.seq_path, floor)?;
    info!(records = records.len(), "journal opened");

    // Reboot detection against the persisted boot cookie
    let reboot = BootCookie::new(layout.boot_cookie()).check_and_update()?;
    info!(?reboot, "boot cookie checked");

    // Collaborators. Helper binaries carry the protocol details; the
    // daemon only drives them.
    let deps = production_adapters();

    let bus = EventBus::default();
    let (mut scheduler, handle) = Scheduler::new(
        deps,
        layout,
        config.engine_config(),
        SystemClock,
        journal,
        allocator,
        bus.sender(),
    );

    scheduler.restore(records, reboot).await?;

    let engine = tokio::spawn(scheduler.run());
    info!("chefd started");

    Ok(Daemon {
        config: config.clone(),
        lock_file,
        handle,
        bus,
        engine,
    })
}

fn production_adapters() -> ProductionDeps {
    let index_url = std::env::var("CHEFD_INDEX_URL")
        .unwrap_or_else(|_| "https://packs.chef.dev".to_string());
    SchedulerDeps {
        store: HttpPackStore::new("chef-fetch", index_url),
        verifier: ProcessVerifier::new("chef-verify"),
        mounter: ProcessMounter::new("chef-imgmount"),
        services: ProcessBackend::new(),
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
