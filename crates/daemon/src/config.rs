// SPDX-License-Identifier: MIT

//! Daemon configuration: state directory resolution, fixed paths, and
//! tunables from an optional `chefd.toml`.

use chef_core::Layout;
use chef_engine::EngineConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root the managed filesystem trees hang off (default `/`).
    pub root: PathBuf,
    /// State directory (e.g. ~/.local/state/chef)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the transaction journal
    pub journal_path: PathBuf,
    /// Path to the transaction-id sequence file
    pub seq_path: PathBuf,
    /// Engine tunables, defaults overlaid with `chefd.toml`
    pub tunables: Tunables,
}

/// Optional overrides read from `<state_dir>/chefd.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tunables {
    /// Maximum download attempts per transaction.
    pub retry_cap: Option<u32>,
    /// Concurrent transactions in the download/install phases.
    pub concurrency: Option<usize>,
    /// Seconds a transaction may wait on its dependencies.
    pub dependency_timeout_secs: Option<u64>,
    /// Seconds terminal transactions are retained for late queries.
    pub grace_secs: Option<u64>,
}

impl Config {
    /// Load configuration for the daemon.
    ///
    /// The state directory comes from `CHEFD_STATE_DIR` (tests), then
    /// `$XDG_STATE_HOME/chef`, then `~/.local/state/chef`. The managed
    /// root comes from `CHEFD_ROOT` (default `/`).
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;
        let root = std::env::var("CHEFD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/"));
        Self::load_from(state_dir, root)
    }

    /// Build a configuration against explicit directories.
    pub fn load_from(state_dir: PathBuf, root: PathBuf) -> Result<Self, LifecycleError> {
        let tunables = read_tunables(&state_dir.join("chefd.toml"))?;
        Ok(Self {
            root,
            lock_path: state_dir.join("chefd.pid"),
            log_path: state_dir.join("chefd.log"),
            journal_path: state_dir.join("journal").join("txn.journal"),
            seq_path: state_dir.join("journal").join("txn.seq"),
            state_dir,
            tunables,
        })
    }

    /// The filesystem layout under the managed root.
    pub fn layout(&self) -> Layout {
        Layout::new(&self.root)
    }

    /// Engine configuration: defaults overlaid with the tunables.
    pub fn engine_config(&self) -> EngineConfig {
        let mut cfg = EngineConfig::default();
        if let Some(retry_cap) = self.tunables.retry_cap {
            cfg.retry_cap = retry_cap;
        }
        if let Some(concurrency) = self.tunables.concurrency {
            cfg.phase_limit = concurrency;
        }
        if let Some(secs) = self.tunables.dependency_timeout_secs {
            cfg.dep_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.tunables.grace_secs {
            cfg.grace = Duration::from_secs(secs);
        }
        cfg
    }
}

fn read_tunables(path: &std::path::Path) -> Result<Tunables, LifecycleError> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            toml::from_str(&text).map_err(|e| LifecycleError::BadConfig(path.to_owned(), e.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Tunables::default()),
        Err(e) => Err(e.into()),
    }
}

/// Get the state directory for chefd
fn state_dir() -> Result<PathBuf, LifecycleError> {
    // CHEFD_STATE_DIR takes priority (used by tests for isolation)
    if let Ok(dir) = std::env::var("CHEFD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }

    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("chef"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/chef"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
