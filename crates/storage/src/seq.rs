// SPDX-License-Identifier: MIT

//! Monotonic transaction-id allocation, persisted across restarts.

use chef_core::TxnId;
use std::io;
use std::path::{Path, PathBuf};

/// File-backed allocator for transaction ids.
///
/// The last allocated id is written to `txn.seq` via tmp + atomic rename on
/// every allocation, so a restart resumes above it. `open` additionally
/// floors the counter at the highest id seen in the journal: even if the
/// seq file is lost, ids never regress while journal records exist.
#[derive(Debug)]
pub struct TxnIdAllocator {
    path: PathBuf,
    last: u64,
}

impl TxnIdAllocator {
    pub fn open(path: &Path, journal_floor: u64) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let persisted = match std::fs::read_to_string(path) {
            Ok(data) => data.trim().parse::<u64>().unwrap_or(0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: path.to_owned(),
            last: persisted.max(journal_floor),
        })
    }

    /// Allocate the next id, persisting the new high-water mark before
    /// returning it.
    pub fn next(&mut self) -> io::Result<TxnId> {
        let id = self.last + 1;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, format!("{id}\n"))?;
        std::fs::rename(&tmp, &self.path)?;
        self.last = id;
        Ok(TxnId::new(id))
    }

    /// The most recently allocated id (0 before any allocation).
    pub fn last(&self) -> u64 {
        self.last
    }
}

#[cfg(test)]
#[path = "seq_tests.rs"]
mod tests;
