// SPDX-License-Identifier: MIT

//! Boot cookie: reboot detection for restoration.
//!
//! The cookie is the kernel's per-boot id, persisted outside the journal.
//! At startup the daemon compares the persisted cookie with the current one
//! to decide whether transactions waiting on a reboot can be released.

use std::io;
use std::path::PathBuf;

const BOOT_ID_PROC: &str = "/proc/sys/kernel/random/boot_id";

/// Result of comparing the persisted cookie against the current boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootCheck {
    /// Same boot as when the cookie was written.
    SameBoot,
    /// The host rebooted since the cookie was written (or no cookie was
    /// ever written, which restoration treats the same way: the mount
    /// table cannot be trusted).
    Rebooted,
    /// No per-boot id is available on this host; reboot detection is
    /// disabled and waits stay parked.
    Unknown,
}

/// The persisted boot cookie file.
#[derive(Debug, Clone)]
pub struct BootCookie {
    path: PathBuf,
}

impl BootCookie {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The current boot id of the host, if the platform exposes one.
    pub fn current() -> Option<String> {
        std::fs::read_to_string(BOOT_ID_PROC)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// The cookie recorded by a previous run, if any.
    pub fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => {
                let trimmed = data.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist the given cookie via tmp + atomic rename.
    pub fn store(&self, cookie: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, format!("{cookie}\n"))?;
        std::fs::rename(&tmp, &self.path)
    }

    /// Compare persisted vs current and, when a current id exists, persist
    /// it so the next startup compares against this boot.
    pub fn check_and_update(&self) -> io::Result<RebootCheck> {
        self.check_and_update_with(Self::current())
    }

    /// Testable core of [`BootCookie::check_and_update`].
    pub fn check_and_update_with(&self, current: Option<String>) -> io::Result<RebootCheck> {
        let Some(current) = current else {
            return Ok(RebootCheck::Unknown);
        };
        let persisted = self.load()?;
        self.store(&current)?;
        match persisted {
            Some(prev) if prev == current => Ok(RebootCheck::SameBoot),
            _ => Ok(RebootCheck::Rebooted),
        }
    }
}

#[cfg(test)]
#[path = "boot_tests.rs"]
mod tests;
