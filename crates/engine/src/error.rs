// SPDX-License-Identifier: MIT

//! Engine error types

use chef_core::StateTag;
use thiserror::Error;

/// Internal engine failures. A journal error escaping the driver loop is
/// fatal: the daemon exits non-zero and restoration picks up from the last
/// durable record.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("journal error: {0}")]
    Journal(#[from] chef_storage::JournalError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state machine error: {0}")]
    Machine(#[from] crate::machine::MachineError),
    #[error("cannot restore transaction in state {0}")]
    Unrestorable(StateTag),
    #[error("restoration failed: {0}")]
    Restore(String),
    #[error("scheduler is no longer running")]
    SchedulerGone,
}

/// Rejections surfaced to the submitting client before a transaction is
/// created.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a live transaction already exists for {0}/{1}")]
    Conflict(String, String),
    #[error("{0} requires a pinned revision (publisher/package@rev)")]
    RevisionRequired(chef_core::TxnKind),
    #[error("transaction engine is shutting down")]
    Unavailable,
    #[error("failed to persist transaction: {0}")]
    Persist(String),
}
