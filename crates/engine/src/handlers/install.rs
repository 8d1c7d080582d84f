// SPDX-License-Identifier: MIT

//! Pack store mutations: install, the update/rollback swap, uninstall.

use super::{atomic_write, ensure_resolved, sha256_file, ActionEnv};
use crate::context::TxnCtx;
use chef_adapters::{ImageMounter, PackStore, ProofVerifier, ServiceBackend};
use chef_core::{Clock, Outcome, Transaction};
use std::path::Path;

/// Write the staged pack into the store, keyed by
/// `(publisher, package, revision)`.
///
/// Idempotent under re-entry: an existing target with a matching content
/// hash is success; a partial one is deleted and rewritten from the staged
/// artifact.
pub(super) async fn install<P, V, M, B, C>(
    env: &mut ActionEnv<'_, P, V, M, B, C>,
    txn: &mut Transaction,
    ctx: &mut TxnCtx,
) -> Outcome
where
    P: PackStore,
    V: ProofVerifier,
    M: ImageMounter,
    B: ServiceBackend,
    C: Clock,
{
    let at = env.clock.epoch_ms();

    if let Err(failed) = ensure_resolved(env, txn, ctx).await {
        return failed;
    }
    let Some(resolved) = ctx.resolved.clone() else {
        return Outcome::Failed;
    };
    let (Some(target), Some(staged)) = (
        env.layout.pack_file(&resolved.pack),
        env.layout.staging_file(&resolved.pack),
    ) else {
        return Outcome::Failed;
    };

    if super::cancel_pending(ctx) {
        let _ = std::fs::remove_file(&staged);
        txn.log_info(at, "cancelled before install");
        return Outcome::Cancel;
    }

    if target.exists() {
        match sha256_file(&target) {
            Ok(digest) if digest == resolved.digest => {
                let _ = std::fs::remove_file(&staged);
                txn.progress.set_current(resolved.size_bytes);
                txn.log_info(at, format!("{} already in pack store", resolved.pack));
                return Outcome::Ok;
            }
            _ => {
                txn.log_warning(at, "partial pack file detected, rewriting");
                let _ = std::fs::remove_file(&target);
            }
        }
    }

    if !staged.exists() {
        txn.log_error(at, "staged artifact is missing");
        return Outcome::Failed;
    }

    let contents = match std::fs::read(&staged) {
        Ok(contents) => contents,
        Err(e) => {
            txn.log_error(at, format!("cannot read staged pack: {e}"));
            return Outcome::Failed;
        }
    };
    if let Err(e) = atomic_write(&target, &contents, false) {
        txn.log_error(at, format!("cannot write pack file: {e}"));
        return Outcome::Failed;
    }
    let _ = std::fs::remove_file(&staged);

    txn.progress.set_current(resolved.size_bytes);
    txn.log_info(at, format!("installed {} into pack store", resolved.pack));
    Outcome::Ok
}

/// The update/rollback swap: delete the previous revision's pack file,
/// then move the staged new revision into place.
///
/// Crash-atomic: the staged artifact survives until the rename, so a retry
/// always finds either the old pack, the staged new one, or the completed
/// swap.
pub(super) async fn update_swap<P, V, M, B, C>(
    env: &mut ActionEnv<'_, P, V, M, B, C>,
    txn: &mut Transaction,
    ctx: &mut TxnCtx,
) -> Outcome
where
    P: PackStore,
    V: ProofVerifier,
    M: ImageMounter,
    B: ServiceBackend,
    C: Clock,
{
    let at = env.clock.epoch_ms();
    // Irreversible: a cancel request is recorded but the swap runs forward.

    if let Err(failed) = ensure_resolved(env, txn, ctx).await {
        return failed;
    }
    let Some(resolved) = ctx.resolved.clone() else {
        return Outcome::Failed;
    };
    let (Some(target), Some(staged)) = (
        env.layout.pack_file(&resolved.pack),
        env.layout.staging_file(&resolved.pack),
    ) else {
        return Outcome::Failed;
    };

    // Completed swap from a previous attempt.
    if target.exists() {
        if let Ok(digest) = sha256_file(&target) {
            if digest == resolved.digest {
                remove_other_revisions(env, txn, &resolved.pack, at);
                let _ = std::fs::remove_file(&staged);
                txn.log_info(at, format!("swap to {} already complete", resolved.pack));
                return Outcome::Ok;
            }
        }
        txn.log_warning(at, "partial pack file detected, rewriting");
        let _ = std::fs::remove_file(&target);
    }

    if !staged.exists() {
        txn.log_error(at, "no staged pack to swap in");
        return Outcome::Failed;
    }

    // Previous revision first, then the rename; the staged file keeps the
    // new revision installable if the daemon dies in between.
    remove_other_revisions(env, txn, &resolved.pack, at);
    if let Some(parent) = target.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            txn.log_error(at, format!("cannot create pack store: {e}"));
            return Outcome::Failed;
        }
    }
    if let Err(e) = std::fs::rename(&staged, &target) {
        txn.log_error(at, format!("swap rename failed: {e}"));
        return Outcome::Failed;
    }

    txn.progress.set_current(resolved.size_bytes);
    txn.log_info(at, format!("swapped {} into place", resolved.pack));
    Outcome::Ok
}

/// Remove every pack file for the tuple except the given revision.
fn remove_other_revisions<P, V, M, B, C>(
    env: &ActionEnv<'_, P, V, M, B, C>,
    txn: &mut Transaction,
    keep: &chef_core::PackRef,
    at: u64,
) {
    let installed = env.layout.installed_packs().unwrap_or_default();
    for (pack, path) in installed {
        if pack.tuple() == keep.tuple() && pack.revision != keep.revision {
            match std::fs::remove_file(&path) {
                Ok(()) => txn.log_info(at, format!("removed previous revision {pack}")),
                Err(e) => txn.log_warning(at, format!("cannot remove {pack}: {e}")),
            }
        }
    }
}

/// Delete the pack's files from the store and its per-package data.
pub(super) async fn uninstall<P, V, M, B, C>(
    env: &mut ActionEnv<'_, P, V, M, B, C>,
    txn: &mut Transaction,
    _ctx: &mut TxnCtx,
) -> Outcome
where
    P: PackStore,
    V: ProofVerifier,
    M: ImageMounter,
    B: ServiceBackend,
    C: Clock,
{
    let at = env.clock.epoch_ms();
    // Irreversible: runs forward regardless of cancellation.

    let installed = match env.layout.installed_packs() {
        Ok(installed) => installed,
        Err(e) => {
            txn.log_error(at, format!("cannot inspect pack store: {e}"));
            return Outcome::Failed;
        }
    };

    let mut removed = 0;
    for (pack, path) in installed {
        if pack.tuple() != txn.pack.tuple() {
            continue;
        }
        if let Err(e) = std::fs::remove_file(&path) {
            txn.log_error(at, format!("cannot remove {pack}: {e}"));
            return Outcome::Failed;
        }
        removed += 1;
    }

    let data_dir = env.layout.package_dir(&txn.pack);
    if let Err(e) = remove_dir_if_present(&data_dir) {
        txn.log_error(at, format!("cannot remove pack data: {e}"));
        return Outcome::Failed;
    }

    txn.log_info(at, format!("uninstalled {} ({removed} pack files)", txn.pack));
    Outcome::Ok
}

fn remove_dir_if_present(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
