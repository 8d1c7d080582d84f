// SPDX-License-Identifier: MIT

//! Download and its retry sibling.

use super::{ensure_resolved, sha256_file, ActionEnv};
use crate::context::TxnCtx;
use chef_adapters::{FetchStatus, FetchTicket, ImageMounter, PackStore, ProofVerifier, ServiceBackend};
use chef_core::{Clock, Outcome, Transaction};

pub(super) async fn download<P, V, M, B, C>(
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
    let Some(staged) = env.layout.staging_file(&resolved.pack) else {
        txn.log_error(at, "resolved pack has no revision");
        return Outcome::Failed;
    };

    if super::cancel_pending(ctx) {
        // Leave nothing half-downloaded behind.
        let _ = std::fs::remove_file(&staged);
        txn.log_info(at, "cancelled during download");
        return Outcome::Cancel;
    }

    txn.progress.set_total(resolved.size_bytes);

    // Already staged and digest-complete (re-entry after a crash).
    if staged.exists() {
        if let Ok(digest) = sha256_file(&staged) {
            if digest == resolved.digest {
                txn.progress.set_current(resolved.size_bytes);
                txn.log_info(at, "staged pack already present");
                return Outcome::Ok;
            }
        }
        let _ = std::fs::remove_file(&staged);
    }

    txn.attempts += 1;
    if txn.attempts > 1 {
        txn.retries += 1;
    }

    let ticket = FetchTicket {
        txn: txn.id,
        tx: env.fetch_tx.clone(),
    };
    match env.deps.store.fetch(&resolved, &staged, ticket).await {
        Ok(FetchStatus::Complete) => match sha256_file(&staged) {
            Ok(digest) if digest == resolved.digest => {
                txn.progress.set_current(resolved.size_bytes);
                txn.log_info(at, format!("fetched {} ({} bytes)", resolved.pack, resolved.size_bytes));
                Outcome::Ok
            }
            Ok(_) => {
                let _ = std::fs::remove_file(&staged);
                txn.log_warning(at, "downloaded pack failed its digest check");
                Outcome::Retry
            }
            Err(e) => {
                txn.log_warning(at, format!("cannot read staged pack: {e}"));
                Outcome::Retry
            }
        },
        Ok(FetchStatus::InProgress) => {
            txn.log_info(at, "download in progress");
            Outcome::Wait
        }
        Ok(FetchStatus::Transient(reason)) => {
            txn.log_warning(at, format!("transient download failure: {reason}"));
            Outcome::Retry
        }
        Ok(FetchStatus::Denied(reason)) => {
            txn.log_error(at, format!("download denied: {reason}"));
            Outcome::Failed
        }
        Err(e) => {
            txn.log_warning(at, format!("store error: {e}"));
            Outcome::Retry
        }
    }
}

/// Bounded exponential backoff between download attempts; converts to a
/// permanent failure once the cap is exhausted.
pub(super) async fn download_retry<P, V, M, B, C>(
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
    if super::cancel_pending(ctx) {
        // Leave nothing half-downloaded behind.
        if let Some(resolved) = &ctx.resolved {
            if let Some(staged) = env.layout.staging_file(&resolved.pack) {
                let _ = std::fs::remove_file(staged);
            }
        }
        txn.log_info(at, "cancelled while retrying download");
        return Outcome::Cancel;
    }

    if txn.attempts >= env.cfg.retry_cap {
        txn.log_error(
            at,
            format!("giving up after {} download attempts", txn.attempts),
        );
        return Outcome::Failed;
    }

    let exponent = txn.attempts.saturating_sub(1).min(6);
    let backoff = env
        .cfg
        .backoff_min
        .saturating_mul(1 << exponent)
        .min(env.cfg.backoff_max);
    txn.log_info(
        at,
        format!(
            "retrying download in {}s (attempt {} of {})",
            backoff.as_secs(),
            txn.attempts + 1,
            env.cfg.retry_cap
        ),
    );
    ctx.backoff = Some(backoff);
    Outcome::Wait
}
