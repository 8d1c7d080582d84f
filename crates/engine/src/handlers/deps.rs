// SPDX-License-Identifier: MIT

//! Dependency resolution: spawns child install transactions for missing
//! dependencies and parks until they settle.
//!
//! The handler only decides; the scheduler owns child creation. Missing
//! dependencies are pushed onto `ctx.dep_requests`, which the scheduler
//! drains when the transaction parks (reusing a live transaction for the
//! same tuple when one exists). A completed child wakes this state with
//! `Ok`, a failed or cancelled one with `Failed` after the scheduler logs
//! the distinct reason.

use super::{ensure_resolved, ActionEnv};
use crate::context::TxnCtx;
use chef_adapters::{ImageMounter, PackStore, ProofVerifier, ServiceBackend};
use chef_core::{Clock, Outcome, Transaction};

pub(super) async fn dependencies<P, V, M, B, C>(
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
        txn.log_info(at, "cancelled during dependency resolution");
        return Outcome::Cancel;
    }

    if let Err(failed) = ensure_resolved(env, txn, ctx).await {
        return failed;
    }
    let Some(resolved) = ctx.resolved.clone() else {
        return Outcome::Failed;
    };

    if resolved.dependencies.is_empty() {
        return Outcome::Ok;
    }

    let mut missing = Vec::new();
    for dep in &resolved.dependencies {
        if dep.tuple() == txn.pack.tuple() {
            txn.log_error(at, format!("dependency cycle: {} depends on itself", txn.pack));
            return Outcome::Failed;
        }
        match env.layout.installed_revision(dep) {
            Ok(Some(_)) => {}
            Ok(None) => missing.push(dep.clone()),
            Err(e) => {
                txn.log_error(at, format!("cannot inspect pack store: {e}"));
                return Outcome::Failed;
            }
        }
    }

    if missing.is_empty() {
        txn.log_info(
            at,
            format!("all {} dependencies satisfied", resolved.dependencies.len()),
        );
        return Outcome::Ok;
    }

    txn.log_info(at, format!("waiting for {} dependencies", missing.len()));
    ctx.dep_requests = missing;
    Outcome::Wait
}
