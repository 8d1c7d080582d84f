// SPDX-License-Identifier: MIT

//! Verify: the trust boundary. No state after this one runs unless the
//! signature chain checked out, and nothing here is retried.

use super::{ensure_resolved, ActionEnv};
use crate::context::TxnCtx;
use chef_adapters::{ImageMounter, PackStore, ProofVerifier, ServiceBackend};
use chef_core::{Clock, Outcome, Transaction};

pub(super) async fn verify<P, V, M, B, C>(
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
        txn.log_info(at, "cancelled before verification");
        return Outcome::Cancel;
    }

    if let Err(failed) = ensure_resolved(env, txn, ctx).await {
        return failed;
    }
    let Some(resolved) = ctx.resolved.clone() else {
        return Outcome::Failed;
    };
    let Some(staged) = env.layout.staging_file(&resolved.pack) else {
        return Outcome::Failed;
    };
    if !staged.exists() {
        txn.log_error(at, "staged artifact is missing");
        return Outcome::Failed;
    }

    let proof = match env.deps.store.ensure_proof(&resolved.pack).await {
        Ok(proof) => proof,
        Err(e) => {
            txn.log_error(at, format!("proof unavailable: {e}"));
            return Outcome::Failed;
        }
    };

    match env.deps.verifier.verify(&staged, &proof).await {
        Ok(true) => {
            txn.log_info(at, "signature chain valid");
            ctx.proof = Some(proof);
            Outcome::Ok
        }
        Ok(false) => {
            // Rejected artifacts must not linger anywhere installable.
            let _ = std::fs::remove_file(&staged);
            txn.log_error(at, format!("signature verification failed for {}", resolved.pack));
            Outcome::Failed
        }
        Err(e) => {
            txn.log_error(at, format!("verifier unavailable: {e}"));
            Outcome::Failed
        }
    }
}
