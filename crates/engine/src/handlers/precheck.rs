// SPDX-License-Identifier: MIT

//! Precheck: identity, revision, and platform validation. Pure read.

use super::ActionEnv;
use crate::context::TxnCtx;
use chef_adapters::{ImageMounter, PackStore, ProofVerifier, ServiceBackend};
use chef_core::{Clock, Outcome, Transaction, TxnKind, Wait};

pub(super) async fn precheck<P, V, M, B, C>(
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
        txn.log_info(at, "cancelled before precheck");
        return Outcome::Cancel;
    }

    txn.log_info(at, format!("prechecking {}", txn.pack));

    // A pack whose image could not be released stays untouchable until the
    // host reboots; restoration clears the marker once that happens.
    if env.layout.reboot_marker(&txn.pack).exists() {
        txn.log_warning(at, "pack is pending a reboot; waiting");
        ctx.pending_wait = Wait::OnReboot;
        return Outcome::Wait;
    }

    let resolved = match env.deps.store.resolve(&txn.pack).await {
        Ok(resolved) => resolved,
        Err(e) => {
            txn.log_error(at, format!("cannot resolve {}: {e}", txn.pack));
            return Outcome::Failed;
        }
    };

    if resolved.pack.revision.is_none() {
        txn.log_error(at, "index resolved no revision");
        return Outcome::Failed;
    }
    if resolved.platform != env.cfg.host_platform {
        txn.log_error(
            at,
            format!(
                "platform mismatch: pack targets {}, host is {}",
                resolved.platform, env.cfg.host_platform
            ),
        );
        return Outcome::Failed;
    }

    let installed = match env.layout.installed_revision(&txn.pack) {
        Ok(installed) => installed,
        Err(e) => {
            txn.log_error(at, format!("cannot inspect pack store: {e}"));
            return Outcome::Failed;
        }
    };

    match txn.kind {
        TxnKind::Install => {
            if installed.is_some() && installed == resolved.pack.revision {
                txn.log_error(
                    at,
                    format!("{} is already installed", resolved.pack),
                );
                return Outcome::Failed;
            }
        }
        TxnKind::Update | TxnKind::Rollback => match installed {
            None => {
                txn.log_error(at, format!("{} is not installed", txn.pack));
                return Outcome::Failed;
            }
            Some(previous) => {
                if Some(previous) == resolved.pack.revision {
                    txn.log_error(
                        at,
                        format!("{} is already at revision {previous}", txn.pack),
                    );
                    return Outcome::Failed;
                }
                ctx.previous_revision = Some(previous);
            }
        },
        _ => {}
    }

    txn.log_info(at, format!("resolved {}", resolved.pack));
    ctx.resolved = Some(resolved);
    Outcome::Ok
}

/// Re-check after a wake-up: the reboot wait clears once the marker is
/// gone (restoration removes it when a reboot is detected).
pub(super) async fn precheck_wait<P, V, M, B, C>(
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
        txn.log_info(at, "cancelled while waiting for reboot");
        return Outcome::Cancel;
    }
    if env.layout.reboot_marker(&txn.pack).exists() {
        ctx.pending_wait = Wait::OnReboot;
        return Outcome::Wait;
    }
    txn.log_info(at, "reboot observed; resuming precheck");
    Outcome::Ok
}
