// SPDX-License-Identifier: MIT

//! Command launcher wrappers: thin shell scripts pointing into the
//! mounted image.

use super::{atomic_write, ensure_manifest, ActionEnv};
use crate::context::TxnCtx;
use chef_adapters::{ImageMounter, PackStore, ProofVerifier, ServiceBackend};
use chef_core::{Clock, Outcome, Transaction};

/// Create a wrapper per exported command. Overwrites atomically, so
/// re-entry and revision changes are both plain rewrites.
pub(super) async fn generate_wrappers<P, V, M, B, C>(
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
        txn.log_info(at, "cancelled before wrapper generation");
        return Outcome::Cancel;
    }

    let Some(manifest) = ensure_manifest(env, txn, ctx) else {
        txn.log_error(at, "no manifest available for wrapper generation");
        return Outcome::Failed;
    };

    let mountpoint = env.layout.mountpoint(&txn.pack);
    for command in &manifest.commands {
        let wrapper = env.layout.wrapper_file(&command.name);
        let target = mountpoint.join(&command.path);
        let contents = format!("#!/bin/sh\nexec \"{}\" \"$@\"\n", target.display());
        if let Err(e) = atomic_write(&wrapper, contents.as_bytes(), true) {
            txn.log_error(at, format!("cannot write wrapper {}: {e}", command.name));
            return Outcome::Failed;
        }
    }

    txn.log_info(at, format!("generated {} command wrappers", manifest.commands.len()));
    Outcome::Ok
}

/// Remove the pack's command wrappers. Missing wrappers are fine.
pub(super) async fn remove_wrappers<P, V, M, B, C>(
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
        txn.log_info(at, "cancelled before wrapper removal");
        return Outcome::Cancel;
    }

    let Some(manifest) = ensure_manifest(env, txn, ctx) else {
        txn.log_warning(at, "no manifest available; no wrappers to remove");
        return Outcome::Ok;
    };

    let mut removed = 0;
    for command in &manifest.commands {
        let wrapper = env.layout.wrapper_file(&command.name);
        match std::fs::remove_file(&wrapper) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                txn.log_error(at, format!("cannot remove wrapper {}: {e}", command.name));
                return Outcome::Failed;
            }
        }
    }

    txn.log_info(at, format!("removed {removed} command wrappers"));
    Outcome::Ok
}
