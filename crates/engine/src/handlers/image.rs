// SPDX-License-Identifier: MIT

//! Image lifecycle: mount (including the restoration mount-all pass),
//! load, unload, unmount.

use super::ActionEnv;
use crate::context::TxnCtx;
use chef_adapters::{ImageMounter, MountError, PackStore, ProofVerifier, ServiceBackend};
use chef_core::{Clock, Outcome, PackManifest, Transaction};

pub(super) async fn mount<P, V, M, B, C>(
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
    if ctx.mount_all {
        return mount_all(env, txn).await;
    }

    let at = env.clock.epoch_ms();
    if super::cancel_pending(ctx) {
        txn.log_info(at, "cancelled before mount");
        return Outcome::Cancel;
    }

    // The pack file written by install/update is the source of truth for
    // the revision to mount; the context may be empty after a restart.
    let revision = match env.layout.installed_revision(&txn.pack) {
        Ok(Some(revision)) => revision,
        Ok(None) => {
            txn.log_error(at, format!("{} has no pack file to mount", txn.pack));
            return Outcome::Failed;
        }
        Err(e) => {
            txn.log_error(at, format!("cannot inspect pack store: {e}"));
            return Outcome::Failed;
        }
    };
    let pinned = txn.pack.clone().with_revision(revision);
    let Some(pack_file) = env.layout.pack_file(&pinned) else {
        return Outcome::Failed;
    };
    let mountpoint = env.layout.mountpoint(&txn.pack);

    match env.deps.mounter.mount(&pack_file, &mountpoint).await {
        Ok(()) => {
            txn.log_info(at, format!("mounted {} at {}", pinned, mountpoint.display()));
            Outcome::Ok
        }
        Err(e) => {
            txn.log_error(at, format!("mount failed: {e}"));
            Outcome::Failed
        }
    }
}

/// Restoration's distinguished variant: bring every installed pack's mount
/// (and its application-index entry) back online.
async fn mount_all<P, V, M, B, C>(
    env: &mut ActionEnv<'_, P, V, M, B, C>,
    txn: &mut Transaction,
) -> Outcome
where
    P: PackStore,
    V: ProofVerifier,
    M: ImageMounter,
    B: ServiceBackend,
    C: Clock,
{
    let at = env.clock.epoch_ms();
    let installed = match env.layout.installed_packs() {
        Ok(installed) => installed,
        Err(e) => {
            txn.log_error(at, format!("cannot inspect pack store: {e}"));
            return Outcome::Failed;
        }
    };

    txn.progress.set_total(installed.len() as u64);
    for (i, (pack, pack_file)) in installed.iter().enumerate() {
        let mountpoint = env.layout.mountpoint(pack);
        if let Err(e) = env.deps.mounter.mount(pack_file, &mountpoint).await {
            txn.log_error(at, format!("cannot remount {pack}: {e}"));
            return Outcome::Failed;
        }
        match PackManifest::load(&mountpoint) {
            Ok(manifest) => env.index.insert(manifest),
            Err(e) => txn.log_warning(at, format!("no manifest for {pack}: {e}")),
        }
        txn.progress.set_current((i + 1) as u64);
        txn.log_info(at, format!("remounted {pack}"));
    }

    txn.log_info(at, format!("mount table restored ({} packs)", installed.len()));
    Outcome::Ok
}

pub(super) async fn load<P, V, M, B, C>(
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
        txn.log_info(at, "cancelled before load");
        return Outcome::Cancel;
    }

    let mountpoint = env.layout.mountpoint(&txn.pack);
    match PackManifest::load(&mountpoint) {
        Ok(manifest) => {
            txn.log_info(
                at,
                format!(
                    "loaded manifest ({} commands, {} services)",
                    manifest.commands.len(),
                    manifest.services.len()
                ),
            );
            ctx.manifest = Some(manifest.clone());
            env.index.insert(manifest);
            Outcome::Ok
        }
        Err(e) => {
            txn.log_error(at, format!("cannot load manifest: {e}"));
            Outcome::Failed
        }
    }
}

/// Drop the pack from the application index. Idempotent.
pub(super) async fn unload<P, V, M, B, C>(
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
    // Irreversible teardown: cancellation is recorded, not honored.

    if let Some(manifest) = env.index.remove(&txn.pack) {
        // Keep the manifest for the remaining teardown states.
        ctx.manifest.get_or_insert(manifest);
        txn.log_info(at, "unloaded from application index");
    } else {
        txn.log_info(at, "not in application index");
    }
    Outcome::Ok
}

pub(super) async fn unmount<P, V, M, B, C>(
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
    // Irreversible teardown: cancellation is recorded, not honored.

    let mountpoint = env.layout.mountpoint(&txn.pack);
    match env.deps.mounter.unmount(&mountpoint).await {
        Ok(()) => {
            txn.log_info(at, format!("unmounted {}", mountpoint.display()));
            Outcome::Ok
        }
        Err(MountError::NotMounted(_)) => {
            txn.log_info(at, "already unmounted");
            Outcome::Ok
        }
        Err(MountError::Busy(_)) => {
            let marker = env.layout.reboot_marker(&txn.pack);
            if let Some(parent) = marker.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = std::fs::write(&marker, b"image busy at unmount\n");
            txn.log_error(at, "image is busy; pack needs a reboot before it can be touched again");
            Outcome::Failed
        }
        Err(e) => {
            txn.log_error(at, format!("unmount failed: {e}"));
            Outcome::Failed
        }
    }
}
