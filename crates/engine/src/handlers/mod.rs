// SPDX-License-Identifier: MIT

//! Action handlers: one per state tag, dispatched by the scheduler's drive
//! loop.
//!
//! Handler contract: read inputs from the context, log on entry and on
//! failure, keep the progress counters current for byte work, and return
//! exactly one event. Handlers never propagate errors upward. Every
//! handler tolerates re-entry after a crash by re-deriving missing context
//! (idempotence or detect-and-resume).

mod deps;
mod fetch;
mod image;
mod install;
mod precheck;
mod services;
mod verify;
mod wrappers;

use crate::context::TxnCtx;
use crate::index::AppIndex;
use crate::scheduler::{EngineConfig, SchedulerDeps};
use chef_adapters::{FetchDone, ImageMounter, PackStore, ProofVerifier, ServiceBackend};
use chef_core::{Clock, Layout, Outcome, StateTag, Transaction};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Everything a handler may touch besides the transaction and its context.
pub(crate) struct ActionEnv<'a, P, V, M, B, C> {
    pub deps: &'a SchedulerDeps<P, V, M, B>,
    pub layout: &'a Layout,
    pub cfg: &'a EngineConfig,
    pub clock: &'a C,
    pub index: &'a mut AppIndex,
    pub fetch_tx: &'a mpsc::Sender<FetchDone>,
}

/// Run the action for the transaction's current state.
pub(crate) async fn run_action<P, V, M, B, C>(
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
    match txn.state {
        StateTag::Precheck => precheck::precheck(env, txn, ctx).await,
        StateTag::PrecheckWait => precheck::precheck_wait(env, txn, ctx).await,
        StateTag::Download => fetch::download(env, txn, ctx).await,
        StateTag::DownloadRetry => fetch::download_retry(env, txn, ctx).await,
        StateTag::Verify => verify::verify(env, txn, ctx).await,
        StateTag::Dependencies | StateTag::DependenciesWait => {
            deps::dependencies(env, txn, ctx).await
        }
        StateTag::Install => install::install(env, txn, ctx).await,
        StateTag::Mount => image::mount(env, txn, ctx).await,
        StateTag::Load => image::load(env, txn, ctx).await,
        StateTag::StartServices => services::start_services(env, txn, ctx).await,
        StateTag::GenerateWrappers => wrappers::generate_wrappers(env, txn, ctx).await,
        StateTag::RemoveWrappers => wrappers::remove_wrappers(env, txn, ctx).await,
        StateTag::StopServices => services::stop_services(env, txn, ctx).await,
        StateTag::Unload => image::unload(env, txn, ctx).await,
        StateTag::Unmount => image::unmount(env, txn, ctx).await,
        StateTag::Uninstall => install::uninstall(env, txn, ctx).await,
        StateTag::Update => install::update_swap(env, txn, ctx).await,
        // Terminal actions are nil; the drive loop never calls them.
        StateTag::Completed | StateTag::Error | StateTag::Cancelled => Outcome::Ok,
    }
}

/// Whether a handler should honor a pending cancellation. A cancel that
/// was downgraded during irreversible teardown stays downgraded for the
/// rest of the transaction.
pub(crate) fn cancel_pending(ctx: &TxnCtx) -> bool {
    ctx.cancel_requested && !ctx.cancel_downgraded
}

/// Hex SHA-256 of a file's contents.
pub(crate) fn sha256_file(path: &Path) -> std::io::Result<String> {
    let data = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&data)))
}

/// Re-resolve the pack when the context was lost to a restart. Returns the
/// failure event to emit when the index cannot resolve it.
pub(crate) async fn ensure_resolved<P, V, M, B, C>(
    env: &ActionEnv<'_, P, V, M, B, C>,
    txn: &mut Transaction,
    ctx: &mut TxnCtx,
) -> Result<(), Outcome>
where
    P: PackStore,
    V: ProofVerifier,
    M: ImageMounter,
    B: ServiceBackend,
    C: Clock,
{
    if ctx.resolved.is_some() {
        return Ok(());
    }
    match env.deps.store.resolve(&txn.pack).await {
        Ok(resolved) => {
            ctx.resolved = Some(resolved);
            Ok(())
        }
        Err(e) => {
            let at = env.clock.epoch_ms();
            txn.log_error(at, format!("cannot resolve {}: {e}", txn.pack));
            Err(Outcome::Failed)
        }
    }
}

/// The manifest for the pack, re-read from the mounted image when the
/// context was lost to a restart, falling back to the application index.
pub(crate) fn ensure_manifest<P, V, M, B, C>(
    env: &ActionEnv<'_, P, V, M, B, C>,
    txn: &Transaction,
    ctx: &mut TxnCtx,
) -> Option<chef_core::PackManifest> {
    if let Some(manifest) = &ctx.manifest {
        return Some(manifest.clone());
    }
    let mountpoint = env.layout.mountpoint(&txn.pack);
    if let Ok(manifest) = chef_core::PackManifest::load(&mountpoint) {
        ctx.manifest = Some(manifest.clone());
        return Some(manifest);
    }
    env.index.get(&txn.pack).cloned()
}

/// Atomically write a file: tmp sibling, then rename over the target.
pub(crate) fn atomic_write(path: &Path, contents: &[u8], executable: bool) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(path);
    std::fs::write(&tmp, contents)?;
    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    let _ = executable;
    std::fs::rename(&tmp, path)
}

/// `<path>.tmp` without clobbering the original extension.
pub(crate) fn tmp_sibling(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}
