// SPDX-License-Identifier: MIT

//! Service start/stop via the container backend.

use super::{ensure_manifest, ActionEnv};
use crate::context::TxnCtx;
use chef_adapters::{ImageMounter, PackStore, ProofVerifier, ServiceBackend, ServiceError};
use chef_core::{Clock, Outcome, Transaction};

/// Start every service the pack declares.
///
/// Partial success is rolled back: services already started in this
/// invocation are stopped before the failure is reported, so the backend
/// never keeps half a pack's services running.
pub(super) async fn start_services<P, V, M, B, C>(
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
        txn.log_info(at, "cancelled before starting services");
        return Outcome::Cancel;
    }

    let Some(manifest) = ensure_manifest(env, txn, ctx) else {
        txn.log_error(at, "no manifest available for service start");
        return Outcome::Failed;
    };
    if manifest.services.is_empty() {
        return Outcome::Ok;
    }

    let mut started: Vec<String> = Vec::new();
    for service in &manifest.services {
        match env.deps.services.start(&txn.pack, service).await {
            Ok(()) => started.push(service.name.clone()),
            Err(e) => {
                txn.log_error(at, format!("failed to start {}: {e}", service.name));
                for name in started.iter().rev() {
                    match env.deps.services.stop(&txn.pack, name).await {
                        Ok(()) => {
                            txn.log_warning(at, format!("stopped {name} (rolling back partial start)"))
                        }
                        Err(e) => txn.log_warning(at, format!("rollback stop of {name} failed: {e}")),
                    }
                }
                return Outcome::Failed;
            }
        }
    }

    txn.log_info(at, format!("started {} services", started.len()));
    Outcome::Ok
}

/// Stop every service the pack declares. Already-stopped services are not
/// an error; a genuine stop failure leaves the system degraded and is
/// recorded as such.
pub(super) async fn stop_services<P, V, M, B, C>(
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

    let Some(manifest) = ensure_manifest(env, txn, ctx) else {
        txn.log_warning(at, "no manifest available; no services to stop");
        return Outcome::Ok;
    };

    let mut stopped = 0;
    for service in &manifest.services {
        match env.deps.services.stop(&txn.pack, &service.name).await {
            Ok(()) => stopped += 1,
            Err(ServiceError::NotRunning(_)) => {}
            Err(e) => {
                txn.log_error(
                    at,
                    format!("failed to stop {}: {e}; system left degraded", service.name),
                );
                return Outcome::Failed;
            }
        }
    }

    txn.log_info(at, format!("stopped {stopped} services"));
    Outcome::Ok
}
