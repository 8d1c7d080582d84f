// SPDX-License-Identifier: MIT

//! Restoration: rebuild the live transaction set from the journal on
//! daemon startup.
//!
//! Non-terminal transactions resume at their journaled state with a fresh
//! context (handlers re-derive what they need). Stale waits are resolved
//! against the restored world: a reboot releases reboot waiters, an
//! already-terminal target releases transaction waiters. When the host
//! mount table no longer covers the installed packs, a synthetic
//! ephemeral mount-all transaction is queued ahead of everything else.

use crate::catalog;
use crate::context::TxnCtx;
use crate::error::EngineError;
use crate::machine::Machine;
use crate::scheduler::{Entry, Scheduler};
use chef_adapters::{ImageMounter, PackStore, ProofVerifier, ServiceBackend};
use chef_core::{Clock, PackRef, StateTag, Transaction, TxnId, TxnKind, Wait};
use chef_storage::RebootCheck;
use std::collections::BTreeMap;
use tracing::{info, warn};

impl<P, V, M, B, C> Scheduler<P, V, M, B, C>
where
    P: PackStore,
    V: ProofVerifier,
    M: ImageMounter,
    B: ServiceBackend,
    C: Clock,
{
    /// Rebuild scheduler state from the journal's latest records. Called
    /// once, before [`Scheduler::run`].
    pub async fn restore(
        &mut self,
        records: BTreeMap<TxnId, Transaction>,
        reboot: RebootCheck,
    ) -> Result<(), EngineError> {
        let now = self.clock.epoch_ms();
        let grace_ms = self.cfg.grace.as_millis() as u64;

        if reboot == RebootCheck::Rebooted {
            // Whatever was holding images open did not survive the boot.
            self.clear_reboot_markers();
        }

        // Wait targets may appear later in the map than their waiters
        // (children get higher ids); resolve against the full record set.
        let record_states: BTreeMap<TxnId, StateTag> = records
            .iter()
            .map(|(id, txn)| (*id, txn.state))
            .collect();

        let mut live = 0usize;
        let mut retained = 0usize;
        for (id, txn) in records {
            if txn.is_terminal() {
                let keep = txn
                    .completed_at_ms
                    .map(|done| done + grace_ms > now)
                    .unwrap_or(false);
                if keep {
                    self.retain_terminal(id, txn);
                    retained += 1;
                }
                continue;
            }

            let machine = match Machine::resume(catalog::state_set(txn.kind), txn.state) {
                Ok(machine) => machine,
                Err(e) => {
                    warn!(txn = %id, error = %e, "journaled state unusable, failing transaction");
                    self.fail_unrestorable(id, txn, now)?;
                    continue;
                }
            };

            let mut entry = Entry {
                ctx: match txn.kind {
                    TxnKind::Ephemeral => TxnCtx::for_mount_all(),
                    _ => TxnCtx::new(),
                },
                persisted_state: Some(txn.state),
                holds_slot: false,
                queued: false,
                published_logs: txn.log.evicted() + txn.log.len() as u64,
                machine,
                txn,
            };

            let mut parked = false;
            match entry.txn.wait {
                Wait::OnReboot => {
                    if reboot == RebootCheck::Rebooted {
                        entry.txn.log_info(now, "reboot detected; resuming");
                        entry.machine.post(chef_core::Outcome::Ok);
                    } else {
                        parked = true;
                    }
                }
                Wait::OnTxn { id: target } => {
                    match record_states.get(&target).copied() {
                        Some(state) if state.is_terminal() => {
                            post_child_outcome(&mut entry, target, state, now);
                        }
                        Some(_) => parked = true,
                        None => {
                            entry.txn.log_error(
                                now,
                                format!("dependency transaction {target} disappeared"),
                            );
                            entry.machine.post(chef_core::Outcome::Failed);
                        }
                    }
                }
                Wait::None => {}
            }

            info!(txn = %entry.txn.id, state = %entry.txn.state, "restored transaction");
            let id = entry.txn.id;
            self.txns.insert(id, entry);
            if !parked {
                self.wake(id);
            }
            live += 1;
        }

        info!(live, retained, "restoration complete");
        self.mount_audit().await?;
        Ok(())
    }

    /// Keep a terminal record read-only for late status queries.
    fn retain_terminal(&mut self, id: TxnId, txn: Transaction) {
        let Ok(machine) = Machine::resume(catalog::state_set(txn.kind), txn.state) else {
            return;
        };
        let published_logs = txn.log.evicted() + txn.log.len() as u64;
        self.txns.insert(
            id,
            Entry {
                ctx: TxnCtx::new(),
                persisted_state: Some(txn.state),
                holds_slot: false,
                queued: false,
                published_logs,
                machine,
                txn,
            },
        );
    }

    /// A record whose state no longer fits its kind's state set (format
    /// skew): terminate it as an error rather than guessing.
    fn fail_unrestorable(
        &mut self,
        id: TxnId,
        mut txn: Transaction,
        now: u64,
    ) -> Result<(), EngineError> {
        txn.log_error(now, "could not restore journaled state");
        txn.enter_state(StateTag::Error);
        txn.finish(now);
        self.journal.append_sync(&txn)?;
        self.retain_terminal(id, txn);
        Ok(())
    }

    /// Compare the host mount table against the installed packs; when
    /// mounts are missing, queue the synthetic mount-all transaction ahead
    /// of all restored work.
    async fn mount_audit(&mut self) -> Result<(), EngineError> {
        let installed = self.layout.installed_packs()?;
        if installed.is_empty() {
            return Ok(());
        }

        let mounted = match self.deps.mounter.mounted().await {
            Ok(mounted) => mounted,
            Err(e) => {
                warn!(error = %e, "cannot read mount table; assuming mounts lost");
                Vec::new()
            }
        };
        let missing = installed
            .iter()
            .any(|(pack, _)| !mounted.contains(&self.layout.mountpoint(pack)));
        if !missing {
            return Ok(());
        }

        info!("mount table incomplete; scheduling mount-all pass");
        let id = self
            .submit_direct(TxnKind::Ephemeral, PackRef::new("chef", "mount-all"))
            .map_err(|e| EngineError::Restore(e.to_string()))?;

        // The mount pass runs before any restored transaction.
        if let Some(pos) = self.runnable.iter().position(|queued| *queued == id) {
            self.runnable.remove(pos);
            self.runnable.push_front(id);
        }
        Ok(())
    }

    /// Remove every per-package `needs-reboot` marker.
    fn clear_reboot_markers(&mut self) {
        let data_root = self.layout.root().join("var/chef/data");
        let Ok(publishers) = std::fs::read_dir(&data_root) else {
            return;
        };
        for publisher in publishers.flatten() {
            let Ok(packages) = std::fs::read_dir(publisher.path()) else {
                continue;
            };
            for package in packages.flatten() {
                let marker = package.path().join("needs-reboot");
                if marker.exists() {
                    info!(marker = %marker.display(), "clearing reboot marker");
                    let _ = std::fs::remove_file(&marker);
                }
            }
        }
    }
}

/// Post the event a waiter receives for its target's terminal state.
fn post_child_outcome(entry: &mut Entry, target: TxnId, state: StateTag, now: u64) {
    match state {
        StateTag::Completed => {
            entry
                .txn
                .log_info(now, format!("dependency transaction {target} completed"));
            entry.machine.post(chef_core::Outcome::Ok);
        }
        StateTag::Cancelled => {
            entry
                .txn
                .log_error(now, format!("dependency transaction {target} was cancelled"));
            entry.machine.post(chef_core::Outcome::Failed);
        }
        _ => {
            entry
                .txn
                .log_error(now, format!("dependency transaction {target} failed"));
            entry.machine.post(chef_core::Outcome::Failed);
        }
    }
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
