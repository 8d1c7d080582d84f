// SPDX-License-Identifier: MIT

//! Transaction scheduler: owns the live transaction set and drives each
//! machine forward cooperatively on a single task.
//!
//! All transaction mutation happens here. Handlers delegate long I/O to
//! collaborators and return `Wait`; external completions (fetch notices,
//! child transactions, timers) re-enter through the scheduler's queues
//! and are applied as posted events. Cancellation is a cooperative flag
//! the woken action observes on entry. Journal records for a state commit
//! strictly before that state's action runs.

use crate::catalog;
use crate::context::TxnCtx;
use crate::error::{EngineError, SubmitError};
use crate::handlers::{self, ActionEnv};
use crate::index::AppIndex;
use crate::machine::{Machine, Step};
use crate::timers::Timers;
use chef_adapters::{FetchDone, ImageMounter, PackStore, ProofVerifier, ServiceBackend};
use chef_core::{
    Clock, Event, Layout, Outcome, PackRef, StateTag, Transaction, TxnId, TxnKind, TxnSummary, Wait,
};
use chef_storage::{Journal, TxnIdAllocator};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Platform string prechecks match packs against.
    pub host_platform: String,
    /// Maximum download attempts before a transaction fails.
    pub retry_cap: u32,
    /// Backoff bounds for download retries.
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    /// How long a transaction may wait on its dependencies.
    pub dep_timeout: Duration,
    /// Concurrent transactions allowed in the download/install phases.
    pub phase_limit: usize,
    /// How long terminal transactions are retained for late subscribers.
    pub grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host_platform: host_platform(),
            retry_cap: 5,
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            dep_timeout: Duration::from_secs(600),
            phase_limit: 4,
            grace: Duration::from_secs(300),
        }
    }
}

/// The platform string of the running host, in index notation.
pub fn host_platform() -> String {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };
    format!("{}/{}", std::env::consts::OS, arch)
}

/// Collaborators injected at startup.
pub struct SchedulerDeps<P, V, M, B> {
    pub store: P,
    pub verifier: V,
    pub mounter: M,
    pub services: B,
}

/// Reply to a cancellation request. `Ok` means the cancel was accepted,
/// not that the transaction has reached `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReply {
    Ok,
    NotFound,
    AlreadyTerminal,
}

/// Requests from the RPC surface into the scheduler.
pub enum Cmd {
    Submit {
        kind: TxnKind,
        pack: PackRef,
        reply: oneshot::Sender<Result<TxnId, SubmitError>>,
    },
    Cancel {
        id: TxnId,
        reply: oneshot::Sender<CancelReply>,
    },
    Status {
        id: TxnId,
        reply: oneshot::Sender<Option<TxnSummary>>,
    },
    List {
        reply: oneshot::Sender<Vec<TxnSummary>>,
    },
    Shutdown,
}

/// Cloneable handle used by the RPC surface.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Cmd>,
}

impl SchedulerHandle {
    pub async fn submit(&self, kind: TxnKind, pack: PackRef) -> Result<TxnId, SubmitError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Cmd::Submit { kind, pack, reply })
            .await
            .map_err(|_| SubmitError::Unavailable)?;
        rx.await.map_err(|_| SubmitError::Unavailable)?
    }

    pub async fn cancel(&self, id: TxnId) -> Result<CancelReply, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Cmd::Cancel { id, reply })
            .await
            .map_err(|_| EngineError::SchedulerGone)?;
        rx.await.map_err(|_| EngineError::SchedulerGone)
    }

    pub async fn status(&self, id: TxnId) -> Result<Option<TxnSummary>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Cmd::Status { id, reply })
            .await
            .map_err(|_| EngineError::SchedulerGone)?;
        rx.await.map_err(|_| EngineError::SchedulerGone)
    }

    pub async fn list(&self) -> Result<Vec<TxnSummary>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Cmd::List { reply })
            .await
            .map_err(|_| EngineError::SchedulerGone)?;
        rx.await.map_err(|_| EngineError::SchedulerGone)
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(Cmd::Shutdown).await;
    }
}

/// One live (or grace-retained terminal) transaction.
pub(crate) struct Entry {
    pub(crate) txn: Transaction,
    pub(crate) machine: Machine,
    pub(crate) ctx: TxnCtx,
    /// State whose journal record is already durable.
    pub(crate) persisted_state: Option<StateTag>,
    /// Holds one of the download/install concurrency slots.
    pub(crate) holds_slot: bool,
    /// Already sitting in the runnable queue.
    pub(crate) queued: bool,
    /// Log entries already published to subscribers.
    pub(crate) published_logs: u64,
}

/// Side effects gathered while an entry is mutably borrowed, applied
/// afterwards.
struct StepEffects {
    prev_state: StateTag,
    new_state: StateTag,
    step: Step,
    dep_requests: Vec<PackRef>,
    backoff: Option<Duration>,
    pending_wait: Wait,
}

/// The transaction scheduler. Single-owner: all state lives on the task
/// running [`Scheduler::run`].
pub struct Scheduler<P, V, M, B, C> {
    pub(crate) deps: SchedulerDeps<P, V, M, B>,
    pub(crate) layout: Layout,
    pub(crate) cfg: EngineConfig,
    pub(crate) clock: C,
    pub(crate) journal: Journal,
    pub(crate) allocator: TxnIdAllocator,
    pub(crate) txns: BTreeMap<TxnId, Entry>,
    pub(crate) runnable: VecDeque<TxnId>,
    pub(crate) phase_queue: VecDeque<TxnId>,
    pub(crate) phase_active: usize,
    pub(crate) timers: Timers,
    pub(crate) index: AppIndex,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) fetch_tx: mpsc::Sender<FetchDone>,
    fetch_rx: mpsc::Receiver<FetchDone>,
    cmd_rx: mpsc::Receiver<Cmd>,
}

impl<P, V, M, B, C> Scheduler<P, V, M, B, C>
where
    P: PackStore,
    V: ProofVerifier,
    M: ImageMounter,
    B: ServiceBackend,
    C: Clock,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deps: SchedulerDeps<P, V, M, B>,
        layout: Layout,
        cfg: EngineConfig,
        clock: C,
        journal: Journal,
        allocator: TxnIdAllocator,
        event_tx: broadcast::Sender<Event>,
    ) -> (Self, SchedulerHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (fetch_tx, fetch_rx) = mpsc::channel(64);
        (
            Self {
                deps,
                layout,
                cfg,
                clock,
                journal,
                allocator,
                txns: BTreeMap::new(),
                runnable: VecDeque::new(),
                phase_queue: VecDeque::new(),
                phase_active: 0,
                timers: Timers::new(),
                index: AppIndex::new(),
                event_tx,
                fetch_tx,
                fetch_rx,
                cmd_rx,
            },
            SchedulerHandle { tx: cmd_tx },
        )
    }

    /// Production loop: drain runnable transactions, then sleep on the
    /// command queue, fetch completions, and the timer tick.
    pub async fn run(mut self) -> Result<(), EngineError> {
        let mut tick = tokio::time::interval(Duration::from_millis(250));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            while let Some(id) = self.pop_runnable() {
                self.drive(id).await?;
            }

            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        None | Some(Cmd::Shutdown) => break,
                        Some(cmd) => self.handle_cmd(cmd).await,
                    }
                }
                Some(done) = self.fetch_rx.recv() => {
                    self.on_fetch_done(done);
                }
                _ = tick.tick() => {
                    self.fire_timers();
                    self.purge_expired()?;
                    if self.journal.needs_flush() {
                        self.journal.flush()?;
                    }
                }
            }
        }

        self.journal.flush()?;
        info!("scheduler stopped");
        Ok(())
    }

    async fn handle_cmd(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::Submit { kind, pack, reply } => {
                let _ = reply.send(self.submit_direct(kind, pack));
            }
            Cmd::Cancel { id, reply } => {
                let _ = reply.send(self.cancel_direct(id));
            }
            Cmd::Status { id, reply } => {
                let _ = reply.send(self.status_direct(id));
            }
            Cmd::List { reply } => {
                let _ = reply.send(self.list_direct());
            }
            Cmd::Shutdown => {}
        }
    }

    /// Validate and create a transaction. Invalid requests are rejected
    /// here, before anything is persisted.
    pub fn submit_direct(&mut self, kind: TxnKind, pack: PackRef) -> Result<TxnId, SubmitError> {
        if kind == TxnKind::Rollback && pack.revision.is_none() {
            return Err(SubmitError::RevisionRequired(kind));
        }

        // At most one live non-ephemeral transaction per (publisher,
        // package) tuple.
        if !kind.is_ephemeral() {
            let conflict = self.txns.values().any(|entry| {
                !entry.txn.is_terminal()
                    && !entry.txn.kind.is_ephemeral()
                    && entry.txn.pack.tuple() == pack.tuple()
            });
            if conflict {
                return Err(SubmitError::Conflict(
                    pack.publisher.clone(),
                    pack.package.clone(),
                ));
            }
        }

        let id = self
            .allocator
            .next()
            .map_err(|e| SubmitError::Persist(e.to_string()))?;
        let machine = Machine::new(catalog::state_set(kind))
            .map_err(|e| SubmitError::Persist(e.to_string()))?;
        let txn = Transaction::new(id, kind, pack, machine.current(), self.clock.epoch_ms());
        self.journal
            .append_sync(&txn)
            .map_err(|e| SubmitError::Persist(e.to_string()))?;

        info!(txn = %id, kind = %kind, pack = %txn.pack, "transaction submitted");
        let _ = self.event_tx.send(Event::StateChanged {
            id,
            state: txn.state,
        });

        let initial = txn.state;
        self.txns.insert(
            id,
            Entry {
                txn,
                machine,
                ctx: if kind.is_ephemeral() {
                    TxnCtx::for_mount_all()
                } else {
                    TxnCtx::new()
                },
                persisted_state: Some(initial),
                holds_slot: false,
                queued: false,
                published_logs: 0,
            },
        );
        self.wake(id);
        Ok(id)
    }

    /// Request cancellation. Cooperative: the flag is set and the
    /// transaction is woken, so its current state's action observes the
    /// flag on entry, performs its own cleanup, and returns `Cancel`.
    /// Inside the irreversible teardown the request is downgraded: the
    /// flag is recorded and the transaction runs forward to completed or
    /// error.
    pub fn cancel_direct(&mut self, id: TxnId) -> CancelReply {
        let at = self.clock.epoch_ms();
        let Some(entry) = self.txns.get_mut(&id) else {
            return CancelReply::NotFound;
        };
        if entry.txn.is_terminal() {
            return CancelReply::AlreadyTerminal;
        }

        entry.ctx.cancel_requested = true;
        let state = entry.machine.current();
        if state.is_irreversible() {
            entry.ctx.cancel_downgraded = true;
            entry
                .txn
                .log_warning(at, "cancellation downgraded during irreversible teardown");
        }

        debug!(txn = %id, state = %state, "cancellation requested");
        self.wake(id);
        CancelReply::Ok
    }

    pub fn status_direct(&self, id: TxnId) -> Option<TxnSummary> {
        self.txns.get(&id).map(|entry| entry.txn.summary())
    }

    pub fn list_direct(&self) -> Vec<TxnSummary> {
        self.txns.values().map(|entry| entry.txn.summary()).collect()
    }

    /// Mark a transaction runnable (idempotent).
    pub(crate) fn wake(&mut self, id: TxnId) {
        if let Some(entry) = self.txns.get_mut(&id) {
            if !entry.queued && !entry.txn.is_terminal() {
                entry.queued = true;
                self.runnable.push_back(id);
            }
        }
    }

    pub(crate) fn pop_runnable(&mut self) -> Option<TxnId> {
        let id = self.runnable.pop_front()?;
        if let Some(entry) = self.txns.get_mut(&id) {
            entry.queued = false;
        }
        Some(id)
    }

    /// Drain everything currently runnable. Test entry point; `run` does
    /// the same before each sleep.
    pub async fn drain(&mut self) -> Result<(), EngineError> {
        while let Some(id) = self.pop_runnable() {
            self.drive(id).await?;
        }
        Ok(())
    }

    /// Drive one transaction until it parks, waits, or terminates.
    pub(crate) async fn drive(&mut self, id: TxnId) -> Result<(), EngineError> {
        loop {
            let effects = {
                let Some(entry) = self.txns.get_mut(&id) else {
                    return Ok(());
                };
                if entry.txn.is_terminal() {
                    return Ok(());
                }

                let state = entry.machine.current();

                // Journal the state entry before its action may run.
                if entry.persisted_state != Some(state) {
                    self.journal.append_sync(&entry.txn)?;
                    entry.persisted_state = Some(state);
                }

                let outcome = match entry.machine.take_posted() {
                    Some(posted) => posted,
                    None => {
                        // Download/install phases are capacity-bounded. A
                        // pending cancel skips the gate: the action runs
                        // only to observe the flag and bail out.
                        if matches!(state, StateTag::Download | StateTag::Install)
                            && !entry.holds_slot
                            && !handlers::cancel_pending(&entry.ctx)
                        {
                            if self.phase_active >= self.cfg.phase_limit {
                                self.phase_queue.push_back(id);
                                return Ok(());
                            }
                            entry.holds_slot = true;
                            self.phase_active += 1;
                        }

                        let mut env = ActionEnv {
                            deps: &self.deps,
                            layout: &self.layout,
                            cfg: &self.cfg,
                            clock: &self.clock,
                            index: &mut self.index,
                            fetch_tx: &self.fetch_tx,
                        };
                        handlers::run_action(&mut env, &mut entry.txn, &mut entry.ctx).await
                    }
                };

                let prev_state = state;
                let step = entry.machine.apply(outcome);
                let new_state = entry.machine.current();
                if new_state != prev_state {
                    entry.txn.enter_state(new_state);
                }

                StepEffects {
                    prev_state,
                    new_state,
                    step,
                    dep_requests: std::mem::take(&mut entry.ctx.dep_requests),
                    backoff: entry.ctx.backoff.take(),
                    pending_wait: std::mem::replace(&mut entry.ctx.pending_wait, Wait::None),
                }
            };

            self.release_slot_if_left_phase(id, effects.new_state);
            self.publish_updates(id);
            if effects.new_state != effects.prev_state {
                let _ = self.event_tx.send(Event::StateChanged {
                    id,
                    state: effects.new_state,
                });
            }

            match effects.step {
                Step::Continue => continue,
                Step::Waiting => {
                    self.park(id, effects).await?;
                    return Ok(());
                }
                Step::Done | Step::Aborted => {
                    self.finalize(id).await?;
                    return Ok(());
                }
            }
        }
    }

    /// Free the download/install slot when the transaction leaves those
    /// states, admitting the next queued one.
    fn release_slot_if_left_phase(&mut self, id: TxnId, new_state: StateTag) {
        let released = {
            let Some(entry) = self.txns.get_mut(&id) else {
                return;
            };
            // The slot covers the whole download phase including its retry
            // sibling; it frees once the transaction moves past it.
            if entry.holds_slot
                && !matches!(
                    new_state,
                    StateTag::Download | StateTag::DownloadRetry | StateTag::Install
                )
            {
                entry.holds_slot = false;
                true
            } else {
                false
            }
        };
        if released {
            self.phase_active = self.phase_active.saturating_sub(1);
            // Skip entries that were cancelled (or otherwise finished)
            // while queued behind the gate.
            while let Some(next) = self.phase_queue.pop_front() {
                let live = self
                    .txns
                    .get(&next)
                    .map(|entry| !entry.txn.is_terminal())
                    .unwrap_or(false);
                if live {
                    self.wake(next);
                    break;
                }
            }
        }
    }

    /// Publish progress and freshly appended log entries; buffer a journal
    /// update for reported progress.
    fn publish_updates(&mut self, id: TxnId) {
        let Some(entry) = self.txns.get_mut(&id) else {
            return;
        };

        if let Some(pct) = entry.txn.progress.report() {
            let _ = self.event_tx.send(Event::Progress {
                id,
                pct,
                bytes_current: entry.txn.progress.bytes_current,
                bytes_total: entry.txn.progress.bytes_total,
            });
            if let Err(e) = self.journal.append(&entry.txn) {
                warn!(txn = %id, error = %e, "failed to buffer progress record");
            }
        }

        let total_appended = entry.txn.log.evicted() + entry.txn.log.len() as u64;
        if total_appended > entry.published_logs {
            let fresh = (total_appended - entry.published_logs) as usize;
            let entries = entry.txn.log.entries();
            for log_entry in entries.iter().rev().take(fresh).rev() {
                let _ = self.event_tx.send(Event::Log {
                    id,
                    entry: log_entry.clone(),
                });
            }
            entry.published_logs = total_appended;
        }
    }

    /// Park a waiting transaction: spawn requested dependency children,
    /// arm timers, record and persist the wait condition.
    async fn park(&mut self, id: TxnId, effects: StepEffects) -> Result<(), EngineError> {
        let mut wait = effects.pending_wait;

        if !effects.dep_requests.is_empty() {
            let mut children = Vec::new();
            for pack in effects.dep_requests {
                match self.spawn_or_reuse_child(id, pack) {
                    Ok(child) => children.push(child),
                    Err(e) => {
                        let at = self.clock.epoch_ms();
                        if let Some(entry) = self.txns.get_mut(&id) {
                            entry.txn.log_error(at, format!("cannot spawn dependency: {e}"));
                            entry.machine.post(Outcome::Failed);
                        }
                        self.wake(id);
                        return Ok(());
                    }
                }
            }

            let first_live = children
                .iter()
                .copied()
                .find(|child| {
                    self.txns
                        .get(child)
                        .map(|e| !e.txn.is_terminal())
                        .unwrap_or(false)
                });
            if let Some(entry) = self.txns.get_mut(&id) {
                entry.ctx.children.extend(children.iter().copied());
            }
            match first_live {
                Some(child) => {
                    wait = Wait::OnTxn { id: child };
                    self.timers.set(id, self.cfg.dep_timeout, self.clock.now());
                }
                None => {
                    // Everything settled while we were spawning.
                    if let Some(entry) = self.txns.get_mut(&id) {
                        entry.machine.post(Outcome::Ok);
                    }
                    self.wake(id);
                    return Ok(());
                }
            }
        } else if let Some(backoff) = effects.backoff {
            self.timers.set(id, backoff, self.clock.now());
        }

        if let Some(entry) = self.txns.get_mut(&id) {
            entry.txn.set_wait(wait);
            self.journal.append_sync(&entry.txn)?;
        }
        Ok(())
    }

    /// Find a live transaction already covering the tuple, or create a
    /// child install transaction for the missing dependency.
    fn spawn_or_reuse_child(&mut self, parent: TxnId, pack: PackRef) -> Result<TxnId, EngineError> {
        let existing = self.txns.iter().find(|(_, entry)| {
            !entry.txn.is_terminal()
                && !entry.txn.kind.is_ephemeral()
                && entry.txn.pack.tuple() == pack.tuple()
        });
        if let Some((child, _)) = existing {
            return Ok(*child);
        }

        let id = self.allocator.next()?;
        let machine = Machine::new(catalog::state_set(TxnKind::Install))?;
        let at = self.clock.epoch_ms();
        let mut txn = Transaction::new(id, TxnKind::Install, pack, machine.current(), at);
        txn.log_info(at, format!("spawned as dependency of transaction {parent}"));
        self.journal.append_sync(&txn)?;

        info!(txn = %id, parent = %parent, pack = %txn.pack, "dependency transaction spawned");
        let _ = self.event_tx.send(Event::StateChanged {
            id,
            state: txn.state,
        });

        self.txns.insert(
            id,
            Entry {
                txn,
                machine,
                ctx: TxnCtx::new(),
                persisted_state: Some(StateTag::Precheck),
                holds_slot: false,
                queued: false,
                published_logs: 0,
            },
        );
        self.wake(id);
        Ok(id)
    }

    /// Terminal bookkeeping: stamp completion, persist, publish, and wake
    /// any transaction waiting on this one.
    async fn finalize(&mut self, id: TxnId) -> Result<(), EngineError> {
        let at = self.clock.epoch_ms();
        let state = {
            let Some(entry) = self.txns.get_mut(&id) else {
                return Ok(());
            };
            entry.txn.finish(at);
            if entry.txn.state == StateTag::Completed {
                // A successful transaction always ends at 100%, even when
                // it had no byte work.
                if let Some(pct) = entry.txn.progress.complete() {
                    let _ = self.event_tx.send(Event::Progress {
                        id,
                        pct,
                        bytes_current: entry.txn.progress.bytes_current,
                        bytes_total: entry.txn.progress.bytes_total,
                    });
                }
            }
            self.timers.cancel(id);
            self.journal.append_sync(&entry.txn)?;
            entry.txn.state
        };

        self.release_slot_if_left_phase(id, state);
        self.publish_updates(id);

        info!(txn = %id, state = %state, "transaction finished");
        let _ = self.event_tx.send(Event::Terminal {
            id,
            state,
            completed_at_ms: at,
        });

        self.notify_waiters(id, state);
        Ok(())
    }

    /// Wake every transaction parked on the finished one, posting the
    /// outcome its child's terminal state maps to.
    fn notify_waiters(&mut self, finished: TxnId, state: StateTag) {
        let at = self.clock.epoch_ms();
        let waiters: Vec<TxnId> = self
            .txns
            .iter()
            .filter(|(_, entry)| entry.txn.wait == Wait::OnTxn { id: finished })
            .map(|(id, _)| *id)
            .collect();

        for waiter in waiters {
            let Some(entry) = self.txns.get_mut(&waiter) else {
                continue;
            };
            match state {
                StateTag::Completed => {
                    entry
                        .txn
                        .log_info(at, format!("dependency transaction {finished} completed"));
                    entry.machine.post(Outcome::Ok);
                }
                StateTag::Cancelled => {
                    entry.txn.log_error(
                        at,
                        format!("dependency transaction {finished} was cancelled"),
                    );
                    entry.machine.post(Outcome::Failed);
                }
                _ => {
                    entry
                        .txn
                        .log_error(at, format!("dependency transaction {finished} failed"));
                    entry.machine.post(Outcome::Failed);
                }
            }
            self.timers.cancel(waiter);
            self.wake(waiter);
        }
    }

    /// Route a fetch completion to its parked transaction.
    pub fn on_fetch_done(&mut self, done: FetchDone) {
        let Some(entry) = self.txns.get_mut(&done.txn) else {
            return;
        };
        if entry.txn.is_terminal() {
            return;
        }
        if entry.machine.current() == StateTag::DownloadRetry {
            let event = match done.status {
                chef_adapters::FetchStatus::Complete => Outcome::Ok,
                chef_adapters::FetchStatus::Transient(_) => Outcome::Retry,
                chef_adapters::FetchStatus::Denied(_) => Outcome::Failed,
                chef_adapters::FetchStatus::InProgress => return,
            };
            entry.machine.post(event);
        }
        self.wake(done.txn);
    }

    /// Fire elapsed timers: backoff wake-ups and dependency timeouts.
    pub fn fire_timers(&mut self) {
        let fired = self.timers.fired(self.clock.now());
        let at = self.clock.epoch_ms();
        for id in fired {
            let Some(entry) = self.txns.get_mut(&id) else {
                continue;
            };
            if entry.txn.is_terminal() {
                continue;
            }
            match entry.machine.current() {
                StateTag::DownloadRetry => entry.machine.post(Outcome::Ok),
                StateTag::DependenciesWait => {
                    entry
                        .txn
                        .log_error(at, "timed out waiting for dependencies");
                    entry.machine.post(Outcome::Failed);
                }
                _ => {}
            }
            self.wake(id);
        }
    }

    /// Drop terminal transactions whose grace period has passed, and
    /// compact the journal down to the retained set.
    pub fn purge_expired(&mut self) -> Result<(), EngineError> {
        let now = self.clock.epoch_ms();
        let grace_ms = self.cfg.grace.as_millis() as u64;
        let expired: Vec<TxnId> = self
            .txns
            .iter()
            .filter(|(_, entry)| {
                entry.txn.is_terminal()
                    && entry
                        .txn
                        .completed_at_ms
                        .map(|done| done + grace_ms <= now)
                        .unwrap_or(true)
            })
            .map(|(id, _)| *id)
            .collect();

        if expired.is_empty() {
            return Ok(());
        }

        for id in &expired {
            debug!(txn = %id, "purging terminal transaction past grace period");
            self.txns.remove(id);
        }
        self.journal
            .compact(self.txns.values().map(|entry| &entry.txn))?;
        Ok(())
    }

    /// Subscribe to the published event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
