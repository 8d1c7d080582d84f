//! Shared fixture: a fake-backed scheduler on a temp root.

use chef_adapters::{FakeBackend, FakeMounter, FakePackStore, FakeVerifier};
pub use chef_adapters::ServiceBackend;
use chef_core::{Event, FakeClock, Layout};
use chef_engine::{EngineConfig, Scheduler, SchedulerDeps, SchedulerHandle};
use chef_storage::{Journal, TxnIdAllocator};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

pub type SpecScheduler =
    Scheduler<FakePackStore, FakeVerifier, FakeMounter, FakeBackend, FakeClock>;

pub struct Spec {
    pub dir: TempDir,
    pub sched: SpecScheduler,
    #[allow(dead_code)]
    pub handle: SchedulerHandle,
    pub clock: FakeClock,
    pub store: FakePackStore,
    pub verifier: FakeVerifier,
    pub mounter: FakeMounter,
    pub backend: FakeBackend,
    pub layout: Layout,
    pub events: broadcast::Receiver<Event>,
}

pub fn spec() -> Spec {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::new();
    let store = FakePackStore::new();
    let verifier = FakeVerifier::new();
    let mounter = FakeMounter::new();
    let backend = FakeBackend::new();
    let (sched, handle, layout, events) =
        boot(&dir, &clock, &store, &verifier, &mounter, &backend);
    Spec {
        dir,
        sched,
        handle,
        clock,
        store,
        verifier,
        mounter,
        backend,
        layout,
        events,
    }
}

/// Boot a fresh scheduler against the same on-disk state, as a daemon
/// restart would.
pub fn reboot(spec: &Spec) -> (SpecScheduler, chef_storage::RebootCheck) {
    let (sched, _handle, _layout, _events) = boot(
        &spec.dir,
        &spec.clock,
        &spec.store,
        &spec.verifier,
        &spec.mounter,
        &spec.backend,
    );
    (sched, chef_storage::RebootCheck::SameBoot)
}

fn boot(
    dir: &TempDir,
    clock: &FakeClock,
    store: &FakePackStore,
    verifier: &FakeVerifier,
    mounter: &FakeMounter,
    backend: &FakeBackend,
) -> (
    SpecScheduler,
    SchedulerHandle,
    Layout,
    broadcast::Receiver<Event>,
) {
    let layout = Layout::new(dir.path());
    let (journal, records) = Journal::open(&dir.path().join("state/txn.journal")).unwrap();
    let floor = Journal::max_id(&records);
    let allocator = TxnIdAllocator::open(&dir.path().join("state/txn.seq"), floor).unwrap();
    let (event_tx, events) = broadcast::channel(4096);

    let cfg = EngineConfig {
        host_platform: "linux/amd64".to_string(),
        ..EngineConfig::default()
    };
    let (sched, handle) = Scheduler::new(
        SchedulerDeps {
            store: store.clone(),
            verifier: verifier.clone(),
            mounter: mounter.clone(),
            services: backend.clone(),
        },
        layout.clone(),
        cfg,
        clock.clone(),
        journal,
        allocator,
        event_tx,
    );
    (sched, handle, layout, events)
}

/// Journal records as a restart would read them.
pub fn read_journal(spec: &Spec) -> std::collections::BTreeMap<chef_core::TxnId, chef_core::Transaction> {
    let (_journal, records) =
        Journal::open(&spec.dir.path().join("state/txn.journal")).unwrap();
    records
}

/// Drain, advancing through any pending retry backoffs.
pub async fn settle(sched: &mut SpecScheduler, clock: &FakeClock) {
    for _ in 0..12 {
        sched.drain().await.unwrap();
        clock.advance(Duration::from_secs(61));
        sched.fire_timers();
    }
    sched.drain().await.unwrap();
}
