// SPDX-License-Identifier: MIT

use super::*;
use chef_adapters::{FakeBackend, FakeMounter, FakePackStore, FakeVerifier};
use chef_core::{CommandSpec, FakeClock, PackManifest, ServiceSpec};
use tempfile::TempDir;

type TestScheduler = Scheduler<FakePackStore, FakeVerifier, FakeMounter, FakeBackend, FakeClock>;

struct Rig {
    // Held for the lifetime of the scheduler's on-disk state
    _dir: TempDir,
    sched: TestScheduler,
    clock: FakeClock,
    store: FakePackStore,
    verifier: FakeVerifier,
    mounter: FakeMounter,
    backend: FakeBackend,
    layout: Layout,
    events: broadcast::Receiver<Event>,
}

fn rig() -> Rig {
    let dir = TempDir::new().unwrap();
    let layout = Layout::new(dir.path());
    let (journal, records) = Journal::open(&dir.path().join("state/txn.journal")).unwrap();
    assert!(records.is_empty());
    let allocator = TxnIdAllocator::open(&dir.path().join("state/txn.seq"), 0).unwrap();

    let clock = FakeClock::new();
    let store = FakePackStore::new();
    let verifier = FakeVerifier::new();
    let mounter = FakeMounter::new();
    let backend = FakeBackend::new();
    let (event_tx, events) = broadcast::channel(1024);

    let cfg = EngineConfig {
        host_platform: "linux/amd64".to_string(),
        ..EngineConfig::default()
    };
    let (sched, _handle) = Scheduler::new(
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

    Rig {
        _dir: dir,
        sched,
        clock,
        store,
        verifier,
        mounter,
        backend,
        layout,
        events,
    }
}

fn manifest_with_command_and_service() -> PackManifest {
    PackManifest {
        pack: "acme/foo@1".parse().unwrap(),
        platform: "linux/amd64".to_string(),
        commands: vec![CommandSpec {
            name: "foo".to_string(),
            path: "bin/foo".to_string(),
        }],
        services: vec![ServiceSpec {
            name: "food".to_string(),
            exec: "bin/food --serve".to_string(),
        }],
        dependencies: Vec::new(),
    }
}

fn state_changes(events: &mut broadcast::Receiver<Event>) -> Vec<StateTag> {
    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::StateChanged { state, .. } = event {
            states.push(state);
        }
    }
    states
}

fn progress_pcts(events: &mut broadcast::Receiver<Event>) -> Vec<u8> {
    let mut pcts = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::Progress { pct, .. } = event {
            pcts.push(pct);
        }
    }
    pcts
}

/// Advance through however many retry backoffs are pending until the
/// transaction settles.
async fn settle(rig: &mut Rig) {
    for _ in 0..12 {
        rig.sched.drain().await.unwrap();
        rig.clock.advance(Duration::from_secs(61));
        rig.sched.fire_timers();
    }
    rig.sched.drain().await.unwrap();
}

#[tokio::test]
async fn happy_install_walks_the_full_sequence() {
    let mut rig = rig();
    rig.mounter
        .set_manifest("acme-foo-1", manifest_with_command_and_service());

    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.clock.advance(Duration::from_secs(2));
    rig.sched.drain().await.unwrap();

    let summary = rig.sched.status_direct(id).unwrap();
    assert_eq!(summary.state, StateTag::Completed);
    assert_eq!(summary.pct, 100);
    assert!(summary.completed_at_ms.unwrap() > summary.created_at_ms);

    assert_eq!(
        state_changes(&mut rig.events),
        vec![
            StateTag::Precheck,
            StateTag::Download,
            StateTag::Verify,
            StateTag::Dependencies,
            StateTag::Install,
            StateTag::Mount,
            StateTag::Load,
            StateTag::StartServices,
            StateTag::GenerateWrappers,
            StateTag::Completed,
        ]
    );

    // Side effects: pack file, mount, service, wrapper
    let pack_file = rig
        .layout
        .pack_file(&"acme/foo@1".parse().unwrap())
        .unwrap();
    assert!(pack_file.exists());
    assert!(rig
        .mounter
        .is_mounted(&rig.layout.mountpoint(&"acme/foo".parse().unwrap())));
    assert_eq!(
        rig.backend.running().await.unwrap(),
        vec!["acme/foo/food"]
    );
    let wrapper = rig.layout.wrapper_file("foo");
    assert!(wrapper.exists());
    let contents = std::fs::read_to_string(&wrapper).unwrap();
    assert!(contents.starts_with("#!/bin/sh"));
    assert!(contents.contains("bin/foo"));
}

#[tokio::test]
async fn progress_events_are_strictly_increasing() {
    let mut rig = rig();
    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();
    assert_eq!(rig.sched.status_direct(id).unwrap().state, StateTag::Completed);

    let pcts = progress_pcts(&mut rig.events);
    assert!(!pcts.is_empty());
    assert!(pcts.windows(2).all(|w| w[0] < w[1]), "{pcts:?}");
    assert_eq!(*pcts.last().unwrap(), 100);
}

#[tokio::test]
async fn download_retries_twice_then_succeeds() {
    let mut rig = rig();
    rig.store.fail_transient(2);

    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    settle(&mut rig).await;

    let summary = rig.sched.status_direct(id).unwrap();
    assert_eq!(summary.state, StateTag::Completed);
    assert_eq!(summary.retries, 2);
    assert_eq!(rig.store.fetch_count(), 3);

    // The retry loop bounced through download-retry twice
    let states = state_changes(&mut rig.events);
    let retries = states
        .iter()
        .filter(|s| **s == StateTag::DownloadRetry)
        .count();
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn retry_cap_converts_to_failure() {
    let mut rig = rig();
    rig.store.fail_transient(100);

    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    settle(&mut rig).await;

    let summary = rig.sched.status_direct(id).unwrap();
    assert_eq!(summary.state, StateTag::Error);
    // Bounded attempts: the default cap
    assert_eq!(rig.store.fetch_count(), 5);
}

#[tokio::test]
async fn verify_rejection_stops_before_install() {
    let mut rig = rig();
    rig.verifier.reject_all();

    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();

    assert_eq!(rig.sched.status_direct(id).unwrap().state, StateTag::Error);

    let states = state_changes(&mut rig.events);
    assert!(!states.contains(&StateTag::Install));
    assert_eq!(
        states,
        vec![
            StateTag::Precheck,
            StateTag::Download,
            StateTag::Verify,
            StateTag::Error,
        ]
    );

    // Nothing installable remains anywhere
    assert!(rig.layout.installed_packs().unwrap().is_empty());
    assert!(!rig
        .layout
        .staging_file(&"acme/foo@1".parse().unwrap())
        .unwrap()
        .exists());
}

#[tokio::test]
async fn dependency_spawns_child_and_resumes_parent() {
    let mut rig = rig();
    rig.store.set_dependencies("acme/foo", vec!["acme/bar"]);

    let parent = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();

    // Parent and child both ran to completion within the drain
    let summaries = rig.sched.list_direct();
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.state == StateTag::Completed));

    let child = summaries
        .iter()
        .find(|s| s.id != parent)
        .map(|s| s.id)
        .unwrap();
    assert!(child > parent);

    // The parent visibly passed through dependencies-wait
    let states = state_changes(&mut rig.events);
    assert!(states.contains(&StateTag::DependenciesWait));

    // Both packs are installed
    assert!(rig
        .layout
        .installed_revision(&"acme/bar".parse().unwrap())
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn failed_dependency_fails_the_parent_with_reason() {
    let mut rig = rig();
    rig.store.set_dependencies("acme/foo", vec!["acme/ghost"]);
    rig.store.set_unknown("acme/ghost");

    let parent = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();

    let summary = rig.sched.status_direct(parent).unwrap();
    assert_eq!(summary.state, StateTag::Error);
}

#[tokio::test]
async fn dependency_wait_times_out() {
    let mut rig = rig();
    rig.store.set_dependencies("acme/foo", vec!["acme/bar"]);
    // Park the child's download forever
    rig.store.park_fetches(true);

    let parent = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();
    assert_eq!(
        rig.sched.status_direct(parent).unwrap().state,
        StateTag::DependenciesWait
    );

    rig.clock.advance(Duration::from_secs(601));
    rig.sched.fire_timers();
    rig.sched.drain().await.unwrap();

    assert_eq!(rig.sched.status_direct(parent).unwrap().state, StateTag::Error);
}

#[tokio::test]
async fn cancel_during_download_leaves_no_pack_file() {
    let mut rig = rig();
    rig.store.park_fetches(true);

    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();
    assert_eq!(
        rig.sched.status_direct(id).unwrap().state,
        StateTag::DownloadRetry
    );

    // A torn partial download is on disk when the cancel arrives
    let staged = rig
        .layout
        .staging_file(&"acme/foo@1".parse().unwrap())
        .unwrap();
    std::fs::create_dir_all(staged.parent().unwrap()).unwrap();
    std::fs::write(&staged, b"partial bytes").unwrap();

    assert_eq!(rig.sched.cancel_direct(id), CancelReply::Ok);
    rig.sched.drain().await.unwrap();

    assert_eq!(rig.sched.status_direct(id).unwrap().state, StateTag::Cancelled);
    assert!(rig.layout.installed_packs().unwrap().is_empty());
    // The woken action observed the flag and cleaned up after itself
    assert!(!staged.exists());
    let logs = rig.sched.txns.get(&id).unwrap().txn.log.entries();
    assert!(logs
        .iter()
        .any(|e| e.message.contains("cancelled while retrying download")));
}

#[tokio::test]
async fn cancel_bypasses_the_phase_gate() {
    let mut rig = rig();
    rig.store.park_fetches(true);

    // Saturate the download phase, then queue one more behind the gate
    let ids: Vec<TxnId> = (0..5)
        .map(|i| {
            rig.sched
                .submit_direct(TxnKind::Install, format!("acme/pkg{i}").parse().unwrap())
                .unwrap()
        })
        .collect();
    rig.sched.drain().await.unwrap();
    let gated = *ids.last().unwrap();
    assert_eq!(
        rig.sched.status_direct(gated).unwrap().state,
        StateTag::Download
    );

    // Cancelling the gated transaction must not wait for a free slot
    assert_eq!(rig.sched.cancel_direct(gated), CancelReply::Ok);
    rig.sched.drain().await.unwrap();
    assert_eq!(
        rig.sched.status_direct(gated).unwrap().state,
        StateTag::Cancelled
    );
}

#[tokio::test]
async fn cancel_replies_reflect_transaction_state() {
    let mut rig = rig();
    assert_eq!(rig.sched.cancel_direct(TxnId::new(9)), CancelReply::NotFound);

    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();
    assert_eq!(rig.sched.cancel_direct(id), CancelReply::AlreadyTerminal);
}

#[tokio::test]
async fn cancel_is_downgraded_in_irreversible_teardown() {
    let mut rig = rig();
    let id = rig
        .sched
        .submit_direct(TxnKind::Uninstall, "acme/foo".parse().unwrap())
        .unwrap();

    // Force the transaction into the irreversible teardown before driving.
    {
        let entry = rig.sched.txns.get_mut(&id).unwrap();
        entry.machine = Machine::resume(catalog::uninstall_set(), StateTag::StopServices).unwrap();
        entry.txn.enter_state(StateTag::StopServices);
        entry.persisted_state = Some(StateTag::StopServices);
    }

    assert_eq!(rig.sched.cancel_direct(id), CancelReply::Ok);
    {
        let entry = rig.sched.txns.get(&id).unwrap();
        assert!(entry.ctx.cancel_requested);
        assert!(!entry.machine.has_posted(), "cancel must not be posted");
    }

    rig.sched.drain().await.unwrap();
    let summary = rig.sched.status_direct(id).unwrap();
    assert_ne!(summary.state, StateTag::Cancelled);
    assert!(summary.state.is_terminal());
}

#[tokio::test]
async fn duplicate_tuple_is_rejected() {
    let mut rig = rig();
    rig.store.park_fetches(true);

    rig.sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();

    let err = rig
        .sched
        .submit_direct(TxnKind::Update, "acme/foo".parse().unwrap())
        .unwrap_err();
    assert!(matches!(err, SubmitError::Conflict(_, _)));

    // A different package is fine
    rig.sched
        .submit_direct(TxnKind::Install, "acme/bar".parse().unwrap())
        .unwrap();
}

#[tokio::test]
async fn rollback_requires_pinned_revision() {
    let mut rig = rig();
    let err = rig
        .sched
        .submit_direct(TxnKind::Rollback, "acme/foo".parse().unwrap())
        .unwrap_err();
    assert!(matches!(err, SubmitError::RevisionRequired(_)));
}

#[tokio::test]
async fn parked_fetch_resumes_through_completion_notice() {
    let mut rig = rig();
    rig.store.park_fetches(true);

    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();
    assert_eq!(
        rig.sched.status_direct(id).unwrap().state,
        StateTag::DownloadRetry
    );

    // Store finishes the download in the background and notifies
    rig.store.park_fetches(false);
    rig.store.finish_parked(id.as_u64()).await;
    let done = FetchDone {
        txn: id,
        status: chef_adapters::FetchStatus::Complete,
    };
    rig.sched.on_fetch_done(done);
    rig.sched.drain().await.unwrap();

    assert_eq!(rig.sched.status_direct(id).unwrap().state, StateTag::Completed);
}

#[tokio::test]
async fn partial_service_start_is_rolled_back() {
    let mut rig = rig();
    let mut manifest = manifest_with_command_and_service();
    manifest.services.push(ServiceSpec {
        name: "food2".to_string(),
        exec: "bin/food2".to_string(),
    });
    rig.mounter.set_manifest("acme-foo-1", manifest);
    rig.backend.fail_start_at(2);

    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();

    assert_eq!(rig.sched.status_direct(id).unwrap().state, StateTag::Error);
    // The first service was started, then stopped by the compensating
    // rollback
    assert!(rig.backend.running().await.unwrap().is_empty());
}

#[tokio::test]
async fn uninstall_removes_everything_installed() {
    let mut rig = rig();
    rig.mounter
        .set_manifest("acme-foo-1", manifest_with_command_and_service());

    let install = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();
    assert_eq!(
        rig.sched.status_direct(install).unwrap().state,
        StateTag::Completed
    );

    let uninstall = rig
        .sched
        .submit_direct(TxnKind::Uninstall, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();
    assert_eq!(
        rig.sched.status_direct(uninstall).unwrap().state,
        StateTag::Completed
    );

    assert!(rig.layout.installed_packs().unwrap().is_empty());
    assert!(!rig.layout.wrapper_file("foo").exists());
    assert!(rig.backend.running().await.unwrap().is_empty());
    assert!(!rig
        .mounter
        .is_mounted(&rig.layout.mountpoint(&"acme/foo".parse().unwrap())));
}

#[tokio::test]
async fn update_swaps_to_the_new_revision() {
    let mut rig = rig();

    let install = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();
    assert_eq!(
        rig.sched.status_direct(install).unwrap().state,
        StateTag::Completed
    );

    // The index now serves revision 2
    rig.store.set_revision("acme/foo", 2);

    let update = rig
        .sched
        .submit_direct(TxnKind::Update, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();
    assert_eq!(
        rig.sched.status_direct(update).unwrap().state,
        StateTag::Completed
    );

    assert_eq!(
        rig.layout
            .installed_revision(&"acme/foo".parse().unwrap())
            .unwrap(),
        Some(2)
    );
    // Only one revision remains in the store
    assert_eq!(rig.layout.installed_packs().unwrap().len(), 1);
}

#[tokio::test]
async fn terminal_transactions_are_purged_after_grace() {
    let mut rig = rig();
    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();
    assert!(rig.sched.status_direct(id).is_some());

    // Still retained within the grace period
    rig.clock.advance(Duration::from_secs(10));
    rig.sched.purge_expired().unwrap();
    assert!(rig.sched.status_direct(id).is_some());

    rig.clock.advance(Duration::from_secs(300));
    rig.sched.purge_expired().unwrap();
    assert!(rig.sched.status_direct(id).is_none());
}

#[tokio::test]
async fn terminal_state_never_changes() {
    let mut rig = rig();
    let id = rig
        .sched
        .submit_direct(TxnKind::Install, "acme/foo".parse().unwrap())
        .unwrap();
    rig.sched.drain().await.unwrap();

    let before = rig.sched.status_direct(id).unwrap();
    assert_eq!(before.state, StateTag::Completed);

    // Late cancel and spurious wake must not disturb it
    assert_eq!(rig.sched.cancel_direct(id), CancelReply::AlreadyTerminal);
    rig.sched.wake(id);
    rig.sched.drain().await.unwrap();

    let after = rig.sched.status_direct(id).unwrap();
    assert_eq!(after.state, before.state);
    assert_eq!(after.completed_at_ms, before.completed_at_ms);
}

#[tokio::test]
async fn phase_limit_bounds_concurrent_downloads() {
    let mut rig = rig();
    rig.store.park_fetches(true);

    let ids: Vec<TxnId> = (0..6)
        .map(|i| {
            rig.sched
                .submit_direct(TxnKind::Install, format!("acme/pkg{i}").parse().unwrap())
                .unwrap()
        })
        .collect();
    rig.sched.drain().await.unwrap();

    // Only the first four made it into the download phase; the rest are
    // parked in front of it.
    let in_retry = ids
        .iter()
        .filter(|id| {
            rig.sched.status_direct(**id).map(|s| s.state) == Some(StateTag::DownloadRetry)
        })
        .count();
    assert_eq!(in_retry, 4);
    let in_download = ids
        .iter()
        .filter(|id| rig.sched.status_direct(**id).map(|s| s.state) == Some(StateTag::Download))
        .count();
    assert_eq!(in_download, 2);
}
