//! Crash recovery: the journal round-trips every durable field and a
//! restarted engine picks transactions up where they stopped.

use crate::prelude::*;
use chef_core::{StateTag, TxnKind};
use chef_storage::RebootCheck;

#[tokio::test]
async fn durable_fields_round_trip_byte_identical() {
    let mut spec = spec();
    spec.store.fail_transient(1);

    let id = spec
        .sched
        .submit_direct(TxnKind::Install, "acme/editor".parse().unwrap())
        .unwrap();
    // One failed attempt parks the transaction in its retry backoff
    spec.sched.drain().await.unwrap();

    let live = spec.sched.status_direct(id).unwrap();
    assert_eq!(live.state, StateTag::DownloadRetry);

    // What a restarted daemon reads back is exactly what the live record
    // holds, including log and progress.
    let records = read_journal(&spec);
    let restored = &records[&id];
    let restored_json = serde_json::to_vec(restored).unwrap();

    let (mut fresh, _) = reboot(&spec);
    fresh
        .restore(records.clone(), RebootCheck::SameBoot)
        .await
        .unwrap();
    let after = fresh.status_direct(id).unwrap();
    assert_eq!(after.state, live.state);
    assert_eq!(after.retries, live.retries);
    assert_eq!(after.created_at_ms, live.created_at_ms);

    // Re-reading the journal yields byte-identical durable fields
    let records_again = read_journal(&spec);
    assert_eq!(serde_json::to_vec(&records_again[&id]).unwrap(), restored_json);
}

#[tokio::test]
async fn restart_mid_retry_completes_after_backoff() {
    let mut spec = spec();
    spec.store.fail_transient(1);

    let id = spec
        .sched
        .submit_direct(TxnKind::Install, "acme/editor".parse().unwrap())
        .unwrap();
    spec.sched.drain().await.unwrap();
    assert_eq!(
        spec.sched.status_direct(id).unwrap().state,
        StateTag::DownloadRetry
    );

    // Restart: the retry resumes, the backoff re-arms, the install lands.
    let records = read_journal(&spec);
    let (mut fresh, check) = reboot(&spec);
    fresh.restore(records, check).await.unwrap();
    settle(&mut fresh, &spec.clock).await;

    assert_eq!(fresh.status_direct(id).unwrap().state, StateTag::Completed);
    assert_eq!(
        spec.layout
            .installed_revision(&"acme/editor".parse().unwrap())
            .unwrap(),
        Some(1)
    );
}

#[tokio::test]
async fn cancelled_and_failed_outcomes_survive_restart() {
    let mut spec = spec();
    spec.store.park_fetches(true);

    let cancelled = spec
        .sched
        .submit_direct(TxnKind::Install, "acme/editor".parse().unwrap())
        .unwrap();
    spec.sched.drain().await.unwrap();
    spec.sched.cancel_direct(cancelled);
    spec.sched.drain().await.unwrap();
    assert_eq!(
        spec.sched.status_direct(cancelled).unwrap().state,
        StateTag::Cancelled
    );

    spec.verifier.reject_all();
    spec.store.park_fetches(false);
    let failed = spec
        .sched
        .submit_direct(TxnKind::Install, "acme/tools".parse().unwrap())
        .unwrap();
    spec.sched.drain().await.unwrap();
    assert_eq!(
        spec.sched.status_direct(failed).unwrap().state,
        StateTag::Error
    );

    // Both terminal outcomes are still answerable after a restart
    let records = read_journal(&spec);
    let (mut fresh, check) = reboot(&spec);
    fresh.restore(records, check).await.unwrap();
    assert_eq!(
        fresh.status_direct(cancelled).unwrap().state,
        StateTag::Cancelled
    );
    assert_eq!(fresh.status_direct(failed).unwrap().state, StateTag::Error);
}
