//! The subscriber event stream: state changes, rate-limited progress,
//! log entries, and the terminal notice.

use crate::prelude::*;
use chef_core::{Event, StateTag, TxnKind};

#[tokio::test]
async fn stream_carries_all_four_event_kinds_in_order() {
    let mut spec = spec();
    let id = spec
        .sched
        .submit_direct(TxnKind::Install, "acme/editor".parse().unwrap())
        .unwrap();
    spec.sched.drain().await.unwrap();

    let mut saw_state = false;
    let mut saw_progress = false;
    let mut saw_log = false;
    let mut terminal_last = false;

    while let Ok(event) = spec.events.try_recv() {
        assert_eq!(event.txn_id(), id);
        terminal_last = false;
        match event {
            Event::StateChanged { .. } => saw_state = true,
            Event::Progress { .. } => saw_progress = true,
            Event::Log { .. } => saw_log = true,
            Event::Terminal { state, .. } => {
                assert_eq!(state, StateTag::Completed);
                terminal_last = true;
            }
        }
    }

    assert!(saw_state && saw_progress && saw_log);
    assert!(terminal_last, "terminal must be the final event");
}

#[tokio::test]
async fn progress_is_emitted_only_when_the_percentage_moves() {
    let mut spec = spec();
    spec.sched
        .submit_direct(TxnKind::Install, "acme/editor".parse().unwrap())
        .unwrap();
    spec.sched.drain().await.unwrap();

    let mut last = None;
    while let Ok(event) = spec.events.try_recv() {
        if let Event::Progress { pct, .. } = event {
            if let Some(prev) = last {
                assert!(pct > prev, "progress must strictly advance");
            }
            last = Some(pct);
        }
    }
    assert_eq!(last, Some(100));
}

#[tokio::test]
async fn log_events_match_the_retained_log() {
    let mut spec = spec();
    let id = spec
        .sched
        .submit_direct(TxnKind::Install, "acme/editor".parse().unwrap())
        .unwrap();
    spec.sched.drain().await.unwrap();

    let mut streamed = Vec::new();
    while let Ok(event) = spec.events.try_recv() {
        if let Event::Log { entry, .. } = event {
            streamed.push(entry.message);
        }
    }

    // The streamed entries are exactly the retained ones, in order.
    let records = read_journal(&spec);
    let retained: Vec<String> = records[&id]
        .log
        .entries()
        .into_iter()
        .map(|entry| entry.message)
        .collect();
    assert_eq!(streamed, retained);
    assert!(streamed.iter().any(|m| m.contains("prechecking")));
}
