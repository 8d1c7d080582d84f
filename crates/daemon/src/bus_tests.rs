// SPDX-License-Identifier: MIT

use super::*;
use chef_core::{StateTag, TxnId};

fn event(id: u64) -> Event {
    Event::StateChanged {
        id: TxnId::new(id),
        state: StateTag::Download,
    }
}

#[tokio::test]
async fn subscribers_see_published_events() {
    let bus = EventBus::new(16);
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.sender().send(event(1)).unwrap();

    assert_eq!(a.recv().await.unwrap().txn_id(), TxnId::new(1));
    assert_eq!(b.recv().await.unwrap().txn_id(), TxnId::new(1));
}

#[tokio::test]
async fn publishing_without_subscribers_is_not_an_error_path() {
    let bus = EventBus::new(16);
    // broadcast::send errs with no receivers; the scheduler ignores it
    assert!(bus.sender().send(event(1)).is_err());
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn late_subscribers_miss_earlier_events() {
    let bus = EventBus::new(16);
    let mut early = bus.subscribe();
    bus.sender().send(event(1)).unwrap();

    let mut late = bus.subscribe();
    bus.sender().send(event(2)).unwrap();

    assert_eq!(early.recv().await.unwrap().txn_id(), TxnId::new(1));
    assert_eq!(early.recv().await.unwrap().txn_id(), TxnId::new(2));
    assert_eq!(late.recv().await.unwrap().txn_id(), TxnId::new(2));
}
