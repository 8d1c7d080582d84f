// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn state_changed_serializes_with_type_tag() {
    let event = Event::StateChanged {
        id: TxnId::new(4),
        state: StateTag::Download,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "txn:state-changed");
    assert_eq!(json["id"], 4);
    assert_eq!(json["state"], 2);
}

#[test]
fn terminal_round_trips() {
    let event = Event::Terminal {
        id: TxnId::new(9),
        state: StateTag::Error,
        completed_at_ms: 123,
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn txn_id_accessor_covers_all_variants() {
    let id = TxnId::new(2);
    let events = [
        Event::StateChanged {
            id,
            state: StateTag::Precheck,
        },
        Event::Progress {
            id,
            pct: 10,
            bytes_current: 1,
            bytes_total: 10,
        },
        Event::Terminal {
            id,
            state: StateTag::Completed,
            completed_at_ms: 1,
        },
    ];
    for event in events {
        assert_eq!(event.txn_id(), id);
    }
}
