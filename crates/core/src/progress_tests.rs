// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn percentage_is_zero_without_total() {
    let mut progress = Progress::default();
    progress.set_current(500);
    assert_eq!(progress.percentage(), 0);
}

#[test]
fn current_is_clamped_to_total() {
    let mut progress = Progress::default();
    progress.set_total(100);
    progress.set_current(250);
    assert_eq!(progress.bytes_current, 100);
    assert_eq!(progress.percentage(), 100);
}

#[test]
fn report_only_on_integer_advance() {
    let mut progress = Progress::default();
    progress.set_total(1000);

    progress.set_current(5);
    assert_eq!(progress.report(), None); // 0%

    progress.set_current(10);
    assert_eq!(progress.report(), Some(1));

    progress.set_current(14);
    assert_eq!(progress.report(), None); // still 1%

    progress.set_current(500);
    assert_eq!(progress.report(), Some(50));
}

#[test]
fn reported_percentage_is_monotonic() {
    let mut progress = Progress::default();
    progress.set_total(100);
    progress.set_current(80);
    assert_eq!(progress.report(), Some(80));

    // A regressing byte count must not lower the reported percentage.
    progress.set_current(40);
    assert_eq!(progress.report(), None);
    assert_eq!(progress.last_reported_pct, 80);
}

#[test]
fn complete_reaches_100_even_without_byte_work() {
    let mut progress = Progress::default();
    assert_eq!(progress.complete(), Some(100));
    assert_eq!(progress.last_reported_pct, 100);

    // Completing twice reports nothing new.
    assert_eq!(progress.complete(), None);
}
