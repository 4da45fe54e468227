// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn fake_clock_advances_monotonically() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    clock.advance(Duration::from_secs(5));
    let t1 = clock.now();
    assert_eq!(t1 - t0, Duration::from_secs(5));
}

#[test]
fn system_clock_moves_forward() {
    let clock = SystemClock;
    let t0 = clock.now();
    let t1 = clock.now();
    assert!(t1 >= t0);
}
