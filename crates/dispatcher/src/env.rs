// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the dispatcher crate.

use std::time::Duration;

fn parse_duration_secs(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pending aggregator evaluation tick (default: 3s).
pub fn pending_tick() -> Duration {
    parse_duration_secs("RX_PENDING_TICK_SECS").unwrap_or(Duration::from_secs(3))
}

/// Quiet window an incomplete set must sit through before submission
/// (default: 20s).
pub fn quiescence_window() -> u64 {
    std::env::var("RX_QUIESCENCE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(20)
}

/// Creation age past which a below-minimum pending set is discarded
/// (default: 7200s).
pub fn stale_pending_age() -> u64 {
    std::env::var("RX_STALE_PENDING_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(7200)
}

/// How long shutdown waits for workers to drain (default: 25s).
pub fn drain_deadline() -> Duration {
    parse_duration_secs("RX_DRAIN_DEADLINE_SECS").unwrap_or(Duration::from_secs(25))
}
