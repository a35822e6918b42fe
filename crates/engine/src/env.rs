// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::time::Duration;

fn parse_duration_secs(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Minimum quiet age before a queue file is drained (default: 2s).
pub fn queue_min_age() -> Duration {
    parse_duration_secs("RX_QUEUE_MIN_AGE_SECS").unwrap_or(Duration::from_secs(2))
}

/// Interval between idle sweeps (default: 600s).
pub fn sweep_interval() -> Duration {
    parse_duration_secs("RX_SWEEP_INTERVAL_SECS").unwrap_or(Duration::from_secs(600))
}

/// Age past which a queue file counts as left over and is re-enqueued
/// (default: 900s).
pub fn leftover_age() -> Duration {
    parse_duration_secs("RX_LEFTOVER_AGE_SECS").unwrap_or(Duration::from_secs(900))
}
