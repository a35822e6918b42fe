// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use std::time::Duration;

fn parse_duration_secs(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Minimum quiet age before an inbound event is acted on (default: 1s).
pub fn incoming_min_age() -> Duration {
    parse_duration_secs("RX_INCOMING_MIN_AGE_SECS").unwrap_or(Duration::from_secs(1))
}

/// Minimum file age picked up by the periodic rescan (default: 20s).
pub fn rescan_min_age() -> Duration {
    parse_duration_secs("RX_RESCAN_MIN_AGE_SECS").unwrap_or(Duration::from_secs(20))
}

/// Interval between idle rescans of the inbound spool (default: 600s).
pub fn rescan_interval() -> Duration {
    parse_duration_secs("RX_RESCAN_INTERVAL_SECS").unwrap_or(Duration::from_secs(600))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
