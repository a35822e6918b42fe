// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-hour processing state machine.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// State of one `(site, year, doy, hour)` work unit, as persisted in its
/// `state.<hour>` file.
///
/// ```text
/// none ──submit──▶ queued ──pick──▶ running ──ok──▶ processed
/// ```
///
/// Reprocessing is an operator action that resets the file; the daemons never
/// move a unit backwards on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HourState {
    None,
    Queued,
    Running,
    Processed,
}

impl HourState {
    /// Whether a submitter may promote this unit to `queued`.
    pub fn accepts_submit(self) -> bool {
        matches!(self, HourState::None | HourState::Processed)
    }

    /// Whether a worker may pick this unit up.
    pub fn accepts_pick(self) -> bool {
        matches!(self, HourState::Queued)
    }

    /// Whether the unit is owned by the job engine right now.
    pub fn is_active(self) -> bool {
        matches!(self, HourState::Queued | HourState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HourState::None => "none",
            HourState::Queued => "queued",
            HourState::Running => "running",
            HourState::Processed => "processed",
        }
    }
}

impl fmt::Display for HourState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown hour state: {0:?}")]
pub struct UnknownState(pub String);

impl FromStr for HourState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(HourState::None),
            "queued" => Ok(HourState::Queued),
            "running" => Ok(HourState::Running),
            "processed" => Ok(HourState::Processed),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
