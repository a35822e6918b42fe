// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rx-core: Core types for the RINEX observation-spool pipeline.

pub mod clock;
pub mod filename;
pub mod ident;
pub mod job;
pub mod rinex_set;
pub mod state;

pub use clock::{Clock, FakeClock, SystemClock};
pub use filename::{FilenameError, UploadKind, UploadName};
pub use ident::{Hour, Ident, IdentError};
pub use job::{JobError, JobKind, JobSpec};
pub use rinex_set::{legacy_category, FileCategory, NavCode, RinexSet, SetError};
pub use state::{HourState, UnknownState};
