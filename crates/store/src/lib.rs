// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rx-store: On-disk spool layout, per-hour state store and job queue.

pub mod jobqueue;
pub mod layout;
pub mod state_store;

pub use jobqueue::{JobQueue, QueueEntry, QueueError};
pub use layout::{rename_into, Layout, LayoutError};
pub use state_store::{HourLock, StateError, StateStore};
