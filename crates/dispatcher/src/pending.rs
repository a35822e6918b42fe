// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending aggregator.
//!
//! A single task owns the map of in-flight RINEX Sets for multi-file
//! uploads. Unpack workers report each decoded file with a *pending-add*
//! message; a periodic tick evaluates every entry against the quiescence,
//! staleness and day-job rules and promotes the ones that are ready.

use rx_core::{Clock, HourState, Ident, JobSpec, RinexSet};
use rx_store::{JobQueue, StateError, StateStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Input to the aggregator task.
#[derive(Debug)]
pub enum PendingMsg {
    /// A decoded file landed in the unpack area of `ident`.
    Add {
        ident: Ident,
        /// Decoded file name inside the unpack directory.
        file: String,
        /// Originating inbound file name.
        orig: String,
    },
    /// Shutdown sentinel enqueued by the main loop.
    Exit,
}

/// What an evaluation pass decided for one set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep waiting; re-evaluate on the next tick.
    Postpone,
    /// Promoted and submitted to the job queue.
    Submitted,
    /// Removed without submission (stale, superseded or refused).
    Dropped,
}

pub struct PendingAggregator<C: Clock> {
    store: Arc<StateStore>,
    queue: JobQueue,
    clock: C,
    pending: HashMap<String, RinexSet>,
}

impl<C: Clock> PendingAggregator<C> {
    pub fn new(store: Arc<StateStore>, queue: JobQueue, clock: C) -> Self {
        Self {
            store,
            queue,
            clock,
            pending: HashMap::new(),
        }
    }

    /// Run until the `Exit` sentinel (or channel close).
    pub async fn run(mut self, mut rx: mpsc::Receiver<PendingMsg>) {
        let mut tick = tokio::time::interval(crate::env::pending_tick());
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(PendingMsg::Add { ident, file, orig }) => self.add(ident, file, orig),
                    Some(PendingMsg::Exit) | None => break,
                },
                _ = tick.tick() => self.evaluate_all().await,
            }
        }
        if !self.pending.is_empty() {
            info!(count = self.pending.len(), "leaving pending sets behind on shutdown");
        }
    }

    /// Number of sets currently pending.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Attach one decoded file to its pending set, creating the set or
    /// reloading a persisted one (late arrival) as needed.
    pub fn add(&mut self, ident: Ident, file: String, orig: String) {
        let now = self.clock.epoch_secs();
        let key = ident.to_string();
        if !self.pending.contains_key(&key) {
            let rs_path = self.store.layout().rs_path(&ident);
            let set = if rs_path.exists() {
                match RinexSet::load(&rs_path) {
                    Ok(mut loaded) => {
                        debug!(ident = %key, "late arrival; reloaded persisted set");
                        loaded.touch(now);
                        loaded
                    }
                    Err(e) => {
                        warn!(ident = %key, error = %e, "unreadable persisted set; starting fresh");
                        RinexSet::new(&ident, now)
                    }
                }
            } else {
                RinexSet::new(&ident, now)
            };
            self.pending.insert(key.clone(), set);
        }
        let Some(set) = self.pending.get_mut(&key) else {
            return;
        };
        match set.attach(&file, now) {
            Ok(category) => debug!(ident = %key, file, ?category, "attached pending file"),
            Err(e) => {
                warn!(ident = %key, file, error = %e, "file fits no slot; ignored");
                return;
            }
        }
        set.push_orig(orig);
    }

    /// Evaluate every pending set, removing the ones that settled.
    pub async fn evaluate_all(&mut self) {
        let keys: Vec<String> = self.pending.keys().cloned().collect();
        for key in keys {
            let Some(mut set) = self.pending.remove(&key) else {
                continue;
            };
            match self.evaluate(&mut set).await {
                Verdict::Postpone => {
                    self.pending.insert(key, set);
                }
                Verdict::Submitted | Verdict::Dropped => {}
            }
        }
    }

    /// Apply the gather-and-wait rules to one set.
    pub async fn evaluate(&self, set: &mut RinexSet) -> Verdict {
        let now = self.clock.epoch_secs();
        let ident = match set.ident() {
            Ok(ident) => ident,
            Err(e) => {
                warn!(error = %e, "pending set with broken identity; dropped");
                return Verdict::Dropped;
            }
        };

        if !set.is_submittable() && !set.is_complete() {
            if set.created_age(now) > crate::env::stale_pending_age() {
                warn!(ident = %ident, age = set.created_age(now), "stale pending job; discarding");
                return Verdict::Dropped;
            }
            return Verdict::Postpone;
        }

        // Completeness short-circuits the quiet window.
        if !set.is_complete() && set.quiet_for(now) < crate::env::quiescence_window() {
            return Verdict::Postpone;
        }

        if self.upload_still_arriving(set) {
            debug!(ident = %ident, "matching file still in the inbound spool; waiting");
            set.touch(now);
            return Verdict::Postpone;
        }

        if !ident.is_day() {
            match self.store.peek(&ident.day()) {
                Ok(state) if state.is_active() => {
                    warn!(ident = %ident, day_state = %state,
                        "day job already underway; dropping hour (reprocess to redo)");
                    return Verdict::Dropped;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(ident = %ident, error = %e, "cannot read day state; postponing");
                    return Verdict::Postpone;
                }
            }
        }

        self.submit(set, &ident).await
    }

    /// Any file with the set's canonical prefix still sitting in `INCOMING`
    /// means the uploader is not done with this hour.
    fn upload_still_arriving(&self, set: &RinexSet) -> bool {
        let prefix = set.prefix();
        let Ok(entries) = std::fs::read_dir(&self.store.layout().incoming) else {
            return false;
        };
        entries
            .flatten()
            .any(|e| e.file_name().to_string_lossy().starts_with(&prefix))
    }

    /// Promote the unpack directory into the work directory and queue the
    /// hour's job, all under the state lock.
    async fn submit(&self, set: &mut RinexSet, ident: &Ident) -> Verdict {
        let lock = match self.store.lock(ident).await {
            Ok(lock) => lock,
            Err(StateError::Busy(_)) => {
                debug!(ident = %ident, "state lock busy; retrying next tick");
                return Verdict::Postpone;
            }
            Err(e) => {
                warn!(ident = %ident, error = %e, "state lock failed; retrying next tick");
                return Verdict::Postpone;
            }
        };
        let state = match lock.state() {
            Ok(state) => state,
            Err(e) => {
                warn!(ident = %ident, error = %e, "unreadable state; retrying next tick");
                return Verdict::Postpone;
            }
        };
        if !state.accepts_submit() {
            warn!(ident = %ident, %state, "hour not submittable in this state; dropped");
            return Verdict::Dropped;
        }

        let layout = self.store.layout();
        if let Err(e) = promote_unpack(&layout.unpack_dir(ident), &layout.work_dir_for(ident)) {
            warn!(ident = %ident, error = %e, "promotion failed; retrying next tick");
            return Verdict::Postpone;
        }

        let rs_path = layout.rs_path(ident);
        if let Err(e) = set.save(&rs_path) {
            warn!(ident = %ident, error = %e, "cannot persist set; retrying next tick");
            return Verdict::Postpone;
        }
        let job = match JobSpec::for_set(set, rs_path) {
            Ok(job) => job,
            Err(e) => {
                warn!(ident = %ident, error = %e, "set not job-ready; retrying next tick");
                return Verdict::Postpone;
            }
        };
        if let Err(e) = lock.set(HourState::Queued) {
            warn!(ident = %ident, error = %e, "cannot write queued state");
            return Verdict::Postpone;
        }
        match self.queue.emit(&job) {
            Ok(path) => {
                info!(ident = %ident, job = %path.display(), "hour submitted");
                Verdict::Submitted
            }
            Err(e) => {
                // State already says queued but no job file exists; only a
                // reprocess gets this hour moving again.
                tracing::error!(ident = %ident, error = %e, "job emit failed after queueing state");
                Verdict::Dropped
            }
        }
    }
}

/// Move every entry of `unpack/` into the work directory, then remove the
/// now-empty staging directory.
pub fn promote_unpack(unpack_dir: &std::path::Path, work_dir: &std::path::Path) -> std::io::Result<()> {
    if !unpack_dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(work_dir)?;
    for entry in std::fs::read_dir(unpack_dir)?.flatten() {
        let dest = work_dir.join(entry.file_name());
        std::fs::rename(entry.path(), dest)?;
    }
    std::fs::remove_dir(unpack_dir)?;
    Ok(())
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
