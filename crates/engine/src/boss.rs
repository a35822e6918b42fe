// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boss loop.
//!
//! Owns the job-queue spool and the worker pool: drains aged queue files,
//! tracks running idents for duplicate suppression, collects results, and
//! bounces the whole pool (after a long backoff) when a worker reports a
//! fatal failure. The backoff is deliberate: persistent fast-failing jobs
//! must not turn into a restart storm.

use crate::command::{self, CommandCtx};
use crate::pool::{JobStatus, PoolResult, WorkerPool};
use rx_adapters::{watch_dir, EventGate};
use rx_core::JobSpec;
use rx_store::{JobQueue, QueueEntry, StateStore};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

pub struct Boss {
    store: Arc<StateStore>,
    queue: JobQueue,
    instances: usize,
    fatal_backoff: Duration,
    worker_argv: Vec<String>,
    cmd: CommandCtx,
    running: HashSet<String>,
}

impl Boss {
    pub fn new(
        store: Arc<StateStore>,
        queue: JobQueue,
        instances: usize,
        fatal_backoff: Duration,
        uploader_reload: Vec<String>,
        worker_argv: Vec<String>,
    ) -> Self {
        let cmd = CommandCtx {
            store: store.clone(),
            queue: queue.clone(),
            uploader_reload,
        };
        Self {
            store,
            queue,
            instances,
            fatal_backoff,
            worker_argv,
            cmd,
            running: HashSet::new(),
        }
    }

    /// Run until SIGTERM/SIGINT. SIGHUP is swallowed: the engine has no
    /// catalog to reload.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sighup = signal(SignalKind::hangup())?;

        let mut pool = WorkerPool::start(self.instances, &self.worker_argv)?;
        info!(instances = self.instances, "worker pool started");

        'outer: loop {
            let mut watcher = watch_dir(self.queue.dir())?;
            let mut gate = EventGate::new();
            let mut drain_tick = tokio::time::interval(Duration::from_secs(1));
            drain_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut sweep_tick = tokio::time::interval(crate::env::sweep_interval());
            sweep_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut need_restart = false;
            loop {
                tokio::select! {
                    Some(path) = watcher.rx.recv() => {
                        gate.note(path);
                    }

                    _ = drain_tick.tick() => {
                        for path in gate.drain_ready(crate::env::queue_min_age()) {
                            self.take_file(&mut pool, &path).await;
                        }
                    }

                    Some(result) = pool.next_result() => {
                        if self.handle_result(result) {
                            need_restart = true;
                            break;
                        }
                    }

                    _ = sweep_tick.tick() => {
                        self.leftover_sweep(&mut pool).await;
                        self.forced_completion_scan().await;
                    }

                    _ = sighup.recv() => {
                        debug!("SIGHUP ignored");
                    }

                    _ = sigterm.recv() => {
                        info!("received SIGTERM, shutting down");
                        break 'outer;
                    }

                    _ = sigint.recv() => {
                        info!("received SIGINT, shutting down");
                        break 'outer;
                    }
                }
            }

            if need_restart {
                // Cancel the watch, tear the pool down, back off hard, then
                // rebuild through the startup constructor and re-arm.
                drop(watcher);
                let backlog = pool.drain_backlog();
                pool.shutdown().await;
                self.running.clear();
                warn!(
                    backoff_secs = self.fatal_backoff.as_secs(),
                    "fatal worker result; pool restarts after backoff"
                );
                tokio::time::sleep(self.fatal_backoff).await;
                pool = WorkerPool::start(self.instances, &self.worker_argv)?;
                info!(instances = self.instances, "worker pool restarted");
                for payload in backlog {
                    self.dispatch_job(&mut pool, &payload);
                }
            }
        }

        pool.shutdown().await;
        info!("job engine stopped");
        Ok(())
    }

    /// Consume one queue file: read, act on the body, then unlink.
    pub async fn take_file(&mut self, pool: &mut WorkerPool, path: &Path) {
        let entry = match self.queue.read_entry(path) {
            Ok(entry) => entry,
            Err(e) => {
                // Commonly a file another drain already consumed.
                debug!(path = %path.display(), error = %e, "queue file unreadable; skipped");
                return;
            }
        };
        self.act_on(pool, &entry).await;
        if let Err(e) = self.queue.consume(&entry) {
            warn!(path = %path.display(), error = %e, "cannot unlink queue file");
        }
    }

    async fn act_on(&mut self, pool: &mut WorkerPool, entry: &QueueEntry) {
        if entry.is_command() {
            for line in entry.body.lines().filter(|l| !l.trim().is_empty()) {
                command::execute(&self.cmd, line).await;
            }
        } else {
            self.dispatch_job(pool, &entry.body);
        }
    }

    /// Duplicate-suppressed hand-off to the pool.
    pub fn dispatch_job(&mut self, pool: &mut WorkerPool, body: &str) {
        let ident = match JobSpec::from_json(body).and_then(|job| Ok(job.ident()?)) {
            Ok(ident) => ident.to_string(),
            Err(e) => {
                error!(error = %e, "unusable job file dropped");
                return;
            }
        };
        if !self.running.insert(ident.clone()) {
            error!(ident, "duplicate job rejected; already running");
            return;
        }
        debug!(ident, "job dispatched to pool");
        pool.submit(body.to_string());
    }

    /// Returns true when the result demands a pool restart.
    pub fn handle_result(&mut self, result: PoolResult) -> bool {
        let PoolResult { worker, result } = result;
        if !self.running.remove(&result.ident) {
            debug!(ident = result.ident, "result for untracked ident");
        }
        match result.status {
            JobStatus::Ok => {
                info!(worker, ident = result.ident, "job ok");
                false
            }
            JobStatus::Error => {
                error!(
                    worker,
                    ident = result.ident,
                    message = result.message.as_deref().unwrap_or(""),
                    "job rejected"
                );
                false
            }
            JobStatus::Fatal => {
                error!(
                    worker,
                    ident = result.ident,
                    message = result.message.as_deref().unwrap_or(""),
                    "job fatal"
                );
                true
            }
        }
    }

    /// Re-enqueue queue files that sat unnoticed past the leftover age.
    /// Enqueues by content, so nothing depends on the watcher seeing the
    /// file again.
    pub async fn leftover_sweep(&mut self, pool: &mut WorkerPool) {
        let files = match self.queue.files_older_than(crate::env::leftover_age()) {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "leftover sweep failed");
                return;
            }
        };
        if files.is_empty() {
            return;
        }
        info!(count = files.len(), "leftover queue files re-enqueued");
        for path in files {
            self.take_file(pool, &path).await;
        }
    }

    /// Honor `force-complete` markers operators drop into work directories.
    pub async fn forced_completion_scan(&mut self) {
        for (site, year, doy, marker) in find_markers(&self.store) {
            if let Err(e) = std::fs::remove_file(&marker) {
                warn!(marker = %marker.display(), error = %e, "cannot remove marker");
                continue;
            }
            info!(site, year, doy, "force-complete marker found");
            command::force_complete(&self.cmd, &site, year, doy).await;
        }
    }
}

/// Walk `WORKDIR/<site>/<year>/<doy>/force-complete` markers.
fn find_markers(store: &StateStore) -> Vec<(String, u16, u16, std::path::PathBuf)> {
    let mut out = Vec::new();
    let workdir = &store.layout().workdir;
    let Ok(sites) = std::fs::read_dir(workdir) else {
        return out;
    };
    for site_entry in sites.flatten() {
        let site = site_entry.file_name().to_string_lossy().into_owned();
        let Ok(years) = std::fs::read_dir(site_entry.path()) else {
            continue;
        };
        for year_entry in years.flatten() {
            let Ok(year) = year_entry.file_name().to_string_lossy().parse::<u16>() else {
                continue;
            };
            let Ok(days) = std::fs::read_dir(year_entry.path()) else {
                continue;
            };
            for day_entry in days.flatten() {
                let Ok(doy) = day_entry.file_name().to_string_lossy().parse::<u16>() else {
                    continue;
                };
                let marker = day_entry.path().join("force-complete");
                if marker.is_file() {
                    out.push((site.clone(), year, doy, marker));
                }
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "boss_tests.rs"]
mod tests;
