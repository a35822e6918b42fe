// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-process pool.
//!
//! Each worker is an independent OS process so a crashing job cannot take
//! the boss down. The wire protocol is line-oriented JSON: the boss writes
//! one job payload per line to a worker's stdin and reads one
//! [`WorkerResult`] line from its stdout. A worker that exits without
//! answering is reported as `fatal` for the job it was running.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Outcome of one job, as reported by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Processed to completion.
    Ok,
    /// Rejected (bad descriptor, duplicate, illegal state). No state change.
    Error,
    /// Uncaught failure; the boss bounces the whole pool.
    Fatal,
}

/// One result line on the worker wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub ident: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A result tagged with the worker slot it came from.
#[derive(Debug, Clone)]
pub struct PoolResult {
    pub worker: usize,
    pub result: WorkerResult,
}

struct Slot {
    tx: mpsc::UnboundedSender<String>,
    busy: bool,
}

/// Boss-side handle on `I` worker processes.
///
/// Busy workers apply natural backpressure: submissions beyond capacity
/// queue boss-side and drain as results come back.
pub struct WorkerPool {
    slots: Vec<Slot>,
    result_rx: mpsc::UnboundedReceiver<PoolResult>,
    backlog: VecDeque<String>,
    drivers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `instances` worker processes running `worker_argv`.
    ///
    /// The restart path after a fatal result uses this same constructor.
    pub fn start(instances: usize, worker_argv: &[String]) -> std::io::Result<Self> {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let mut slots = Vec::new();
        let mut drivers = Vec::new();
        for worker in 0..instances.max(1) {
            let (tx, rx) = mpsc::unbounded_channel();
            let driver = spawn_worker(worker, worker_argv, rx, result_tx.clone())?;
            slots.push(Slot { tx, busy: false });
            drivers.push(driver);
        }
        Ok(Self {
            slots,
            result_rx,
            backlog: VecDeque::new(),
            drivers,
        })
    }

    /// Hand a job payload to an idle worker, or queue it boss-side.
    pub fn submit(&mut self, payload: String) {
        match self.slots.iter_mut().find(|slot| !slot.busy) {
            Some(slot) => {
                if slot.tx.send(payload).is_ok() {
                    slot.busy = true;
                } else {
                    warn!("worker channel closed; payload queued for restart");
                }
            }
            None => self.backlog.push_back(payload),
        }
    }

    /// Await the next result, freeing its slot and refilling from the
    /// backlog. Returns `None` when every driver is gone.
    pub async fn next_result(&mut self) -> Option<PoolResult> {
        let result = self.result_rx.recv().await?;
        if let Some(slot) = self.slots.get_mut(result.worker) {
            slot.busy = false;
        }
        if let Some(payload) = self.backlog.pop_front() {
            self.submit(payload);
        }
        Some(result)
    }

    pub fn busy_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.busy).count()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Unsubmitted payloads, recovered before a restart.
    pub fn drain_backlog(&mut self) -> Vec<String> {
        self.backlog.drain(..).collect()
    }

    /// Force-shutdown. Closing the payload channels ends idle drivers;
    /// busy ones are aborted outright, which drops (and thereby kills)
    /// their child process mid-job.
    pub async fn shutdown(mut self) {
        self.slots.clear();
        for driver in self.drivers.drain(..) {
            driver.abort();
            let _ = driver.await;
        }
    }
}

/// Spawn one worker process and the task that drives it.
fn spawn_worker(
    worker: usize,
    worker_argv: &[String],
    mut payload_rx: mpsc::UnboundedReceiver<String>,
    result_tx: mpsc::UnboundedSender<PoolResult>,
) -> std::io::Result<JoinHandle<()>> {
    let (program, args) = worker_argv
        .split_first()
        .ok_or_else(|| std::io::Error::other("empty worker argv"))?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    let mut stdin = child.stdin.take().ok_or_else(|| std::io::Error::other("no stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| std::io::Error::other("no stdout"))?;

    Ok(tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(payload) = payload_rx.recv().await {
            let ident = ident_of(&payload);
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                report_fatal(&result_tx, worker, &ident, &format!("worker stdin gone: {e}"));
                break;
            }
            if let Err(e) = stdin.write_all(b"\n").await {
                report_fatal(&result_tx, worker, &ident, &format!("worker stdin gone: {e}"));
                break;
            }
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let result = serde_json::from_str::<WorkerResult>(&line).unwrap_or_else(|e| {
                        WorkerResult {
                            ident: ident.clone(),
                            status: JobStatus::Fatal,
                            message: Some(format!("unparsable worker result: {e}")),
                        }
                    });
                    if result_tx.send(PoolResult { worker, result }).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    report_fatal(&result_tx, worker, &ident, "worker exited without a result");
                    break;
                }
                Err(e) => {
                    report_fatal(&result_tx, worker, &ident, &format!("worker read failed: {e}"));
                    break;
                }
            }
        }
        debug!(worker, "worker driver finished");
        if let Err(e) = child.kill().await {
            debug!(worker, error = %e, "worker already gone at kill");
        }
    }))
}

fn report_fatal(
    result_tx: &mpsc::UnboundedSender<PoolResult>,
    worker: usize,
    ident: &str,
    message: &str,
) {
    error!(worker, ident, message, "worker failure");
    let _ = result_tx.send(PoolResult {
        worker,
        result: WorkerResult {
            ident: ident.to_string(),
            status: JobStatus::Fatal,
            message: Some(message.to_string()),
        },
    });
}

/// Best-effort ident extraction for failure reports.
fn ident_of(payload: &str) -> String {
    rx_core::JobSpec::from_json(payload)
        .ok()
        .and_then(|job| job.ident().ok())
        .map(|ident| ident.to_string())
        .unwrap_or_else(|| "?".to_string())
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
