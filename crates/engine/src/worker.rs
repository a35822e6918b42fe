// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-process entry point.
//!
//! Runs when `rxjobd` is invoked with `--worker`: reads one job payload per
//! stdin line, executes it, answers with one [`WorkerResult`] line on
//! stdout. Jobs have no timeout; the external processor runs as long as it
//! needs.

use crate::pool::{JobStatus, WorkerResult};
use rx_adapters::Config;
use rx_core::{HourState, JobKind, JobSpec};
use rx_store::StateStore;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{error, info};

/// Serve jobs from stdin until it closes.
pub async fn run_worker(config: &Config) -> anyhow::Result<()> {
    let store = StateStore::new(config.layout());
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!(pid = std::process::id(), "job worker ready");
    while let Some(line) = stdin.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let result = handle_job(&store, config, &line).await;
        let mut encoded = serde_json::to_string(&result)?;
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }
    info!("job worker stdin closed; exiting");
    Ok(())
}

/// Execute one job payload through the per-job state protocol.
pub async fn handle_job(store: &StateStore, config: &Config, payload: &str) -> WorkerResult {
    let job = match JobSpec::from_json(payload) {
        Ok(job) => job,
        Err(e) => {
            return WorkerResult {
                ident: "?".to_string(),
                status: JobStatus::Error,
                message: Some(format!("invalid job descriptor: {e}")),
            }
        }
    };
    let ident = match job.ident() {
        Ok(ident) => ident,
        Err(e) => {
            return WorkerResult {
                ident: "?".to_string(),
                status: JobStatus::Error,
                message: Some(format!("invalid job identity: {e}")),
            }
        }
    };
    let reply = |status: JobStatus, message: Option<String>| WorkerResult {
        ident: ident.to_string(),
        status,
        message,
    };

    let work_dir = store.layout().work_dir_for(&ident);
    if let Err(e) = std::env::set_current_dir(&work_dir) {
        return reply(
            JobStatus::Error,
            Some(format!("cannot enter work directory {}: {e}", work_dir.display())),
        );
    }

    // Pick up the unit: queued → running under the lock.
    {
        let lock = match store.lock(&ident).await {
            Ok(lock) => lock,
            Err(e) => return reply(JobStatus::Error, Some(format!("state lock: {e}"))),
        };
        match lock.state() {
            Ok(state) if state.accepts_pick() => {}
            Ok(state) => {
                return reply(
                    JobStatus::Error,
                    Some(format!("illegal state {state}, expected queued")),
                )
            }
            Err(e) => return reply(JobStatus::Error, Some(format!("state read: {e}"))),
        }
        if let Err(e) = lock.set(HourState::Running) {
            return reply(JobStatus::Error, Some(format!("state write: {e}")));
        }
    }

    // The boundary to external domain code. Any failure here is uncaught
    // as far as the engine is concerned: fatal, pool gets bounced.
    if let Err(message) = process(config, &job, payload).await {
        error!(ident = %ident, message, "job processing failed");
        return reply(JobStatus::Fatal, Some(message));
    }

    let lock = match store.lock(&ident).await {
        Ok(lock) => lock,
        Err(e) => return reply(JobStatus::Fatal, Some(format!("state lock after run: {e}"))),
    };
    if let Err(e) = lock.set(HourState::Processed) {
        return reply(JobStatus::Fatal, Some(format!("state write after run: {e}")));
    }
    info!(ident = %ident, kind = %job.kind, "job processed");
    reply(JobStatus::Ok, None)
}

/// Run the configured processor for the job's kind, feeding it the job JSON
/// on stdin. No timeout by design.
async fn process(config: &Config, job: &JobSpec, payload: &str) -> Result<(), String> {
    let argv = match job.kind {
        JobKind::Ftp => &config.engine.processor_ftp,
        JobKind::Hour2Daily => &config.engine.processor_hour2daily,
    };
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| format!("no processor configured for kind {}", job.kind))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("processor {program} failed to spawn: {e}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| format!("processor stdin: {e}"))?;
        // Close stdin so the processor sees EOF.
    }
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("processor wait: {e}"))?;
    if !output.status.success() {
        return Err(format!(
            "processor {program} exited with {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
