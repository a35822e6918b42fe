// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job-queue spool.
//!
//! Producers (dispatcher, aggregator, admin tooling) drop one file per job;
//! the engine reads a file's body, hands it to the pool, then unlinks it.
//! Files whose name ends in `command` carry admin command text instead of
//! job JSON.

use rx_core::JobSpec;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode job: {0}")]
    Encode(#[from] rx_core::JobError),
}

/// One spool entry, read but not yet consumed.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub path: PathBuf,
    pub name: String,
    pub body: String,
}

impl QueueEntry {
    /// Admin command files end in `command`; everything else is job JSON.
    pub fn is_command(&self) -> bool {
        self.name.ends_with("command")
    }
}

/// Handle on the `JOBQUEUE/` spool directory.
#[derive(Debug, Clone)]
pub struct JobQueue {
    dir: PathBuf,
}

impl JobQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Emit a job file named after its ident, atomically (temp + rename).
    pub fn emit(&self, job: &JobSpec) -> Result<PathBuf, QueueError> {
        let ident = job
            .ident()
            .map_err(rx_core::JobError::from)?
            .to_string();
        let body = job.to_json()?;
        let tmp = self.dir.join(format!(".{ident}.tmp"));
        let dest = self.dir.join(&ident);
        std::fs::write(&tmp, body.as_bytes()).map_err(|source| QueueError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &dest).map_err(|source| QueueError::Io {
            path: dest.clone(),
            source,
        })?;
        Ok(dest)
    }

    /// Read one spool file. The caller consumes it with [`JobQueue::consume`]
    /// after the body has been handed off.
    pub fn read_entry(&self, path: &Path) -> Result<QueueEntry, QueueError> {
        let body = std::fs::read_to_string(path).map_err(|source| QueueError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(QueueEntry {
            path: path.to_path_buf(),
            name,
            body,
        })
    }

    /// Unlink a consumed spool file.
    pub fn consume(&self, entry: &QueueEntry) -> Result<(), QueueError> {
        std::fs::remove_file(&entry.path).map_err(|source| QueueError::Io {
            path: entry.path.clone(),
            source,
        })
    }

    /// List regular spool files whose mtime is at least `min_age` old,
    /// skipping dotfiles (in-flight temp names).
    pub fn files_older_than(&self, min_age: Duration) -> Result<Vec<PathBuf>, QueueError> {
        let now = SystemTime::now();
        let mut out = Vec::new();
        let entries = std::fs::read_dir(&self.dir).map_err(|source| QueueError::Io {
            path: self.dir.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let old_enough = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .is_some_and(|age| age >= min_age);
            if old_enough {
                out.push(path);
            }
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
#[path = "jobqueue_tests.rs"]
mod tests;
