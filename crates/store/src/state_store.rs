// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-hour state files under advisory locks.
//!
//! The state file on disk is the cross-process truth: operators run one-shot
//! utilities against the same spool, so every read-modify-write holds an
//! exclusive `flock` on the file. Within a process an additional mutex table
//! keyed by ident keeps our own tasks from contending on the file lock.

use crate::layout::Layout;
use fs2::FileExt;
use rx_core::{HourState, Ident};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("state lock busy for {0}")]
    Busy(String),
    #[error("corrupt state file {}: {word:?}", .path.display())]
    Corrupt { path: PathBuf, word: String },
}

/// Store of `state.<hour>` files beneath a [`Layout`].
pub struct StateStore {
    layout: Layout,
    local: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StateStore {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            local: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    fn local_handle(&self, ident: &Ident) -> Arc<AsyncMutex<()>> {
        let mut map = self.local.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(ident.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquire the exclusive lock for one hour's state.
    ///
    /// Blocks on the in-process mutex, then takes the file lock without
    /// blocking: a busy file lock means another process owns the unit right
    /// now, which callers treat like an illegal state and retry later.
    pub async fn lock(&self, ident: &Ident) -> Result<HourLock, StateError> {
        let guard = self.local_handle(ident).lock_owned().await;
        let path = self.layout.state_path(ident);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: path.clone(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| StateError::Io {
                path: path.clone(),
                source,
            })?;
        file.try_lock_exclusive()
            .map_err(|_| StateError::Busy(ident.to_string()))?;
        Ok(HourLock {
            path,
            file,
            _local: guard,
        })
    }

    /// Read a unit's state without taking its lock. A missing or empty file
    /// reads as `none`.
    pub fn peek(&self, ident: &Ident) -> Result<HourState, StateError> {
        let path = self.layout.state_path(ident);
        match std::fs::read_to_string(&path) {
            Ok(data) => parse_state(&path, &data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HourState::None),
            Err(source) => Err(StateError::Io { path, source }),
        }
    }
}

fn parse_state(path: &PathBuf, data: &str) -> Result<HourState, StateError> {
    let word = data.trim();
    if word.is_empty() {
        return Ok(HourState::None);
    }
    word.parse().map_err(|_| StateError::Corrupt {
        path: path.clone(),
        word: word.to_string(),
    })
}

/// Exclusive hold on one hour's state file. The file lock and the in-process
/// mutex are both released on drop.
pub struct HourLock {
    path: PathBuf,
    file: File,
    _local: OwnedMutexGuard<()>,
}

impl HourLock {
    /// Read the current state under the lock.
    pub fn state(&self) -> Result<HourState, StateError> {
        use std::io::Seek;
        let mut data = String::new();
        let mut file = &self.file;
        file.seek(std::io::SeekFrom::Start(0))
            .and_then(|_| file.read_to_string(&mut data))
            .map_err(|source| StateError::Io {
                path: self.path.clone(),
                source,
            })?;
        parse_state(&self.path, &data)
    }

    /// Write a new state under the lock.
    ///
    /// Writes in place rather than rename-swapping: a rename would replace
    /// the inode the advisory lock lives on.
    pub fn set(&self, state: HourState) -> Result<(), StateError> {
        use std::io::{Seek, Write};
        let mut file = &self.file;
        file.seek(std::io::SeekFrom::Start(0))
            .and_then(|_| file.set_len(0))
            .and_then(|_| writeln!(file, "{state}"))
            .and_then(|_| file.flush())
            .map_err(|source| StateError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

impl Drop for HourLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
#[path = "state_store_tests.rs"]
mod tests;
