// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spool directory watcher.
//!
//! Bridges `notify` create/move-in events into a tokio channel, and provides
//! the age gate that keeps us from grabbing files the uploader is still
//! finishing: an event only becomes actionable once its path has been quiet
//! for the configured minimum age.

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// A live watch on one spool directory.
///
/// Dropping this stops the underlying watcher; the engine drops and re-arms
/// it around pool restarts.
pub struct SpoolWatcher {
    _watcher: RecommendedWatcher,
    pub rx: mpsc::Receiver<PathBuf>,
}

/// Watch a directory for newly arrived files (creates and moves-in).
pub fn watch_dir(dir: &Path) -> Result<SpoolWatcher, notify::Error> {
    let (tx, rx) = mpsc::channel(256);
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
        let Ok(event) = res else { return };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }
        for path in event.paths {
            // Queue full means a rescan will pick the file up; don't block
            // the notify thread.
            let _ = tx.try_send(path);
        }
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(SpoolWatcher {
        _watcher: watcher,
        rx,
    })
}

/// Duplicate-suppressing age gate over watcher events.
///
/// Events collapse per absolute path, keeping only the last-seen instant.
/// `drain_ready` releases paths that have been quiet for the minimum age.
#[derive(Debug, Default)]
pub struct EventGate {
    seen: HashMap<PathBuf, Instant>,
}

impl EventGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event for `path`, collapsing duplicates.
    pub fn note(&mut self, path: PathBuf) {
        self.seen.insert(path, Instant::now());
    }

    /// Release paths quiet for at least `min_age`, removing them from the map.
    pub fn drain_ready(&mut self, min_age: Duration) -> Vec<PathBuf> {
        let now = Instant::now();
        let ready: Vec<PathBuf> = self
            .seen
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) >= min_age)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.seen.remove(path);
        }
        ready
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

/// List regular files in `dir` whose mtime is at least `min_age` old.
/// Used by the periodic rescan fallback.
pub fn scan_aged(dir: &Path, min_age: Duration) -> std::io::Result<Vec<PathBuf>> {
    let now = std::time::SystemTime::now();
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
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
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
