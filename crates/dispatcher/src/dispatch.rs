// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound dispatch.
//!
//! Every file surfacing in `INCOMING` is parsed, resolved against the site
//! catalog, archived under `SAVEDIR/<site>/<year>/<doy>/` and handed to the
//! unpack pool. Unrecognized or unknown-site files are parked in the stale
//! area; days already summarized in the ledger refuse new work until the
//! operator runs `forget`.

use crate::unpack::UnpackRequest;
use rx_adapters::{scan_aged, SiteCatalog, SiteRecord, SummaryLedger};
use rx_core::UploadName;
use rx_store::{rename_into, Layout};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// What became of one inbound file (returned for tests and rescan logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Archived and handed to the unpack pool.
    Enqueued,
    /// Moved to `SAVEDIR/stale/`.
    Stale,
    /// Day already summarized; file archived but no work enqueued.
    AlreadyProcessed,
    /// Transient condition (file vanished, channel closed); nothing done.
    Skipped,
}

pub struct Dispatcher {
    pub layout: Layout,
    pub catalog: SiteCatalog,
    pub ledger: SummaryLedger,
    pub unpack_tx: mpsc::UnboundedSender<UnpackRequest>,
}

impl Dispatcher {
    /// Dispatch one inbound file.
    pub fn dispatch_file(&self, path: &Path) -> DispatchOutcome {
        if !path.is_file() {
            return DispatchOutcome::Skipped;
        }
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let name: UploadName = match basename.parse() {
            Ok(name) => name,
            Err(e) => {
                warn!(file = basename, error = %e, "unrecognized upload; moving to stale");
                return self.move_to_stale(path, &basename);
            }
        };

        let record = match self.resolve_site(&name) {
            Some(record) => record,
            None => {
                warn!(file = basename, site4 = name.site4, "unknown site; moving to stale");
                return self.move_to_stale(path, &basename);
            }
        };

        let save_dir = self.layout.save_dir(&record.site, name.year, name.doy);
        let saved_path = match rename_into(path, &save_dir, &basename) {
            Ok(dest) => dest,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(file = basename, "inbound file vanished before archiving");
                return DispatchOutcome::Skipped;
            }
            Err(e) => {
                error!(file = basename, error = %e, "cannot archive inbound file");
                return DispatchOutcome::Skipped;
            }
        };

        let work_dir = self.layout.work_dir(&record.site, name.year, name.doy);
        if !work_dir.exists() {
            match self.ledger.day_processed(&record.site, name.year, name.doy) {
                Ok(true) => {
                    error!(
                        site = record.site,
                        year = name.year,
                        doy = name.doy,
                        "day already processed; run forget before resubmitting"
                    );
                    return DispatchOutcome::AlreadyProcessed;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(error = %e, "ledger lookup failed; not enqueueing");
                    return DispatchOutcome::Skipped;
                }
            }
            if let Err(e) = std::fs::create_dir_all(&work_dir) {
                error!(dir = %work_dir.display(), error = %e, "cannot create work directory");
                return DispatchOutcome::Skipped;
            }
        }

        let interval = name.interval.unwrap_or(record.interval);
        let request = UnpackRequest {
            saved_path,
            name,
            site: record.site.clone(),
            interval,
        };
        if self.unpack_tx.send(request).is_err() {
            warn!(file = basename, "unpack pool gone; file stays archived");
            return DispatchOutcome::Skipped;
        }
        info!(file = basename, site = record.site, "inbound file dispatched");
        DispatchOutcome::Enqueued
    }

    /// Fallback sweep of the inbound spool for files the watcher missed.
    pub fn rescan(&self, min_age: Duration) {
        let files = match scan_aged(&self.layout.incoming, min_age) {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "inbound rescan failed");
                return;
            }
        };
        if files.is_empty() {
            return;
        }
        info!(count = files.len(), "rescan picked up inbound files");
        for file in files {
            self.dispatch_file(&file);
        }
    }

    /// Authoritative 4→9 mapping: long names must match the catalog record,
    /// short names resolve through it, unknown sites fail closed.
    fn resolve_site(&self, name: &UploadName) -> Option<SiteRecord> {
        match &name.site9 {
            Some(site9) => self.catalog.verify_long(site9),
            None => self.catalog.lookup(&name.site4),
        }
    }

    fn move_to_stale(&self, path: &Path, basename: &str) -> DispatchOutcome {
        match rename_into(path, &self.layout.stale_dir(), basename) {
            Ok(_) => DispatchOutcome::Stale,
            Err(e) => {
                error!(file = basename, error = %e, "cannot move file to stale");
                DispatchOutcome::Skipped
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
