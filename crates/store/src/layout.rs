// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spool directory layout.
//!
//! All four roots must live on one filesystem: every hand-off in the
//! pipeline is a `rename()`, and that is only atomic within a filesystem.

use rx_core::Ident;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("failed to create {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not on the same filesystem as the incoming spool", .0.display())]
    SplitFilesystem(PathBuf),
}

/// The four spool roots and the paths derived from them.
#[derive(Debug, Clone)]
pub struct Layout {
    pub incoming: PathBuf,
    pub savedir: PathBuf,
    pub workdir: PathBuf,
    pub jobqueue: PathBuf,
}

impl Layout {
    /// Create all roots (and the stale area), then verify they share a
    /// filesystem.
    pub fn ensure(&self) -> Result<(), LayoutError> {
        for dir in [
            &self.incoming,
            &self.savedir,
            &self.workdir,
            &self.jobqueue,
            &self.stale_dir(),
        ] {
            std::fs::create_dir_all(dir).map_err(|source| LayoutError::Create {
                path: dir.clone(),
                source,
            })?;
        }
        self.check_same_filesystem()
    }

    #[cfg(unix)]
    fn check_same_filesystem(&self) -> Result<(), LayoutError> {
        use std::os::unix::fs::MetadataExt;

        let dev_of = |path: &PathBuf| -> Result<u64, LayoutError> {
            std::fs::metadata(path)
                .map(|m| m.dev())
                .map_err(|source| LayoutError::Stat {
                    path: path.clone(),
                    source,
                })
        };
        let incoming_dev = dev_of(&self.incoming)?;
        for dir in [&self.savedir, &self.workdir, &self.jobqueue] {
            if dev_of(dir)? != incoming_dev {
                return Err(LayoutError::SplitFilesystem(dir.clone()));
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn check_same_filesystem(&self) -> Result<(), LayoutError> {
        Ok(())
    }

    /// Where unrecognized or unknown-site uploads are parked.
    pub fn stale_dir(&self) -> PathBuf {
        self.savedir.join("stale")
    }

    /// Archival home of an inbound file: `SAVEDIR/<site>/<year>/<doy>/`.
    pub fn save_dir(&self, site: &str, year: u16, doy: u16) -> PathBuf {
        self.savedir
            .join(site)
            .join(format!("{year:04}"))
            .join(format!("{doy:03}"))
    }

    /// Working home of a station day: `WORKDIR/<site>/<year>/<doy>/`.
    pub fn work_dir(&self, site: &str, year: u16, doy: u16) -> PathBuf {
        self.workdir
            .join(site)
            .join(format!("{year:04}"))
            .join(format!("{doy:03}"))
    }

    pub fn work_dir_for(&self, ident: &Ident) -> PathBuf {
        self.work_dir(&ident.site, ident.year, ident.doy)
    }

    /// Transient staging area for one hour's decode.
    pub fn unpack_dir(&self, ident: &Ident) -> PathBuf {
        self.work_dir_for(ident)
            .join(format!("unpack.{}", ident.hour))
    }

    /// Per-hour state file.
    pub fn state_path(&self, ident: &Ident) -> PathBuf {
        self.work_dir_for(ident)
            .join(format!("state.{}", ident.hour))
    }

    /// Persisted RINEX Set for one hour.
    pub fn rs_path(&self, ident: &Ident) -> PathBuf {
        self.work_dir_for(ident).join(format!("rs.{}.json", ident.hour))
    }

    /// Operator marker requesting a forced day job.
    pub fn force_complete_marker(&self, site: &str, year: u16, doy: u16) -> PathBuf {
        self.work_dir(site, year, doy).join("force-complete")
    }
}

/// Move a file across directories on the same filesystem, creating the
/// destination directory first.
pub fn rename_into(src: &Path, dest_dir: &Path, file_name: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(file_name);
    std::fs::rename(src, &dest)?;
    Ok(dest)
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
