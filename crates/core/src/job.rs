// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job descriptors, as written into the job-queue spool.

use crate::ident::{Hour, Ident, IdentError};
use crate::rinex_set::RinexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of downstream processing a job requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Ship an hour's (or day's) files to the uploader.
    Ftp,
    /// Aggregate processed hours into the whole-day product.
    Hour2Daily,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Ftp => write!(f, "ftp"),
            JobKind::Hour2Daily => write!(f, "hour2daily"),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("set has no interval; cannot build a job")]
    NoInterval,
    #[error(transparent)]
    Ident(#[from] IdentError),
    #[error("invalid job JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A unit of work handed to the job engine through the queue spool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub site: String,
    pub year: u16,
    pub doy: u16,
    pub hour: Hour,
    /// Observation sampling period in seconds.
    pub interval: u16,
    pub kind: JobKind,
    /// Path to the persisted `rs.<hour>.json` for this unit.
    pub rsfile: PathBuf,
    /// Set on operator-forced day jobs running with partial data.
    #[serde(default, skip_serializing_if = "is_false")]
    pub force_complete: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl JobSpec {
    /// Build the hourly submission job for a promoted set.
    pub fn for_set(set: &RinexSet, rsfile: PathBuf) -> Result<Self, JobError> {
        let ident = set.ident()?;
        Ok(Self {
            site: ident.site,
            year: ident.year,
            doy: ident.doy,
            hour: ident.hour,
            interval: set.interval.ok_or(JobError::NoInterval)?,
            kind: JobKind::Ftp,
            rsfile,
            force_complete: false,
        })
    }

    /// Build a forced day-aggregation job.
    pub fn forced_day(ident: &Ident, interval: u16, rsfile: PathBuf) -> Self {
        Self {
            site: ident.site.clone(),
            year: ident.year,
            doy: ident.doy,
            hour: Hour::Day,
            interval,
            kind: JobKind::Hour2Daily,
            rsfile,
            force_complete: true,
        }
    }

    pub fn ident(&self) -> Result<Ident, IdentError> {
        Ident::new(self.site.clone(), self.year, self.doy, self.hour)
    }

    pub fn to_json(&self) -> Result<String, JobError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self, JobError> {
        Ok(serde_json::from_str(data)?)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
