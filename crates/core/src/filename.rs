// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound filename recognition.
//!
//! Receivers upload four filename dialects. Matching is case-insensitive;
//! anything that matches no dialect is routed to the stale area by the
//! dispatcher.
//!
//! 1. Long RINEX v3: `SSSSSSSSS_R_YYYYDDDHHMM_NNH_NNS_MO.rnx(.gz)?`
//!    (navigation files omit the `_NNS` sampling field). Period `D` forces
//!    the day slot.
//! 2. Legacy short: `SSSSDDDH.YYt` with type letter `t` in `o n g l f q`.
//!    Hour `'0'` is the 24-hour (daily) convention.
//! 3. Trimble zip: `SSSSYYYYMMDDHHMMS.zip` (trailing session letter).
//! 4. Leica zip: `SSSSDDDH[MM].YYs.zip`.

use crate::ident::Hour;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which decode path an upload takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Gzipped long-form RINEX v3, one product per file.
    SeptentrioRnx3,
    /// Raw SBF upload under a legacy short name; needs sbf2rin.
    SeptentrioRaw,
    /// Trimble receiver zip archive.
    TrimbleZip,
    /// Leica receiver zip archive.
    LeicaZip,
}

impl UploadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadKind::SeptentrioRnx3 => "septentrio-rnx3",
            UploadKind::SeptentrioRaw => "septentrio-raw",
            UploadKind::TrimbleZip => "trimble-zip",
            UploadKind::LeicaZip => "leica-zip",
        }
    }

    /// Zip archives and raw uploads carry a whole hour in one file.
    pub fn is_single_file(self) -> bool {
        !matches!(self, UploadKind::SeptentrioRnx3)
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a basename was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("filename matches no known dialect")]
    Unrecognized,
    #[error("minute field {0:02} is unsupported")]
    NonZeroMinutes(u8),
    #[error("filename carries an invalid calendar date")]
    BadDate,
}

/// Structured view of a recognized inbound filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadName {
    /// Station short name, uppercase.
    pub site4: String,
    /// Full 9-character site name when the dialect carries one.
    pub site9: Option<String>,
    pub year: u16,
    pub doy: u16,
    pub hour: Hour,
    pub hh: u8,
    pub mi: u8,
    pub kind: UploadKind,
    /// Observation sampling period in seconds, when the name carries one.
    pub interval: Option<u16>,
}

static LONG_RNX3: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([A-Z0-9]{9})_R_(\d{4})(\d{3})(\d{2})(\d{2})_\d{2}([HD])(?:_(\d{2})S)?_[A-Z]{2}\.RNX(?:\.GZ)?$",
    )
    .expect("long rnx3 pattern")
});

static LEGACY_SHORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z0-9]{4})(\d{3})([A-X0])\.(\d{2})[ONGLFQ]$").expect("legacy short pattern")
});

static TRIMBLE_ZIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z0-9]{4})(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})[A-Z]\.ZIP$")
        .expect("trimble zip pattern")
});

static LEICA_ZIP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z0-9]{4})(\d{3})([A-X0])(\d{2})?\.(\d{2})[A-Z]\.ZIP$")
        .expect("leica zip pattern")
});

/// Two-digit years `>= 80` belong to the 1900s.
fn expand_year(yy: u16) -> u16 {
    if yy >= 80 {
        1900 + yy
    } else {
        2000 + yy
    }
}

fn check_doy(doy: u16) -> Result<u16, FilenameError> {
    if (1..=366).contains(&doy) {
        Ok(doy)
    } else {
        Err(FilenameError::BadDate)
    }
}

impl FromStr for UploadName {
    type Err = FilenameError;

    fn from_str(basename: &str) -> Result<Self, Self::Err> {
        let name = basename.to_uppercase();

        if let Some(caps) = LONG_RNX3.captures(&name) {
            let site9 = caps[1].to_string();
            let hh: u8 = caps[4].parse().map_err(|_| FilenameError::Unrecognized)?;
            let mi: u8 = caps[5].parse().map_err(|_| FilenameError::Unrecognized)?;
            if mi != 0 {
                return Err(FilenameError::NonZeroMinutes(mi));
            }
            let hour = match &caps[6] {
                "D" => Hour::Day,
                _ => Hour::from_hh(hh).ok_or(FilenameError::BadDate)?,
            };
            return Ok(UploadName {
                site4: site9[..4].to_string(),
                site9: Some(site9),
                year: caps[2].parse().map_err(|_| FilenameError::Unrecognized)?,
                doy: check_doy(caps[3].parse().map_err(|_| FilenameError::Unrecognized)?)?,
                hour,
                hh,
                mi,
                kind: UploadKind::SeptentrioRnx3,
                interval: caps.get(7).map(|m| m.as_str().parse()).transpose().map_err(
                    |_| FilenameError::Unrecognized,
                )?,
            });
        }

        if let Some(caps) = LEGACY_SHORT.captures(&name) {
            let hour_char = caps[3].chars().next().ok_or(FilenameError::Unrecognized)?;
            let hour =
                Hour::from_letter(hour_char.to_ascii_lowercase()).ok_or(FilenameError::Unrecognized)?;
            return Ok(UploadName {
                site4: caps[1].to_string(),
                site9: None,
                year: expand_year(caps[4].parse().map_err(|_| FilenameError::Unrecognized)?),
                doy: check_doy(caps[2].parse().map_err(|_| FilenameError::Unrecognized)?)?,
                hour,
                hh: match hour {
                    Hour::Of(h) => h,
                    Hour::Day => 24,
                },
                mi: 0,
                kind: UploadKind::SeptentrioRaw,
                interval: None,
            });
        }

        if let Some(caps) = TRIMBLE_ZIP.captures(&name) {
            let year: u16 = caps[2].parse().map_err(|_| FilenameError::Unrecognized)?;
            let month: u32 = caps[3].parse().map_err(|_| FilenameError::Unrecognized)?;
            let day: u32 = caps[4].parse().map_err(|_| FilenameError::Unrecognized)?;
            let hh: u8 = caps[5].parse().map_err(|_| FilenameError::Unrecognized)?;
            let mi: u8 = caps[6].parse().map_err(|_| FilenameError::Unrecognized)?;
            if mi != 0 {
                return Err(FilenameError::NonZeroMinutes(mi));
            }
            let date = NaiveDate::from_ymd_opt(year as i32, month, day)
                .ok_or(FilenameError::BadDate)?;
            return Ok(UploadName {
                site4: caps[1].to_string(),
                site9: None,
                year,
                doy: date.ordinal() as u16,
                hour: Hour::from_hh(hh).ok_or(FilenameError::BadDate)?,
                hh,
                mi,
                kind: UploadKind::TrimbleZip,
                interval: None,
            });
        }

        if let Some(caps) = LEICA_ZIP.captures(&name) {
            if let Some(m) = caps.get(4) {
                let mi: u8 = m.as_str().parse().map_err(|_| FilenameError::Unrecognized)?;
                if mi != 0 {
                    return Err(FilenameError::NonZeroMinutes(mi));
                }
            }
            let hour_char = caps[3].chars().next().ok_or(FilenameError::Unrecognized)?;
            let hour =
                Hour::from_letter(hour_char.to_ascii_lowercase()).ok_or(FilenameError::Unrecognized)?;
            return Ok(UploadName {
                site4: caps[1].to_string(),
                site9: None,
                year: expand_year(caps[5].parse().map_err(|_| FilenameError::Unrecognized)?),
                doy: check_doy(caps[2].parse().map_err(|_| FilenameError::Unrecognized)?)?,
                hour,
                hh: match hour {
                    Hour::Of(h) => h,
                    Hour::Day => 24,
                },
                mi: 0,
                kind: UploadKind::LeicaZip,
                interval: None,
            });
        }

        Err(FilenameError::Unrecognized)
    }
}

#[cfg(test)]
#[path = "filename_tests.rs"]
mod tests;
