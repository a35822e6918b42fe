// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The RINEX Set: one hour's collected files for one station's day.
//!
//! A set accumulates the mixed-observation file plus navigation files as
//! uploads arrive. It is *submittable* once it holds at least one observation
//! and one navigation file; it is *complete* once the mixed-navigation file
//! is present, which short-circuits all further waiting.

use crate::ident::{Hour, Ident, IdentError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Navigation file categories, by constellation letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NavCode {
    Gps,
    Glonass,
    Galileo,
    BeiDou,
    Qzss,
    Irnss,
    Sbas,
    /// Mixed navigation; its presence makes a set complete.
    Mixed,
}

impl NavCode {
    /// Two-letter file type code, e.g. `GN` or `MN`.
    pub fn code(self) -> &'static str {
        match self {
            NavCode::Gps => "GN",
            NavCode::Glonass => "RN",
            NavCode::Galileo => "EN",
            NavCode::BeiDou => "CN",
            NavCode::Qzss => "JN",
            NavCode::Irnss => "IN",
            NavCode::Sbas => "SN",
            NavCode::Mixed => "MN",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "GN" => Some(NavCode::Gps),
            "RN" => Some(NavCode::Glonass),
            "EN" => Some(NavCode::Galileo),
            "CN" => Some(NavCode::BeiDou),
            "JN" => Some(NavCode::Qzss),
            "IN" => Some(NavCode::Irnss),
            "SN" => Some(NavCode::Sbas),
            "MN" => Some(NavCode::Mixed),
            _ => None,
        }
    }
}

impl fmt::Display for NavCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for NavCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for NavCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        NavCode::from_code(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown nav code: {s:?}")))
    }
}

/// What role a file plays inside a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Observation,
    Navigation(NavCode),
}

/// Map a legacy short-name type letter to its long-form category.
///
/// `o → MO`, `n → GN`, `g → RN`, `l → EN`, `f → CN`, `q → JN`.
pub fn legacy_category(letter: char) -> Option<FileCategory> {
    match letter.to_ascii_lowercase() {
        'o' => Some(FileCategory::Observation),
        'n' => Some(FileCategory::Navigation(NavCode::Gps)),
        'g' => Some(FileCategory::Navigation(NavCode::Glonass)),
        'l' => Some(FileCategory::Navigation(NavCode::Galileo)),
        'f' => Some(FileCategory::Navigation(NavCode::BeiDou)),
        'q' => Some(FileCategory::Navigation(NavCode::Qzss)),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum SetError {
    #[error("file name {0:?} fits no slot in the set")]
    NoSlot(String),
    #[error("set has no observation interval yet")]
    NoInterval,
    #[error(transparent)]
    Ident(#[from] IdentError),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode set: {0}")]
    Encode(#[from] serde_json::Error),
}

static OBS_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(\d{2})S_MO\.RNX$").expect("obs suffix pattern"));
static NAV_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_([A-Z]N)\.RNX$").expect("nav suffix pattern"));

/// One hour's files for one station's day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RinexSet {
    pub site: String,
    pub year: u16,
    pub doy: u16,
    pub hour: Hour,
    /// Observation sampling period in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u16>,
    /// Mixed-observation file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    /// Per-constellation (and mixed) navigation file names.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub navigation: BTreeMap<NavCode, String>,
    /// Originating archive, for zip uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zipfile: Option<PathBuf>,
    /// Inbound file names that contributed to this set.
    #[serde(default)]
    pub origs: Vec<String>,
    /// Epoch seconds when the set was created.
    pub created_epoch: u64,
    /// Epoch seconds of the last attach or touch.
    pub touched_epoch: u64,
}

impl RinexSet {
    pub fn new(ident: &Ident, now_epoch: u64) -> Self {
        Self {
            site: ident.site.clone(),
            year: ident.year,
            doy: ident.doy,
            hour: ident.hour,
            interval: None,
            observation: None,
            navigation: BTreeMap::new(),
            zipfile: None,
            origs: Vec::new(),
            created_epoch: now_epoch,
            touched_epoch: now_epoch,
        }
    }

    pub fn ident(&self) -> Result<Ident, IdentError> {
        Ident::new(self.site.clone(), self.year, self.doy, self.hour)
    }

    /// Minimally submittable: at least one observation and one navigation file.
    pub fn is_submittable(&self) -> bool {
        self.observation.is_some() && !self.navigation.is_empty()
    }

    /// Complete: the mixed-navigation file is present.
    pub fn is_complete(&self) -> bool {
        self.navigation.contains_key(&NavCode::Mixed)
    }

    /// Seconds since the set was created.
    pub fn created_age(&self, now_epoch: u64) -> u64 {
        now_epoch.saturating_sub(self.created_epoch)
    }

    /// Seconds since the set was last updated.
    pub fn quiet_for(&self, now_epoch: u64) -> u64 {
        now_epoch.saturating_sub(self.touched_epoch)
    }

    pub fn touch(&mut self, now_epoch: u64) {
        self.touched_epoch = now_epoch;
    }

    /// Attach a file by its canonical name suffix. `_NNS_MO.rnx` fills the
    /// observation slot and fixes the interval; `_xN.rnx` fills a navigation
    /// slot. Returns the category the file landed in.
    pub fn attach(&mut self, file_name: &str, now_epoch: u64) -> Result<FileCategory, SetError> {
        let upper = file_name.to_uppercase();
        let category = if let Some(caps) = OBS_SUFFIX.captures(&upper) {
            let interval = caps[1]
                .parse()
                .map_err(|_| SetError::NoSlot(file_name.to_string()))?;
            self.interval = Some(interval);
            self.observation = Some(file_name.to_string());
            FileCategory::Observation
        } else if let Some(caps) = NAV_SUFFIX.captures(&upper) {
            match NavCode::from_code(&caps[1]) {
                Some(code) => {
                    self.navigation.insert(code, file_name.to_string());
                    FileCategory::Navigation(code)
                }
                None => return Err(SetError::NoSlot(file_name.to_string())),
            }
        } else {
            return Err(SetError::NoSlot(file_name.to_string()));
        };
        self.touched_epoch = now_epoch;
        Ok(category)
    }

    /// Record an originating inbound file name.
    pub fn push_orig(&mut self, name: impl Into<String>) {
        self.origs.push(name.into());
    }

    /// Canonical long-form RINEX v3 name for a file of this set.
    ///
    /// Observation names need the interval; call sites that rename zip
    /// members set it from the site catalog before asking.
    pub fn canonical_name(&self, category: FileCategory) -> Result<String, SetError> {
        let period = if self.hour.is_day() { "01D" } else { "01H" };
        let stamp = format!(
            "{}_R_{:04}{:03}{:02}00",
            self.site,
            self.year,
            self.doy,
            self.hour.hh()
        );
        match category {
            FileCategory::Observation => {
                let interval = self.interval.ok_or(SetError::NoInterval)?;
                Ok(format!("{stamp}_{period}_{interval:02}S_MO.rnx"))
            }
            FileCategory::Navigation(code) => Ok(format!("{stamp}_{period}_{}.rnx", code.code())),
        }
    }

    /// Name prefix shared by every canonical file of this set. Used to spot
    /// still-arriving uploads in the inbound spool.
    pub fn prefix(&self) -> String {
        match self.hour {
            Hour::Of(h) => format!("{}_R_{:04}{:03}{:02}", self.site, self.year, self.doy, h),
            Hour::Day => format!("{}_R_{:04}{:03}", self.site, self.year, self.doy),
        }
    }

    /// Load a persisted set from `rs.<hour>.json`.
    pub fn load(path: &Path) -> Result<Self, SetError> {
        let data = std::fs::read_to_string(path).map_err(|source| SetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| SetError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Persist the set atomically: write a temp file next to the target and
    /// rename it into place.
    pub fn save(&self, path: &Path) -> Result<(), SetError> {
        let data = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(|source| SetError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| SetError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl FromStr for NavCode {
    type Err = SetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NavCode::from_code(s).ok_or_else(|| SetError::NoSlot(s.to_string()))
    }
}

#[cfg(test)]
#[path = "rinex_set_tests.rs"]
mod tests;
