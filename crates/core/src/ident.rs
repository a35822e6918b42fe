// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-unit identity: `(site, year, doy, hour)`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The hour slot of a work unit.
///
/// UTC hours 0–23 are written as the letters `'a'..'x'`; the literal `'0'`
/// names the whole-day aggregation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hour {
    /// A specific UTC hour, 0–23.
    Of(u8),
    /// The whole-day aggregation slot.
    Day,
}

impl Hour {
    /// Build from a UTC hour number. 24 maps to the day slot
    /// (legacy short names use the 24-hour convention for daily files).
    pub fn from_hh(hh: u8) -> Option<Self> {
        match hh {
            0..=23 => Some(Hour::Of(hh)),
            24 => Some(Hour::Day),
            _ => None,
        }
    }

    /// Build from an hour letter: `'a'..'x'` or `'0'`.
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            '0' => Some(Hour::Day),
            'a'..='x' => Some(Hour::Of(c as u8 - b'a')),
            _ => None,
        }
    }

    /// The hour letter used in state files, set files and idents.
    pub fn letter(self) -> char {
        match self {
            Hour::Of(h) => (b'a' + h) as char,
            Hour::Day => '0',
        }
    }

    /// The HH field used when composing canonical file names.
    /// Daily products carry `00`.
    pub fn hh(self) -> u8 {
        match self {
            Hour::Of(h) => h,
            Hour::Day => 0,
        }
    }

    pub fn is_day(self) -> bool {
        matches!(self, Hour::Day)
    }
}

impl fmt::Display for Hour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl serde::Serialize for Hour {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut buf = [0u8; 4];
        serializer.serialize_str(self.letter().encode_utf8(&mut buf))
    }
}

impl<'de> serde::Deserialize<'de> for Hour {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Hour::from_letter(c)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid hour letter: {s:?}"))),
            _ => Err(serde::de::Error::custom(format!(
                "invalid hour letter: {s:?}"
            ))),
        }
    }
}

/// Errors building or parsing an [`Ident`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentError {
    #[error("site name must be 9 uppercase characters, got {0:?}")]
    BadSite(String),
    #[error("day-of-year {0} out of range 1..=366")]
    BadDoy(u16),
    #[error("malformed ident: {0:?}")]
    Malformed(String),
}

/// Canonical work-unit key: one hour (or the day slot) of one station's day.
///
/// Renders as `"<site>-<year>-<doy>-<hour>"`, e.g. `ABCD00DNK-2019-152-a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub site: String,
    pub year: u16,
    pub doy: u16,
    pub hour: Hour,
}

impl Ident {
    pub fn new(
        site: impl Into<String>,
        year: u16,
        doy: u16,
        hour: Hour,
    ) -> Result<Self, IdentError> {
        let site = site.into();
        if site.len() != 9 || !site.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(IdentError::BadSite(site));
        }
        if !(1..=366).contains(&doy) {
            return Err(IdentError::BadDoy(doy));
        }
        Ok(Self {
            site,
            year,
            doy,
            hour,
        })
    }

    /// The day-job ident for the same `(site, year, doy)`.
    pub fn day(&self) -> Ident {
        Ident {
            site: self.site.clone(),
            year: self.year,
            doy: self.doy,
            hour: Hour::Day,
        }
    }

    pub fn is_day(&self) -> bool {
        self.hour.is_day()
    }

    /// The first 4 characters of the site name (the station short name).
    pub fn site4(&self) -> &str {
        &self.site[..4]
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:04}-{:03}-{}",
            self.site,
            self.year,
            self.doy,
            self.hour.letter()
        )
    }
}

impl FromStr for Ident {
    type Err = IdentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || IdentError::Malformed(s.to_string());
        let mut parts = s.split('-');
        let site = parts.next().ok_or_else(malformed)?;
        let year = parts
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(malformed)?;
        let doy = parts
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(malformed)?;
        let hour = parts
            .next()
            .filter(|p| p.len() == 1)
            .and_then(|p| Hour::from_letter(p.chars().next()?))
            .ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ident::new(site, year, doy, hour)
    }
}

#[cfg(test)]
#[path = "ident_tests.rs"]
mod tests;
