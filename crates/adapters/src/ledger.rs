// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daily-summary ledger.
//!
//! `gpssums` is written by downstream processing; the core only asks one
//! question of it: has this station day already been summarized? A `hour='0'`
//! row blocks new work for that day until the operator runs `forget`.

use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("summary ledger {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("summary ledger query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Read-only view of the `gpssums` table.
pub struct SummaryLedger {
    conn: Mutex<Connection>,
}

impl SummaryLedger {
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(|source| LedgerError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Whether the whole-day summary for `(site, year, doy)` already exists.
    pub fn day_processed(&self, site: &str, year: u16, doy: u16) -> Result<bool, LedgerError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM gpssums WHERE site = ?1 AND year = ?2 AND doy = ?3 AND hour = '0'",
                rusqlite::params![site, year, doy],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
