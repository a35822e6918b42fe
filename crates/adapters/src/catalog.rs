// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only site catalog.
//!
//! The `locations` table is the authoritative 4→9 character mapping and the
//! source of each station's observation interval. Unknown short names fail
//! closed; there is no fallback heuristic.
//!
//! Readers see a consistent snapshot: `reload` builds a fresh map and swaps
//! it behind an `Arc`, so lookups never observe a half-loaded catalog.

use parking_lot::RwLock;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("site catalog {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("site catalog query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// One known station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRecord {
    /// Canonical 9-character site name.
    pub site: String,
    /// 4-character short name.
    pub shortname: String,
    /// Observation sampling period in seconds.
    pub interval: u16,
}

type Snapshot = HashMap<String, SiteRecord>;

/// Cache of the `locations` table, keyed by uppercase short name.
pub struct SiteCatalog {
    conn: std::sync::Mutex<Connection>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl SiteCatalog {
    /// Open the catalog database and perform the initial load.
    /// A missing or unreadable catalog is fatal at startup.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(|source| CatalogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self {
            conn: std::sync::Mutex::new(conn),
            snapshot: RwLock::new(Arc::new(Snapshot::new())),
        };
        catalog.reload()?;
        Ok(catalog)
    }

    /// Re-read the `locations` table, atomically swapping the snapshot.
    /// Returns the number of stations loaded.
    pub fn reload(&self) -> Result<usize, CatalogError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare("SELECT site, shortname, obsint FROM locations")?;
        let rows = stmt.query_map([], |row| {
            Ok(SiteRecord {
                site: row.get::<_, String>(0)?.to_uppercase(),
                shortname: row.get::<_, String>(1)?.to_uppercase(),
                interval: row.get::<_, u16>(2)?,
            })
        })?;
        let mut fresh = Snapshot::new();
        for record in rows {
            let record = record?;
            fresh.insert(record.shortname.clone(), record);
        }
        let count = fresh.len();
        *self.snapshot.write() = Arc::new(fresh);
        Ok(count)
    }

    /// Look up a station by its 4-character short name.
    pub fn lookup(&self, site4: &str) -> Option<SiteRecord> {
        self.snapshot.read().get(&site4.to_uppercase()).cloned()
    }

    /// Verify a full 9-character name against the catalog. The name must
    /// match the record registered under its own short prefix.
    pub fn verify_long(&self, site9: &str) -> Option<SiteRecord> {
        if site9.len() != 9 {
            return None;
        }
        self.lookup(&site9[..4])
            .filter(|record| record.site.eq_ignore_ascii_case(site9))
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
