// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn seed_db(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("sums.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE gpssums (site TEXT, year INTEGER, doy INTEGER, hour TEXT);
         INSERT INTO gpssums VALUES ('ABCD00DNK', 2019, 152, '0');
         INSERT INTO gpssums VALUES ('ABCD00DNK', 2019, 153, 'a');",
    )
    .unwrap();
    path
}

#[test]
fn day_row_blocks() {
    let dir = TempDir::new().unwrap();
    let ledger = SummaryLedger::open(&seed_db(&dir)).unwrap();
    assert!(ledger.day_processed("ABCD00DNK", 2019, 152).unwrap());
}

#[test]
fn hour_rows_do_not_block() {
    let dir = TempDir::new().unwrap();
    let ledger = SummaryLedger::open(&seed_db(&dir)).unwrap();
    assert!(!ledger.day_processed("ABCD00DNK", 2019, 153).unwrap());
    assert!(!ledger.day_processed("ABCD00DNK", 2019, 154).unwrap());
    assert!(!ledger.day_processed("KMS300DNK", 2019, 152).unwrap());
}

#[test]
fn missing_ledger_is_an_open_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        SummaryLedger::open(&dir.path().join("nope.db")),
        Err(LedgerError::Open { .. })
    ));
}
