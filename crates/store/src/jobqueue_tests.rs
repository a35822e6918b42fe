// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rx_core::{Hour, Ident, JobSpec, RinexSet};
use std::time::Duration;
use tempfile::TempDir;

fn sample_job() -> JobSpec {
    let ident = Ident::new("ABCD00DNK", 2019, 152, Hour::Of(0)).unwrap();
    let mut set = RinexSet::new(&ident, 1000);
    set.attach("ABCD00DNK_R_20191520000_01H_30S_MO.rnx", 1001)
        .unwrap();
    set.attach("ABCD00DNK_R_20191520000_01H_GN.rnx", 1002)
        .unwrap();
    JobSpec::for_set(&set, PathBuf::from("/work/rs.a.json")).unwrap()
}

#[test]
fn emit_names_the_file_after_the_ident() {
    let dir = TempDir::new().unwrap();
    let queue = JobQueue::new(dir.path());

    let path = queue.emit(&sample_job()).unwrap();
    assert_eq!(path, dir.path().join("ABCD00DNK-2019-152-a"));
    assert!(path.is_file());

    let entry = queue.read_entry(&path).unwrap();
    assert!(!entry.is_command());
    let parsed = JobSpec::from_json(&entry.body).unwrap();
    assert_eq!(parsed.site, "ABCD00DNK");
}

#[test]
fn emit_leaves_no_temp_files() {
    let dir = TempDir::new().unwrap();
    let queue = JobQueue::new(dir.path());
    queue.emit(&sample_job()).unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["ABCD00DNK-2019-152-a"]);
}

#[test]
fn command_files_are_recognized_by_suffix() {
    let dir = TempDir::new().unwrap();
    let queue = JobQueue::new(dir.path());
    let path = dir.path().join("20190601.command");
    std::fs::write(&path, "reload ftpuploader\n").unwrap();

    let entry = queue.read_entry(&path).unwrap();
    assert!(entry.is_command());
    assert_eq!(entry.body, "reload ftpuploader\n");
}

#[test]
fn consume_unlinks() {
    let dir = TempDir::new().unwrap();
    let queue = JobQueue::new(dir.path());
    let path = queue.emit(&sample_job()).unwrap();

    let entry = queue.read_entry(&path).unwrap();
    queue.consume(&entry).unwrap();
    assert!(!path.exists());
}

#[test]
fn files_older_than_applies_the_age_gate() {
    let dir = TempDir::new().unwrap();
    let queue = JobQueue::new(dir.path());
    let path = queue.emit(&sample_job()).unwrap();

    // Fresh files are not drained with a large gate...
    assert!(queue
        .files_older_than(Duration::from_secs(3600))
        .unwrap()
        .is_empty());
    // ...but a zero gate picks them up.
    assert_eq!(
        queue.files_older_than(Duration::ZERO).unwrap(),
        vec![path]
    );
}

#[test]
fn files_older_than_skips_dotfiles_and_directories() {
    let dir = TempDir::new().unwrap();
    let queue = JobQueue::new(dir.path());
    std::fs::write(dir.path().join(".in-flight.tmp"), b"x").unwrap();
    std::fs::create_dir(dir.path().join("subdir")).unwrap();

    assert!(queue.files_older_than(Duration::ZERO).unwrap().is_empty());
}
