// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::Path;
use tempfile::TempDir;

fn install_worker(dir: &Path, name: &str, script: &str) -> Vec<String> {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    vec![path.to_string_lossy().into_owned()]
}

/// Echo worker: answers `ok` with the ident copied from the payload.
const ECHO_WORKER: &str = r#"while read line; do
  ident=$(echo "$line" | sed 's/.*"ident":"\([^"]*\)".*/\1/')
  echo "{\"ident\":\"$ident\",\"status\":\"ok\"}"
done"#;

fn payload(ident: &str) -> String {
    format!("{{\"ident\":\"{ident}\"}}")
}

#[tokio::test]
async fn round_trips_a_job() {
    let dir = TempDir::new().unwrap();
    let argv = install_worker(dir.path(), "echo-worker", ECHO_WORKER);
    let mut pool = WorkerPool::start(1, &argv).unwrap();

    pool.submit(payload("job-1"));
    let result = pool.next_result().await.unwrap();
    assert_eq!(result.result.ident, "job-1");
    assert_eq!(result.result.status, JobStatus::Ok);
    assert_eq!(pool.busy_count(), 0);

    pool.shutdown().await;
}

#[tokio::test]
async fn overflow_queues_boss_side_and_drains() {
    let dir = TempDir::new().unwrap();
    let argv = install_worker(dir.path(), "echo-worker", ECHO_WORKER);
    let mut pool = WorkerPool::start(2, &argv).unwrap();

    for n in 0..5 {
        pool.submit(payload(&format!("job-{n}")));
    }
    assert_eq!(pool.busy_count(), 2);
    assert_eq!(pool.backlog_len(), 3);

    let mut seen = Vec::new();
    for _ in 0..5 {
        let result = pool.next_result().await.unwrap();
        assert_eq!(result.result.status, JobStatus::Ok);
        seen.push(result.result.ident);
    }
    seen.sort();
    assert_eq!(seen, vec!["job-0", "job-1", "job-2", "job-3", "job-4"]);
    assert_eq!(pool.backlog_len(), 0);

    pool.shutdown().await;
}

#[tokio::test]
async fn dead_worker_reports_fatal() {
    let dir = TempDir::new().unwrap();
    let argv = install_worker(dir.path(), "dying-worker", "read line; exit 7");
    let mut pool = WorkerPool::start(1, &argv).unwrap();

    pool.submit(payload("doomed"));
    let result = pool.next_result().await.unwrap();
    assert_eq!(result.result.status, JobStatus::Fatal);
    assert_eq!(result.result.ident, "?"); // payload is not a full JobSpec

    pool.shutdown().await;
}

#[tokio::test]
async fn garbage_result_line_is_fatal() {
    let dir = TempDir::new().unwrap();
    let argv = install_worker(dir.path(), "noisy-worker", "read line; echo not-json; cat > /dev/null");
    let mut pool = WorkerPool::start(1, &argv).unwrap();

    pool.submit(payload("job-1"));
    let result = pool.next_result().await.unwrap();
    assert_eq!(result.result.status, JobStatus::Fatal);

    pool.shutdown().await;
}

#[tokio::test]
async fn restart_uses_the_same_constructor() {
    let dir = TempDir::new().unwrap();
    let argv = install_worker(dir.path(), "echo-worker", ECHO_WORKER);

    let mut pool = WorkerPool::start(1, &argv).unwrap();
    pool.submit(payload("before"));
    assert_eq!(pool.next_result().await.unwrap().result.status, JobStatus::Ok);
    pool.shutdown().await;

    let mut pool = WorkerPool::start(1, &argv).unwrap();
    pool.submit(payload("after"));
    let result = pool.next_result().await.unwrap();
    assert_eq!(result.result.ident, "after");
    pool.shutdown().await;
}

#[tokio::test]
async fn empty_argv_is_an_error() {
    assert!(WorkerPool::start(1, &[]).is_err());
}
