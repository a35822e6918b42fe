// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::pool::WorkerResult;
use rx_core::{Hour, HourState, Ident, JobKind, RinexSet};
use rx_store::Layout;
use std::path::PathBuf;
use tempfile::TempDir;

/// Echo worker: answers `ok` with the ident copied from the payload.
const ECHO_WORKER: &str = r#"while read line; do
  ident=$(echo "$line" | sed 's/.*"site":"\([^"]*\)".*"year":\([0-9]*\),"doy":\([0-9]*\),"hour":"\([a-x0]\)".*/\1-\2-\3-\4/')
  echo "{\"ident\":\"$ident\",\"status\":\"ok\"}"
done"#;

struct Fixture {
    root: TempDir,
    layout: Layout,
    boss: Boss,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let layout = Layout {
            incoming: root.path().join("incoming"),
            savedir: root.path().join("save"),
            workdir: root.path().join("work"),
            jobqueue: root.path().join("queue"),
        };
        layout.ensure().unwrap();

        use std::os::unix::fs::PermissionsExt;
        let worker = root.path().join("echo-worker");
        std::fs::write(&worker, format!("#!/bin/sh\n{ECHO_WORKER}\n")).unwrap();
        std::fs::set_permissions(&worker, std::fs::Permissions::from_mode(0o755)).unwrap();

        let store = std::sync::Arc::new(StateStore::new(layout.clone()));
        let queue = JobQueue::new(layout.jobqueue.clone());
        let boss = Boss::new(
            store,
            queue,
            1,
            Duration::from_secs(300),
            vec!["true".to_string()],
            vec![worker.to_string_lossy().into_owned()],
        );
        Self { root, layout, boss }
    }

    fn pool(&self) -> WorkerPool {
        let worker = self.root.path().join("echo-worker");
        WorkerPool::start(1, &[worker.to_string_lossy().into_owned()]).unwrap()
    }

    fn ident(&self) -> Ident {
        Ident::new("ABCD00DNK", 2019, 152, Hour::Of(0)).unwrap()
    }

    fn emit_job(&self) -> PathBuf {
        let ident = self.ident();
        let mut set = RinexSet::new(&ident, 1000);
        set.attach("ABCD00DNK_R_20191520000_01H_30S_MO.rnx", 1001)
            .unwrap();
        set.attach("ABCD00DNK_R_20191520000_01H_GN.rnx", 1002)
            .unwrap();
        let job = rx_core::JobSpec::for_set(&set, self.layout.workdir.join("rs.a.json")).unwrap();
        JobQueue::new(self.layout.jobqueue.clone()).emit(&job).unwrap()
    }

    fn queue_files(&self) -> Vec<PathBuf> {
        JobQueue::new(self.layout.jobqueue.clone())
            .files_older_than(Duration::ZERO)
            .unwrap()
    }
}

#[tokio::test]
async fn job_file_is_consumed_and_processed() {
    let mut fx = Fixture::new();
    let mut pool = fx.pool();
    let job_path = fx.emit_job();

    fx.boss.take_file(&mut pool, &job_path).await;
    assert!(!job_path.exists(), "queue file must be unlinked after reading");

    let result = pool.next_result().await.unwrap();
    assert_eq!(result.result.ident, "ABCD00DNK-2019-152-a");
    assert!(!fx.boss.handle_result(result));

    pool.shutdown().await;
}

#[tokio::test]
async fn duplicate_ident_is_rejected_while_running() {
    let mut fx = Fixture::new();
    let mut pool = fx.pool();

    let first = fx.emit_job();
    fx.boss.take_file(&mut pool, &first).await;
    // Same ident again before any result came back.
    let second = fx.emit_job();
    fx.boss.take_file(&mut pool, &second).await;

    // Only the first dispatch reached the pool.
    let result = pool.next_result().await.unwrap();
    assert_eq!(result.result.status, JobStatus::Ok);
    assert!(
        tokio::time::timeout(Duration::from_millis(300), pool.next_result())
            .await
            .is_err(),
        "duplicate must not produce a second result"
    );

    pool.shutdown().await;
}

#[tokio::test]
async fn resubmission_allowed_after_completion() {
    let mut fx = Fixture::new();
    let mut pool = fx.pool();

    let first = fx.emit_job();
    fx.boss.take_file(&mut pool, &first).await;
    let result = pool.next_result().await.unwrap();
    fx.boss.handle_result(result);

    let second = fx.emit_job();
    fx.boss.take_file(&mut pool, &second).await;
    let result = pool.next_result().await.unwrap();
    assert_eq!(result.result.ident, "ABCD00DNK-2019-152-a");

    pool.shutdown().await;
}

#[tokio::test]
async fn fatal_result_requests_restart() {
    let mut fx = Fixture::new();
    let fatal = PoolResult {
        worker: 0,
        result: WorkerResult {
            ident: "ABCD00DNK-2019-152-a".to_string(),
            status: JobStatus::Fatal,
            message: Some("stack trace here".to_string()),
        },
    };
    assert!(fx.boss.handle_result(fatal));

    let ok = PoolResult {
        worker: 0,
        result: WorkerResult {
            ident: "ABCD00DNK-2019-152-b".to_string(),
            status: JobStatus::Ok,
            message: None,
        },
    };
    assert!(!fx.boss.handle_result(ok));
}

#[tokio::test]
async fn command_file_runs_the_admin_grammar() {
    let mut fx = Fixture::new();
    let mut pool = fx.pool();

    // Seed an hourly set so force complete can borrow its interval.
    let hour = fx.ident();
    let mut set = RinexSet::new(&hour, 1000);
    set.interval = Some(30);
    let rs_path = fx.boss.store.layout().rs_path(&hour);
    std::fs::create_dir_all(rs_path.parent().unwrap()).unwrap();
    set.save(&rs_path).unwrap();

    let cmd_path = fx.layout.jobqueue.join("ops.command");
    std::fs::write(&cmd_path, "force complete ABCD00DNK 2019 152\n").unwrap();

    fx.boss.take_file(&mut pool, &cmd_path).await;
    assert!(!cmd_path.exists());

    let files = fx.queue_files();
    assert_eq!(files.len(), 1);
    let job =
        rx_core::JobSpec::from_json(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(job.kind, JobKind::Hour2Daily);
    assert!(job.force_complete);

    pool.shutdown().await;
}

#[tokio::test]
async fn forced_completion_scan_consumes_markers() {
    let mut fx = Fixture::new();

    let hour = fx.ident();
    let mut set = RinexSet::new(&hour, 1000);
    set.interval = Some(15);
    let rs_path = fx.boss.store.layout().rs_path(&hour);
    std::fs::create_dir_all(rs_path.parent().unwrap()).unwrap();
    set.save(&rs_path).unwrap();

    let marker = fx
        .boss
        .store
        .layout()
        .force_complete_marker("ABCD00DNK", 2019, 152);
    std::fs::write(&marker, b"").unwrap();

    fx.boss.forced_completion_scan().await;

    assert!(!marker.exists(), "marker must be consumed");
    let files = fx.queue_files();
    assert_eq!(files.len(), 1);
    let job =
        rx_core::JobSpec::from_json(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(job.interval, 15);
    assert!(job.force_complete);

    let day = Ident::new("ABCD00DNK", 2019, 152, Hour::Day).unwrap();
    assert_eq!(fx.boss.store.peek(&day).unwrap(), HourState::Queued);
}

#[tokio::test]
async fn unusable_job_file_is_dropped() {
    let mut fx = Fixture::new();
    let mut pool = fx.pool();

    let bad = fx.layout.jobqueue.join("broken-job");
    std::fs::write(&bad, "not json at all").unwrap();

    fx.boss.take_file(&mut pool, &bad).await;
    assert!(!bad.exists());
    assert!(fx.queue_files().is_empty());

    pool.shutdown().await;
}
