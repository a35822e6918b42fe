// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rx_core::{JobKind, JobSpec};
use rx_store::Layout;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn parses_reload() {
    assert_eq!(
        "reload ftpuploader".parse::<AdminCommand>().unwrap(),
        AdminCommand::ReloadUploader
    );
}

#[test]
fn parses_force_complete() {
    assert_eq!(
        "force complete ABCD00DNK 2019 152"
            .parse::<AdminCommand>()
            .unwrap(),
        AdminCommand::ForceComplete {
            site: "ABCD00DNK".to_string(),
            year: 2019,
            doy: 152,
        }
    );
}

#[test]
fn parses_reprocess_single_day() {
    assert_eq!(
        "reprocess ABCD00DNK 2019 152".parse::<AdminCommand>().unwrap(),
        AdminCommand::Reprocess {
            site: "ABCD00DNK".to_string(),
            year: 2019,
            from_doy: 152,
            to_doy: 152,
        }
    );
}

#[test]
fn parses_reprocess_range() {
    assert_eq!(
        "reprocess ABCD00DNK 2019 150-152"
            .parse::<AdminCommand>()
            .unwrap(),
        AdminCommand::Reprocess {
            site: "ABCD00DNK".to_string(),
            year: 2019,
            from_doy: 150,
            to_doy: 152,
        }
    );
}

#[test]
fn grammar_is_case_sensitive_and_strict() {
    for bad in [
        "RELOAD ftpuploader",
        "reload uploader",
        "force complete abcd00dnk 2019 152", // lowercase site
        "force complete ABCD 2019 152",      // short site
        "force complete ABCD00DNK 2019",     // missing doy
        "reprocess ABCD00DNK 2019 152-150",  // inverted range
        "reprocess ABCD00DNK nineteen 152",
        "",
    ] {
        assert!(bad.parse::<AdminCommand>().is_err(), "accepted {bad:?}");
    }
}

struct Fixture {
    _root: TempDir,
    ctx: CommandCtx,
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
        let ctx = CommandCtx {
            store: Arc::new(StateStore::new(layout.clone())),
            queue: JobQueue::new(layout.jobqueue),
            uploader_reload: vec!["true".to_string()],
        };
        Self { _root: root, ctx }
    }

    fn layout(&self) -> &Layout {
        self.ctx.store.layout()
    }

    fn seed_hourly_set(&self, hour: u8, interval: u16) {
        let ident = Ident::new("ABCD00DNK", 2019, 152, Hour::Of(hour)).unwrap();
        let mut set = RinexSet::new(&ident, 1000);
        set.interval = Some(interval);
        let path = self.layout().rs_path(&ident);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        set.save(&path).unwrap();
    }

    fn queued_jobs(&self) -> Vec<std::path::PathBuf> {
        self.ctx.queue.files_older_than(Duration::ZERO).unwrap()
    }
}

#[tokio::test]
async fn force_complete_emits_a_day_job() {
    let fx = Fixture::new();
    fx.seed_hourly_set(3, 30);

    execute(&fx.ctx, "force complete ABCD00DNK 2019 152\n").await;

    let jobs = fx.queued_jobs();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].ends_with("ABCD00DNK-2019-152-0"));

    let job = JobSpec::from_json(&std::fs::read_to_string(&jobs[0]).unwrap()).unwrap();
    assert_eq!(job.kind, JobKind::Hour2Daily);
    assert_eq!(job.hour, Hour::Day);
    assert_eq!(job.interval, 30);
    assert!(job.force_complete);

    let day = Ident::new("ABCD00DNK", 2019, 152, Hour::Day).unwrap();
    assert_eq!(fx.ctx.store.peek(&day).unwrap(), HourState::Queued);
}

#[tokio::test]
async fn force_complete_without_hourly_data_refuses() {
    let fx = Fixture::new();

    execute(&fx.ctx, "force complete ABCD00DNK 2019 152").await;

    assert!(fx.queued_jobs().is_empty());
    let day = Ident::new("ABCD00DNK", 2019, 152, Hour::Day).unwrap();
    assert_eq!(fx.ctx.store.peek(&day).unwrap(), HourState::None);
}

#[tokio::test]
async fn force_complete_respects_day_state() {
    let fx = Fixture::new();
    fx.seed_hourly_set(3, 30);
    let day = Ident::new("ABCD00DNK", 2019, 152, Hour::Day).unwrap();
    let lock = fx.ctx.store.lock(&day).await.unwrap();
    lock.set(HourState::Running).unwrap();
    drop(lock);

    execute(&fx.ctx, "force complete ABCD00DNK 2019 152").await;

    assert!(fx.queued_jobs().is_empty());
    assert_eq!(fx.ctx.store.peek(&day).unwrap(), HourState::Running);
}

#[tokio::test]
async fn reprocess_returns_archived_files_to_incoming() {
    let fx = Fixture::new();
    for (doy, file) in [(151, "abcd151a.19o"), (152, "abcd152a.19o")] {
        let dir = fx.layout().save_dir("ABCD00DNK", 2019, doy);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), b"archived").unwrap();
    }

    execute(&fx.ctx, "reprocess ABCD00DNK 2019 151-152").await;

    assert!(fx.layout().incoming.join("abcd151a.19o").is_file());
    assert!(fx.layout().incoming.join("abcd152a.19o").is_file());
    assert!(std::fs::read_dir(fx.layout().save_dir("ABCD00DNK", 2019, 151))
        .unwrap()
        .next()
        .is_none());
}

#[tokio::test]
async fn reprocess_missing_day_only_warns() {
    let fx = Fixture::new();
    execute(&fx.ctx, "reprocess ABCD00DNK 2019 200").await;
    assert!(std::fs::read_dir(&fx.layout().incoming).unwrap().next().is_none());
}

#[tokio::test]
async fn unparsable_command_is_ignored() {
    let fx = Fixture::new();
    execute(&fx.ctx, "make me a sandwich").await;
    assert!(fx.queued_jobs().is_empty());
}
