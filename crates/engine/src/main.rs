// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rxjobd - Job engine daemon
//!
//! Long-running scheduler over the job-queue spool. The boss process drains
//! queue files into a pool of worker processes; the same binary invoked with
//! `--worker` becomes one of those workers.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod boss;
mod command;
mod env;
mod pool;
mod worker;

use anyhow::{Context, Result};
use boss::Boss;
use clap::Parser;
use rx_adapters::Config;
use rx_store::{JobQueue, StateStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "rxjobd", version, about = "RINEX spool job engine")]
struct Cli {
    /// Configuration file
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Log at debug level
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Worker instance count (overrides configuration)
    #[arg(short = 'i', long = "instances")]
    instances: Option<usize>,

    /// Log channel (file stem under the log directory)
    #[arg(short = 'l', long = "logchannel", default_value = "rxjobd")]
    logchannel: String,

    /// Run as a pool worker (internal; spawned by the boss)
    #[arg(long = "worker", hide = true)]
    worker: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    let channel = if cli.worker {
        format!("{}-worker", cli.logchannel)
    } else {
        cli.logchannel.clone()
    };
    let _log_guard = setup_logging(&config, &channel, cli.debug)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?
        .block_on(async move {
            if cli.worker {
                worker::run_worker(&config).await
            } else {
                run_boss(cli, config).await
            }
        })
}

async fn run_boss(cli: Cli, config: Config) -> Result<()> {
    info!("starting job engine");

    let layout = config.layout();
    layout.ensure().context("preparing spool directories")?;
    let store = Arc::new(StateStore::new(layout.clone()));
    let queue = JobQueue::new(layout.jobqueue.clone());

    let exe = std::env::current_exe().context("resolving own executable")?;
    let worker_argv = vec![
        exe.to_string_lossy().into_owned(),
        "--worker".to_string(),
        "-c".to_string(),
        cli.config.to_string_lossy().into_owned(),
    ];

    let instances = cli.instances.unwrap_or(config.engine.instances);
    let mut boss = Boss::new(
        store,
        queue,
        instances,
        Duration::from_secs(config.engine.fatal_backoff_secs),
        config.engine.uploader_reload.clone(),
        worker_argv,
    );
    boss.run().await
}

fn setup_logging(
    config: &Config,
    channel: &str,
    debug: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // An empty log_dir means stderr. Workers never log to stdout; the
    // result wire must stay clean.
    if config.log_dir.as_os_str().is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    }

    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("creating log directory {}", config.log_dir.display()))?;
    let appender =
        tracing_appender::rolling::never(&config.log_dir, format!("{channel}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();
    Ok(Some(guard))
}
