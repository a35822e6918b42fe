// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rxdispd - Inbound dispatcher daemon
//!
//! Watches the inbound spool, archives uploads, unpacks them through a
//! bounded worker pool and submits completed hours to the job queue.
//!
//! Architecture:
//! - Main loop: watcher events, age gate, periodic rescan, signals
//! - Unpack pool: N workers decoding uploads
//! - Pending aggregator: one task assembling multi-file uploads

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod dispatch;
mod env;
mod pending;
mod unpack;

use anyhow::{Context, Result};
use clap::Parser;
use dispatch::Dispatcher;
use pending::{PendingAggregator, PendingMsg};
use rx_adapters::{watch_dir, Config, Decoders, EventGate, SiteCatalog, SummaryLedger};
use rx_core::SystemClock;
use rx_store::{JobQueue, StateStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use unpack::UnpackCtx;

#[derive(Parser)]
#[command(name = "rxdispd", version, about = "RINEX spool inbound dispatcher")]
struct Cli {
    /// Configuration file
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Log at debug level
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Unpack worker count (overrides configuration)
    #[arg(short = 'i', long = "instances")]
    instances: Option<usize>,

    /// Log channel (file stem under the log directory)
    #[arg(short = 'l', long = "logchannel", default_value = "rxdispd")]
    logchannel: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    let _log_guard = setup_logging(&config, &cli.logchannel, cli.debug)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?
        .block_on(run(cli, config))
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    info!("starting inbound dispatcher");

    let layout = config.layout();
    layout.ensure().context("preparing spool directories")?;

    let catalog = SiteCatalog::open(&config.database.path).context("opening site catalog")?;
    let ledger = SummaryLedger::open(&config.database.path).context("opening summary ledger")?;

    let store = Arc::new(StateStore::new(layout.clone()));
    let queue = JobQueue::new(layout.jobqueue.clone());
    let decoders = Decoders::new(config.decoders.clone());

    // Pending aggregator
    let (pending_tx, pending_rx) = mpsc::channel(64);
    let aggregator = PendingAggregator::new(store.clone(), queue.clone(), SystemClock);
    let aggregator_handle = tokio::spawn(aggregator.run(pending_rx));

    // Unpack pool
    let workers = cli.instances.unwrap_or(config.dispatcher.unpack_workers);
    let unpack_ctx = Arc::new(UnpackCtx {
        store: store.clone(),
        queue,
        decoders,
        pending_tx: pending_tx.clone(),
        clock: Arc::new(SystemClock),
    });
    let (unpack_tx, unpack_handles) = unpack::spawn_pool(workers, unpack_ctx);
    info!(workers, "unpack pool started");

    let dispatcher = Dispatcher {
        layout: layout.clone(),
        catalog,
        ledger,
        unpack_tx,
    };

    let mut watcher = watch_dir(&layout.incoming).context("watching inbound spool")?;
    let mut gate = EventGate::new();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let mut drain_tick = tokio::time::interval(std::time::Duration::from_secs(1));
    drain_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut rescan_tick = tokio::time::interval(rx_adapters::env::rescan_interval());
    rescan_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Catch files that arrived while we were down.
    dispatcher.rescan(rx_adapters::env::rescan_min_age());

    info!(incoming = %layout.incoming.display(), "dispatcher ready");

    loop {
        tokio::select! {
            Some(path) = watcher.rx.recv() => {
                gate.note(path);
            }

            _ = drain_tick.tick() => {
                for path in gate.drain_ready(rx_adapters::env::incoming_min_age()) {
                    dispatcher.dispatch_file(&path);
                }
            }

            _ = rescan_tick.tick() => {
                dispatcher.rescan(rx_adapters::env::rescan_min_age());
                if let Err(e) = dispatcher.catalog.reload() {
                    warn!(error = %e, "site catalog reload failed; keeping old snapshot");
                }
            }

            _ = sighup.recv() => {
                info!("SIGHUP: reloading site catalog and rescanning");
                match dispatcher.catalog.reload() {
                    Ok(count) => info!(stations = count, "site catalog reloaded"),
                    Err(e) => error!(error = %e, "site catalog reload failed"),
                }
                dispatcher.rescan(rx_adapters::env::rescan_min_age());
            }

            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }

            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    // Graceful drain: close the unpack channel, send the aggregator its
    // sentinel, then give the workers a bounded window to finish.
    let Dispatcher { unpack_tx, .. } = dispatcher;
    drop(unpack_tx);
    if pending_tx.send(PendingMsg::Exit).await.is_err() {
        warn!("pending aggregator already gone at shutdown");
    }
    drop(pending_tx);

    let deadline = env::drain_deadline();
    let drained = tokio::time::timeout(deadline, async {
        for handle in unpack_handles {
            let _ = handle.await;
        }
        let _ = aggregator_handle.await;
    })
    .await;
    match drained {
        Ok(()) => info!("workers drained; dispatcher stopped"),
        Err(_) => warn!(
            deadline_secs = deadline.as_secs(),
            "drain deadline expired; abandoning remaining work"
        ),
    }
    Ok(())
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

    // An empty log_dir means stderr (useful under a supervisor).
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
