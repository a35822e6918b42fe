// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin command channel.
//!
//! Operators drop a file ending in `command` into the job queue; its body is
//! one command matched against a small, case-sensitive grammar:
//!
//! ```text
//! reload ftpuploader
//! force complete <SITE9> <YEAR> <DOY>
//! reprocess <SITE9> <YEAR> <DOY>[-<DOY>]
//! ```

use rx_core::{Hour, HourState, Ident, JobSpec, RinexSet};
use rx_store::{rename_into, JobQueue, StateStore};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown admin command: {0:?}")]
    Unknown(String),
    #[error("bad argument in admin command: {0}")]
    BadArgument(String),
}

/// Parsed admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    ReloadUploader,
    ForceComplete {
        site: String,
        year: u16,
        doy: u16,
    },
    Reprocess {
        site: String,
        year: u16,
        from_doy: u16,
        to_doy: u16,
    },
}

fn parse_site(token: &str) -> Result<String, CommandError> {
    if token.len() == 9 && token.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
        Ok(token.to_string())
    } else {
        Err(CommandError::BadArgument(format!("site {token:?}")))
    }
}

fn parse_num(token: &str, what: &str) -> Result<u16, CommandError> {
    token
        .parse()
        .map_err(|_| CommandError::BadArgument(format!("{what} {token:?}")))
}

impl FromStr for AdminCommand {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            ["reload", "ftpuploader"] => Ok(AdminCommand::ReloadUploader),
            ["force", "complete", site, year, doy] => Ok(AdminCommand::ForceComplete {
                site: parse_site(site)?,
                year: parse_num(year, "year")?,
                doy: parse_num(doy, "doy")?,
            }),
            ["reprocess", site, year, days] => {
                let (from_doy, to_doy) = match days.split_once('-') {
                    Some((from, to)) => (parse_num(from, "doy")?, parse_num(to, "doy")?),
                    None => {
                        let doy = parse_num(days, "doy")?;
                        (doy, doy)
                    }
                };
                if from_doy > to_doy {
                    return Err(CommandError::BadArgument(format!("doy range {days:?}")));
                }
                Ok(AdminCommand::Reprocess {
                    site: parse_site(site)?,
                    year: parse_num(year, "year")?,
                    from_doy,
                    to_doy,
                })
            }
            _ => Err(CommandError::Unknown(s.trim().to_string())),
        }
    }
}

/// Dependencies the command handlers act on.
pub struct CommandCtx {
    pub store: Arc<StateStore>,
    pub queue: JobQueue,
    pub uploader_reload: Vec<String>,
}

/// Parse and run one command body. Parse failures are surfaced to the
/// operator via the log and otherwise ignored.
pub async fn execute(ctx: &CommandCtx, body: &str) {
    let command = match body.trim().parse::<AdminCommand>() {
        Ok(command) => command,
        Err(e) => {
            error!(error = %e, "admin command rejected");
            return;
        }
    };
    info!(?command, "admin command accepted");
    match command {
        AdminCommand::ReloadUploader => reload_uploader(ctx).await,
        AdminCommand::ForceComplete { site, year, doy } => {
            force_complete(ctx, &site, year, doy).await
        }
        AdminCommand::Reprocess {
            site,
            year,
            from_doy,
            to_doy,
        } => reprocess(ctx, &site, year, from_doy, to_doy),
    }
}

async fn reload_uploader(ctx: &CommandCtx) {
    let Some((program, args)) = ctx.uploader_reload.split_first() else {
        error!("no uploader reload command configured");
        return;
    };
    match tokio::process::Command::new(program).args(args).output().await {
        Ok(output) if output.status.success() => info!("uploader reloaded"),
        Ok(output) => error!(
            code = output.status.code(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "uploader reload failed"
        ),
        Err(e) => error!(error = %e, "uploader reload did not start"),
    }
}

/// Queue a day job for an incomplete day, borrowing the interval from the
/// first hourly set present in the work directory.
pub async fn force_complete(ctx: &CommandCtx, site: &str, year: u16, doy: u16) {
    let day = match Ident::new(site.to_string(), year, doy, Hour::Day) {
        Ok(day) => day,
        Err(e) => {
            error!(site, year, doy, error = %e, "force complete with bad identity");
            return;
        }
    };

    let Some(interval) = first_hourly_interval(ctx, &day) else {
        error!(ident = %day, "force complete: no hourly set found to supply the interval");
        return;
    };

    let lock = match ctx.store.lock(&day).await {
        Ok(lock) => lock,
        Err(e) => {
            error!(ident = %day, error = %e, "force complete: day state unavailable");
            return;
        }
    };
    match lock.state() {
        Ok(state) if state.accepts_submit() => {}
        Ok(state) => {
            error!(ident = %day, %state, "force complete: day not submittable in this state");
            return;
        }
        Err(e) => {
            error!(ident = %day, error = %e, "force complete: unreadable day state");
            return;
        }
    }

    let job = JobSpec::forced_day(&day, interval, ctx.store.layout().rs_path(&day));
    if let Err(e) = lock.set(HourState::Queued) {
        error!(ident = %day, error = %e, "force complete: cannot write queued state");
        return;
    }
    match ctx.queue.emit(&job) {
        Ok(path) => info!(ident = %day, job = %path.display(), "forced day job queued"),
        Err(e) => error!(ident = %day, error = %e, "force complete: job emit failed"),
    }
}

/// Interval of the first loadable `rs.<h>.json`, scanning hours a..x.
fn first_hourly_interval(ctx: &CommandCtx, day: &Ident) -> Option<u16> {
    for h in 0..24u8 {
        let Ok(hour_ident) = Ident::new(day.site.clone(), day.year, day.doy, Hour::Of(h)) else {
            continue;
        };
        let path = ctx.store.layout().rs_path(&hour_ident);
        if !path.exists() {
            continue;
        }
        match RinexSet::load(&path) {
            Ok(set) => {
                if let Some(interval) = set.interval {
                    return Some(interval);
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "unreadable hourly set skipped"),
        }
    }
    None
}

/// Move a day range's archived uploads back into the inbound spool.
pub fn reprocess(ctx: &CommandCtx, site: &str, year: u16, from_doy: u16, to_doy: u16) {
    let layout = ctx.store.layout();
    for doy in from_doy..=to_doy {
        let save_dir = layout.save_dir(site, year, doy);
        let entries = match std::fs::read_dir(&save_dir) {
            Ok(entries) => entries,
            Err(_) => {
                warn!(site, year, doy, dir = %save_dir.display(), "nothing archived for this day");
                continue;
            }
        };
        let mut moved = 0usize;
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match rename_into(&entry.path(), &layout.incoming, &name) {
                Ok(_) => moved += 1,
                Err(e) => error!(file = name, error = %e, "reprocess move failed"),
            }
        }
        info!(site, year, doy, moved, "day returned to the inbound spool");
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
