// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unpack pool.
//!
//! N workers drain a shared channel of decode requests. Multi-file uploads
//! (long-form RINEX) are decompressed and reported to the pending
//! aggregator; single-file uploads (raw SBF, receiver zips) are decoded,
//! renamed into canonical form and submitted directly, all under the hour's
//! state lock.
//!
//! Decoder failures are terminal for the file but never for the worker: the
//! hour's state is reset to `none`, the upload stays in the archive for
//! manual action, and the worker moves on.

use crate::pending::{promote_unpack, PendingMsg};
use rx_adapters::{DecodeError, Decoders};
use rx_core::{
    legacy_category, Clock, FileCategory, HourState, Ident, JobSpec, RinexSet, UploadKind,
    UploadName,
};
use rx_store::{HourLock, JobQueue, StateStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One decode request, produced by the inbound dispatcher.
#[derive(Debug)]
pub struct UnpackRequest {
    /// Archived upload under `SAVEDIR/<site>/<year>/<doy>/`.
    pub saved_path: PathBuf,
    /// Parsed inbound name.
    pub name: UploadName,
    /// Canonical 9-character site, resolved through the catalog.
    pub site: String,
    /// Observation interval from the catalog (or the filename).
    pub interval: u16,
}

/// Shared dependencies of every unpack worker.
pub struct UnpackCtx {
    pub store: Arc<StateStore>,
    pub queue: JobQueue,
    pub decoders: Decoders,
    pub pending_tx: mpsc::Sender<PendingMsg>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Error)]
enum UnpackError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Set(#[from] rx_core::SetError),
    #[error(transparent)]
    Job(#[from] rx_core::JobError),
    #[error(transparent)]
    State(#[from] rx_store::StateError),
    #[error(transparent)]
    Queue(#[from] rx_store::QueueError),
}

/// Spawn `count` workers draining a shared unbounded channel.
pub fn spawn_pool(
    count: usize,
    ctx: Arc<UnpackCtx>,
) -> (mpsc::UnboundedSender<UnpackRequest>, Vec<JoinHandle<()>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let handles = (0..count.max(1))
        .map(|worker| {
            let rx = Arc::clone(&rx);
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                loop {
                    let request = { rx.lock().await.recv().await };
                    match request {
                        Some(request) => handle_request(&ctx, request).await,
                        None => break,
                    }
                }
                debug!(worker, "unpack worker drained");
            })
        })
        .collect();
    (tx, handles)
}

/// Decode one upload. Never propagates: every exit path logs.
pub async fn handle_request(ctx: &UnpackCtx, request: UnpackRequest) {
    let ident = match Ident::new(
        request.site.clone(),
        request.name.year,
        request.name.doy,
        request.name.hour,
    ) {
        Ok(ident) => ident,
        Err(e) => {
            error!(path = %request.saved_path.display(), error = %e, "unpack request with bad identity");
            return;
        }
    };

    match request.name.kind {
        UploadKind::SeptentrioRnx3 => handle_rnx3(ctx, &request, &ident).await,
        UploadKind::SeptentrioRaw | UploadKind::TrimbleZip | UploadKind::LeicaZip => {
            handle_single_file(ctx, &request, &ident).await
        }
    }
}

/// Long-form RINEX: decompress into the staging area and hand the file to
/// the pending aggregator. State is not touched here.
async fn handle_rnx3(ctx: &UnpackCtx, request: &UnpackRequest, ident: &Ident) {
    let unpack_dir = ctx.store.layout().unpack_dir(ident);
    let basename = file_name_of(&request.saved_path);

    let staged = if basename.to_lowercase().ends_with(".gz") {
        ctx.decoders.gunzip(&request.saved_path, &unpack_dir).await
    } else {
        copy_into(&request.saved_path, &unpack_dir).map_err(DecodeError::Io)
    };
    let staged = match staged {
        Ok(path) => path,
        Err(e) => {
            error!(ident = %ident, file = basename, error = %e, "decode failed; file kept in archive");
            return;
        }
    };

    let msg = PendingMsg::Add {
        ident: ident.clone(),
        file: file_name_of(&staged),
        orig: basename,
    };
    if ctx.pending_tx.send(msg).await.is_err() {
        warn!(ident = %ident, "pending aggregator gone; dropping add");
    }
}

/// Raw SBF and zip uploads carry a whole hour: decode, build the set and
/// submit under the state lock.
async fn handle_single_file(ctx: &UnpackCtx, request: &UnpackRequest, ident: &Ident) {
    let lock = match ctx.store.lock(ident).await {
        Ok(lock) => lock,
        Err(e) => {
            warn!(ident = %ident, error = %e, "state lock unavailable; upload left for rescan");
            return;
        }
    };
    let state = match lock.state() {
        Ok(state) => state,
        Err(e) => {
            error!(ident = %ident, error = %e, "unreadable state file");
            return;
        }
    };
    if !state.accepts_submit() {
        warn!(ident = %ident, %state, "hour already owned by the engine; upload ignored");
        return;
    }

    match unpack_and_submit(ctx, request, ident, &lock).await {
        Ok(true) => {}
        Ok(false) => {
            // Day job took the day while we were decoding.
            warn!(ident = %ident, "day job underway; hour abandoned (reprocess to redo)");
        }
        Err(e) => {
            error!(ident = %ident, error = %e, "unpack failed; file kept in archive for manual action");
            if let Err(reset_err) = lock.set(HourState::None) {
                error!(ident = %ident, error = %reset_err, "cannot reset state after failure");
            }
        }
    }
}

/// Returns `Ok(false)` when the hour was abandoned because the day job is
/// already queued or running.
async fn unpack_and_submit(
    ctx: &UnpackCtx,
    request: &UnpackRequest,
    ident: &Ident,
    lock: &HourLock,
) -> Result<bool, UnpackError> {
    let layout = ctx.store.layout();
    let unpack_dir = layout.unpack_dir(ident);
    let now = ctx.clock.epoch_secs();

    let rs_path = layout.rs_path(ident);
    let mut set = if rs_path.exists() {
        let mut loaded = RinexSet::load(&rs_path)?;
        loaded.touch(now);
        loaded
    } else {
        RinexSet::new(ident, now)
    };
    set.interval = Some(request.interval);

    match request.name.kind {
        UploadKind::SeptentrioRaw => {
            let country = &request.site[6..9];
            ctx.decoders
                .sbf2rin(&request.saved_path, &unpack_dir, country)
                .await?;
            attach_by_convention(&mut set, &unpack_dir, now)?;
        }
        UploadKind::TrimbleZip | UploadKind::LeicaZip => {
            ctx.decoders
                .unzip(&request.saved_path, &unpack_dir)
                .await?;
            normalize_members(ctx, &mut set, &unpack_dir, now).await?;
            set.zipfile = Some(request.saved_path.clone());
        }
        UploadKind::SeptentrioRnx3 => unreachable!("multi-file uploads take the pending path"),
    }
    set.push_orig(file_name_of(&request.saved_path));

    if !ident.is_day() && ctx.store.peek(&ident.day())?.is_active() {
        return Ok(false);
    }

    promote_unpack(&unpack_dir, &layout.work_dir_for(ident)).map_err(|source| {
        UnpackError::Io {
            path: unpack_dir.clone(),
            source,
        }
    })?;
    set.save(&rs_path)?;
    let job = JobSpec::for_set(&set, rs_path)?;
    lock.set(HourState::Queued)?;
    let job_path = ctx.queue.emit(&job)?;
    info!(ident = %ident, job = %job_path.display(), "hour unpacked and submitted");
    Ok(true)
}

/// Attach every decoder-produced file in the staging area by its canonical
/// name suffix. Files that fit no slot are logged and skipped.
fn attach_by_convention(
    set: &mut RinexSet,
    unpack_dir: &Path,
    now: u64,
) -> Result<(), UnpackError> {
    let entries = std::fs::read_dir(unpack_dir).map_err(|source| UnpackError::Io {
        path: unpack_dir.to_path_buf(),
        source,
    })?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Err(e) = set.attach(&name, now) {
            debug!(file = name, error = %e, "decoder by-product ignored");
        }
    }
    Ok(())
}

/// Bring zip members into canonical shape: gunzip, Hatanaka-decompress,
/// then rename by the legacy short-code → long-type map.
async fn normalize_members(
    ctx: &UnpackCtx,
    set: &mut RinexSet,
    unpack_dir: &Path,
    now: u64,
) -> Result<(), UnpackError> {
    let entries = std::fs::read_dir(unpack_dir).map_err(|source| UnpackError::Io {
        path: unpack_dir.to_path_buf(),
        source,
    })?;
    let members: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .collect();

    for member in members {
        let mut path = member;
        if file_name_of(&path).to_lowercase().ends_with(".gz") {
            let decoded = ctx.decoders.gunzip(&path, unpack_dir).await?;
            std::fs::remove_file(&path).map_err(|source| UnpackError::Io {
                path: path.clone(),
                source,
            })?;
            path = decoded;
        }
        if is_hatanaka(&path) {
            let decoded = ctx.decoders.crx2rnx(&path).await?;
            std::fs::remove_file(&path).map_err(|source| UnpackError::Io {
                path: path.clone(),
                source,
            })?;
            path = decoded;
        }

        let Some(category) = member_category(&path) else {
            debug!(file = %path.display(), "zip member with no mapped type; ignored");
            continue;
        };
        let canonical = set.canonical_name(category)?;
        let dest = unpack_dir.join(&canonical);
        std::fs::rename(&path, &dest).map_err(|source| UnpackError::Io {
            path: dest.clone(),
            source,
        })?;
        set.attach(&canonical, now)?;
    }
    Ok(())
}

/// Hatanaka-compressed members: `.crx` or the legacy `.YYd` shape.
fn is_hatanaka(path: &Path) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
        return false;
    };
    let bytes = ext.as_bytes();
    ext == "crx"
        || (bytes.len() == 3
            && bytes[0].is_ascii_digit()
            && bytes[1].is_ascii_digit()
            && bytes[2] == b'd')
}

/// Category of a zip member, from its legacy extension letter
/// (`abcd152a.19o` → observation) or a canonical long-form suffix.
fn member_category(path: &Path) -> Option<FileCategory> {
    let name = file_name_of(path);
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    if ext == "rnx" {
        // Already canonical; attach() will slot it by suffix.
        let upper = name.to_uppercase();
        if upper.ends_with("_MO.RNX") {
            return Some(FileCategory::Observation);
        }
        return upper
            .rfind('_')
            .and_then(|i| upper.get(i + 1..i + 3))
            .and_then(rx_core::NavCode::from_code)
            .map(FileCategory::Navigation);
    }
    let bytes = ext.as_bytes();
    if bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1].is_ascii_digit() {
        return legacy_category(ext.chars().last()?);
    }
    None
}

fn copy_into(src: &Path, dest_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(src.file_name().unwrap_or_default());
    std::fs::copy(src, &dest)?;
    Ok(dest)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "unpack_tests.rs"]
mod tests;
