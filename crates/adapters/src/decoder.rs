// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External decoder subprocesses.
//!
//! All decoding goes through opaque child processes (`gunzip`, `unzip`,
//! `crx2rnx`, `sbf2rin`) with explicit argument vectors. A non-zero exit is
//! terminal for the file being decoded; the worker survives it.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default timeout for a single decode subprocess.
pub const DECODE_TIMEOUT: Duration = Duration::from_secs(300);

/// Paths of the decoder binaries. Bare names resolve through `PATH`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub gunzip: PathBuf,
    pub unzip: PathBuf,
    pub crx2rnx: PathBuf,
    pub sbf2rin: PathBuf,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            gunzip: PathBuf::from("gunzip"),
            unzip: PathBuf::from("unzip"),
            crx2rnx: PathBuf::from("crx2rnx"),
            sbf2rin: PathBuf::from("sbf2rin"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{tool} failed to spawn: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} exited with {code:?}: {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{tool} timed out after {}s", .timeout.as_secs())]
    Timeout { tool: String, timeout: Duration },
    #[error("decode output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run a decoder with a timeout, mapping failure exits to terminal errors.
async fn run_decoder(mut cmd: Command, tool: &str) -> Result<Output, DecodeError> {
    let result = tokio::time::timeout(DECODE_TIMEOUT, cmd.output()).await;
    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(DecodeError::Spawn {
                tool: tool.to_string(),
                source,
            })
        }
        Err(_elapsed) => {
            return Err(DecodeError::Timeout {
                tool: tool.to_string(),
                timeout: DECODE_TIMEOUT,
            })
        }
    };
    if !output.status.success() {
        return Err(DecodeError::Failed {
            tool: tool.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Decoder front end bound to configured binary paths.
#[derive(Debug, Clone)]
pub struct Decoders {
    config: DecoderConfig,
}

impl Decoders {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Decompress `src` into `dest_dir`, stripping the `.gz` suffix.
    /// The source file is left untouched (`gunzip -c`).
    pub async fn gunzip(&self, src: &Path, dest_dir: &Path) -> Result<PathBuf, DecodeError> {
        let mut cmd = Command::new(&self.config.gunzip);
        cmd.arg("-c").arg(src);
        let output = run_decoder(cmd, "gunzip").await?;

        let stem = src
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(stem);
        tokio::fs::write(&dest, &output.stdout).await?;
        Ok(dest)
    }

    /// Extract a zip archive into `dest_dir`.
    pub async fn unzip(&self, src: &Path, dest_dir: &Path) -> Result<(), DecodeError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let mut cmd = Command::new(&self.config.unzip);
        cmd.arg("-o").arg("-qq").arg(src).arg("-d").arg(dest_dir);
        run_decoder(cmd, "unzip").await?;
        Ok(())
    }

    /// Convert a Hatanaka-compressed observation file to plain RINEX.
    ///
    /// The tool writes a sibling: `.crx` becomes `.rnx`, the legacy `.YYd`
    /// shape becomes `.YYo`. Returns the produced path.
    pub async fn crx2rnx(&self, src: &Path) -> Result<PathBuf, DecodeError> {
        let mut cmd = Command::new(&self.config.crx2rnx);
        cmd.arg("-f").arg(src);
        run_decoder(cmd, "crx2rnx").await?;

        let dest = hatanaka_output(src);
        if !dest.exists() {
            return Err(DecodeError::Failed {
                tool: "crx2rnx".to_string(),
                code: None,
                stderr: format!("expected output {} missing", dest.display()),
            });
        }
        Ok(dest)
    }

    /// Convert a raw SBF capture into RINEX files inside `dest_dir`.
    /// `country` is the 3-letter agency code embedded in output names.
    pub async fn sbf2rin(
        &self,
        src: &Path,
        dest_dir: &Path,
        country: &str,
    ) -> Result<(), DecodeError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let mut cmd = Command::new(&self.config.sbf2rin);
        cmd.arg("-f")
            .arg(src)
            .arg("-o")
            .arg(dest_dir)
            .arg("-R3")
            .arg("-c")
            .arg(country);
        run_decoder(cmd, "sbf2rin").await?;
        Ok(())
    }
}

/// Sibling path `crx2rnx` produces for a given input.
fn hatanaka_output(src: &Path) -> PathBuf {
    let ext = src
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let bytes = ext.as_bytes();
    if bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1].is_ascii_digit() && bytes[2] == b'd'
    {
        src.with_extension(format!("{}o", &ext[..2]))
    } else {
        src.with_extension("rnx")
    }
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
