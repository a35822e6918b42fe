// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! One TOML file serves both binaries. A missing or unparsable file is fatal
//! at startup.

use crate::decoder::DecoderConfig;
use rx_store::Layout;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// The four spool roots. All must reside on one filesystem.
#[derive(Debug, Clone, Deserialize)]
pub struct DirsConfig {
    pub incoming: PathBuf,
    pub savedir: PathBuf,
    pub workdir: PathBuf,
    pub jobqueue: PathBuf,
}

/// SQLite database holding `locations` and `gpssums`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of unpack workers.
    pub unpack_workers: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { unpack_workers: 4 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of worker processes.
    pub instances: usize,
    /// Sleep between pool teardown and restart after a fatal result.
    pub fatal_backoff_secs: u64,
    /// Processor argv for `ftp` jobs; job JSON arrives on stdin.
    pub processor_ftp: Vec<String>,
    /// Processor argv for `hour2daily` jobs.
    pub processor_hour2daily: Vec<String>,
    /// Argv that reloads the external uploader service.
    pub uploader_reload: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instances: 2,
            fatal_backoff_secs: 300,
            processor_ftp: vec!["rxprocess-ftp".to_string()],
            processor_hour2daily: vec!["rxprocess-hour2daily".to_string()],
            uploader_reload: vec![
                "systemctl".to_string(),
                "reload".to_string(),
                "ftpuploader".to_string(),
            ],
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/rxspool")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub dirs: DirsConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub decoders: DecoderConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn layout(&self) -> Layout {
        Layout {
            incoming: self.dirs.incoming.clone(),
            savedir: self.dirs.savedir.clone(),
            workdir: self.dirs.workdir.clone(),
            jobqueue: self.dirs.jobqueue.clone(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
