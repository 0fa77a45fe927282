//! Application configuration.
//!
//! Loaded from a YAML file; every field has a serde default so a partial or
//! absent file yields a working configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Thresholds for the health scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Days without an update before a task counts as stale.
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,

    /// Hours before the due date inside which progress is checked.
    #[serde(default = "default_lookahead_hours")]
    pub lookahead_hours: i64,

    /// A task is at risk when `progress < ratio * expected`, where expected
    /// is the linear elapsed-time estimate. 1.0 means exactly on the line.
    #[serde(default = "default_min_progress_ratio")]
    pub min_progress_ratio: f64,
}

fn default_stale_after_days() -> i64 {
    7
}

fn default_lookahead_hours() -> i64 {
    48
}

fn default_min_progress_ratio() -> f64 {
    1.0
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            stale_after_days: default_stale_after_days(),
            lookahead_hours: default_lookahead_hours(),
            min_progress_ratio: default_min_progress_ratio(),
        }
    }
}

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the tasks data file. Defaults to `tasks.json` under the
    /// user data directory.
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    #[serde(default)]
    pub health: HealthConfig,
}

impl AppConfig {
    /// Load from an explicit path, or from the default location when none
    /// is given. A missing file yields defaults; a malformed file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// `<config dir>/propel/config.yaml`.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("propel").join("config.yaml"))
    }

    /// Resolve the data file: explicit config value, else
    /// `<data dir>/propel/tasks.json`, else `./tasks.json`.
    pub fn resolve_data_file(&self) -> PathBuf {
        if let Some(path) = &self.data_file {
            return path.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("propel").join("tasks.json"))
            .unwrap_or_else(|| PathBuf::from("tasks.json"))
    }
}
