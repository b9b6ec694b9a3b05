use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DATA_DIR_ENV: &str = "TIMETRACKER_DATA_DIR";
pub const POLL_MS_ENV: &str = "TIMETRACKER_POLL_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub data_dir: PathBuf,
    pub snapshot_file: String,
    pub history_file: String,
    pub poll_interval_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            snapshot_file: "current_session.json".into(),
            history_file: "sessions.csv".into(),
            poll_interval_ms: 250,
        }
    }
}

impl TrackerConfig {
    /// Reads settings from `path` when it exists, then applies environment
    /// overrides. A malformed file falls back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("ignoring malformed settings {}: {err}", path.display());
                Self::default()
            })
        } else {
            Self::default()
        };

        Ok(config.with_env_overrides(|key| env::var(key).ok()))
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| env::var(key).ok())
    }

    fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(POLL_MS_ENV) {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => self.poll_interval_ms = ms,
                _ => warn!("ignoring {POLL_MS_ENV}={raw}: expected a positive integer"),
            }
        }
        self
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}
