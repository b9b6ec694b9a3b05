use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::warn;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{
    models::Session,
    timer::{TimerState, TimerStatus},
};

/// On-disk shape of the live timer. `current_time` and `weekly_time` are
/// written for anyone reading the file but recomputed on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotRecord {
    pub is_running: bool,
    pub is_on_break: bool,
    pub current_session: Option<Session>,
    pub break_start: Option<DateTime<Local>>,
    pub session_start: Option<DateTime<Local>>,
    pub day_first_start: Option<DateTime<Local>>,
    pub daily_total: i64,
    pub yesterday_total: i64,
    pub yesterday_first_start: Option<DateTime<Local>>,
    #[serde(skip_deserializing)]
    pub current_time: i64,
    #[serde(skip_deserializing)]
    pub weekly_time: i64,
}

impl SnapshotRecord {
    pub fn capture(state: &TimerState, now: DateTime<Local>) -> Self {
        Self {
            is_running: state.is_running(),
            is_on_break: state.is_on_break(),
            current_session: state.current_session.clone(),
            break_start: state.break_start,
            session_start: state.session_start,
            day_first_start: state.day_first_start,
            daily_total: state.daily_total,
            yesterday_total: state.yesterday_total,
            yesterday_first_start: state.yesterday_first_start,
            current_time: state.current_session_time(now),
            weekly_time: state.weekly_time(now),
        }
    }

    /// Rebuilds a detached timer. History and the weekly cache are attached
    /// by the caller.
    pub fn into_state(self) -> TimerState {
        let mut state = TimerState {
            day_first_start: self.day_first_start,
            daily_total: self.daily_total,
            yesterday_total: self.yesterday_total,
            yesterday_first_start: self.yesterday_first_start,
            ..TimerState::default()
        };

        if !self.is_running {
            return state;
        }
        let Some(session_start) = self.session_start else {
            warn!("snapshot marked running without a session start; restoring idle");
            return state;
        };

        state.session_start = Some(session_start);
        state.current_session = Some(
            self.current_session
                .unwrap_or_else(|| Session::open(session_start.date_naive())),
        );
        state.status = match (self.is_on_break, self.break_start) {
            (true, Some(break_start)) => {
                state.break_start = Some(break_start);
                TimerStatus::OnBreak
            }
            (true, None) => {
                warn!("snapshot marked on break without a break start; resuming work");
                TimerStatus::Working
            }
            (false, _) => TimerStatus::Working,
        };
        state
    }
}

/// Single JSON document holding the live timer state.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Option<SnapshotRecord>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read snapshot {}", self.path.display()))
            }
        };
        let record = serde_json::from_str(&contents)
            .with_context(|| format!("malformed snapshot {}", self.path.display()))?;
        Ok(Some(record))
    }

    /// Writes through a temp file in the same directory so a crash never
    /// leaves a half-written snapshot behind.
    pub fn write(&self, record: &SnapshotRecord) -> Result<()> {
        let serialized = serde_json::to_string_pretty(record)?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create snapshot directory {}", parent.display())
        })?;

        let mut temp_file = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        temp_file.write_all(serialized.as_bytes())?;
        temp_file.flush()?;
        temp_file
            .persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to write snapshot {}", self.path.display()))?;
        Ok(())
    }
}
