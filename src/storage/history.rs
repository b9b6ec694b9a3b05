use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::debug;

use crate::models::Session;

pub const HISTORY_HEADER: &str = "date,duration_s,break_time_s";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Append-only CSV log of closed sessions.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

fn parse_row(line: &str) -> Option<Session> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [date, duration, break_time] = fields.as_slice() else {
        return None;
    };
    Some(Session {
        date: NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?,
        duration_s: duration.parse().ok()?,
        break_time_s: break_time.parse().ok()?,
    })
}

fn format_row(session: &Session) -> String {
    format!(
        "{},{},{}",
        session.date.format(DATE_FORMAT),
        session.duration_s,
        session.break_time_s
    )
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row per session, writing the header first when the log is
    /// new. Data is synced before returning so callers may drop their copy.
    pub fn append(&self, sessions: &[Session]) -> Result<()> {
        if sessions.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create history directory {}", parent.display())
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open history log {}", self.path.display()))?;
        let is_empty = file
            .metadata()
            .with_context(|| format!("failed to stat history log {}", self.path.display()))?
            .len()
            == 0;

        let mut writer = BufWriter::new(file);
        if is_empty {
            writeln!(writer, "{HISTORY_HEADER}")?;
        }
        for session in sessions {
            writeln!(writer, "{}", format_row(session))?;
        }
        let file = writer
            .into_inner()
            .map_err(|err| err.into_error())
            .with_context(|| format!("failed to write history log {}", self.path.display()))?;
        file.sync_data()
            .with_context(|| format!("failed to sync history log {}", self.path.display()))?;

        debug!(
            "appended {} session(s) to {}",
            sessions.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Reads every well-formed row. The first line is the header; rows that
    /// don't parse, including rows that are not valid UTF-8, are skipped so a
    /// hand-edited log stays usable.
    pub fn load_all(&self) -> Result<Vec<Session>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read history log {}", self.path.display())
                })
            }
        };

        let mut sessions = Vec::new();
        let mut skipped = 0usize;
        for raw in bytes.split(|byte| *byte == b'\n').skip(1) {
            let Ok(line) = std::str::from_utf8(raw) else {
                skipped += 1;
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_row(line) {
                Some(session) => sessions.push(session),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!(
                "skipped {skipped} malformed row(s) in {}",
                self.path.display()
            );
        }
        Ok(sessions)
    }
}
