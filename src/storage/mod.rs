mod history;
mod snapshot;

pub use history::{HistoryStore, HISTORY_HEADER};
pub use snapshot::{SnapshotRecord, SnapshotStore};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{info, warn};

use crate::{config::TrackerConfig, timer::TimerState};

/// The snapshot/history pair behind a timer.
#[derive(Debug, Clone)]
pub struct Storage {
    snapshot: SnapshotStore,
    history: HistoryStore,
}

impl Storage {
    pub fn new(snapshot: SnapshotStore, history: HistoryStore) -> Self {
        Self { snapshot, history }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(
            SnapshotStore::new(config.snapshot_path()),
            HistoryStore::new(config.history_path()),
        )
    }

    pub fn snapshot(&self) -> &SnapshotStore {
        &self.snapshot
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Flushes closed sessions to the history log, then writes the snapshot.
    /// Pending sessions stay on the timer if the append fails.
    pub fn save(&self, state: &mut TimerState, now: DateTime<Local>) -> Result<()> {
        if !state.pending_sessions().is_empty() {
            self.history
                .append(state.pending_sessions())
                .context("failed to save sessions to history")?;
            info!(
                "flushed {} session(s) to {}",
                state.pending_sessions().len(),
                self.history.path().display()
            );
            state.clear_pending();
            // The flushed sessions now live only in the log, so the timer
            // must read this store when it rebuilds its weekly total.
            let refreshed = if state.history.is_none() {
                state.attach_history(self.history.clone(), now.date_naive())
            } else {
                state.refresh_weekly_total(now.date_naive())
            };
            if let Err(err) = refreshed {
                warn!("weekly total kept from before the flush: {err:#}");
            }
        }

        self.snapshot
            .write(&SnapshotRecord::capture(state, now))
            .context("failed to save timer snapshot")
    }

    /// Restores the timer from the snapshot, or a fresh one when there is
    /// none, rolling the day over and attaching history.
    pub fn load(&self, now: DateTime<Local>) -> Result<TimerState> {
        let mut state = match self.snapshot.read()? {
            Some(record) => record.into_state(),
            None => {
                info!(
                    "no snapshot at {}; starting fresh",
                    self.snapshot.path().display()
                );
                TimerState::new()
            }
        };

        state.roll_over_day(now);
        state
            .attach_history(self.history.clone(), now.date_naive())
            .context("failed to load session history")?;
        Ok(state)
    }
}
