use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use crate::{config::TrackerConfig, format::format_hms, storage::Storage};

use super::{Poller, TimerMetrics, TimerState, TimerStatus};

/// Single owner of the live timer. Every mutation and every read goes
/// through one lock, and each mutation is saved before the lock is released.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    storage: Storage,
    poller: Arc<Mutex<Poller>>,
    poll_interval: Duration,
}

impl TimerController {
    pub fn new(state: TimerState, storage: Storage, poll_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            storage,
            poller: Arc::new(Mutex::new(Poller::new())),
            poll_interval,
        }
    }

    /// Restores the timer from disk. Load errors are returned to the caller.
    pub fn open(config: &TrackerConfig) -> Result<Self> {
        let storage = Storage::from_config(config);
        let state = storage.load(Local::now()).with_context(|| {
            format!(
                "failed to restore timer from {}",
                storage.snapshot().path().display()
            )
        })?;

        info!(
            "timer restored ({:?}); history at {}",
            state.status(),
            storage.history().path().display()
        );
        Ok(Self::new(state, storage, config.poll_interval()))
    }

    /// Like [`open`](Self::open), but a corrupt snapshot or history log
    /// yields a fresh timer instead of an error.
    pub fn open_or_fresh(config: &TrackerConfig) -> Self {
        match Self::open(config) {
            Ok(controller) => controller,
            Err(err) => {
                error!("Error loading timer state: {err:#}");
                let storage = Storage::from_config(config);
                let mut state = TimerState::new();
                if let Err(err) =
                    state.attach_history(storage.history().clone(), Local::now().date_naive())
                {
                    warn!("weekly total unavailable until the history log is fixed: {err:#}");
                }
                Self::new(state, storage, config.poll_interval())
            }
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn metrics(&self) -> TimerMetrics {
        let guard = self.state.lock().await;
        guard.metrics(Local::now())
    }

    pub async fn status(&self) -> TimerStatus {
        self.state.lock().await.status()
    }

    pub async fn start(&self) -> Result<TimerMetrics> {
        self.apply("start", |state, now| state.start(now)).await
    }

    pub async fn stop(&self) -> Result<TimerMetrics> {
        self.apply("stop", |state, now| {
            let was_running = state.is_running();
            if let Some(session) = state.stop(now) {
                info!(
                    "recorded session on {}: {} worked, {} on break",
                    session.date,
                    format_hms(session.work_seconds()),
                    format_hms(session.break_time_s)
                );
            }
            was_running
        })
        .await
    }

    pub async fn start_break(&self) -> Result<TimerMetrics> {
        self.apply("start_break", |state, now| state.start_break(now))
            .await
    }

    pub async fn stop_break(&self) -> Result<TimerMetrics> {
        self.apply("stop_break", |state, now| state.stop_break(now))
            .await
    }

    /// Ends the break when on one, starts one otherwise.
    pub async fn toggle_break(&self) -> Result<TimerMetrics> {
        self.apply("toggle_break", |state, now| {
            if state.is_on_break() {
                state.stop_break(now)
            } else {
                state.start_break(now)
            }
        })
        .await
    }

    /// Cancels the running session. Nothing is written to history.
    pub async fn reset(&self) -> Result<TimerMetrics> {
        self.apply("reset", |state, _| {
            let discarded = state.reset();
            if discarded {
                info!("running session cancelled without saving");
            }
            discarded
        })
        .await
    }

    async fn apply<F>(&self, action: &str, transition: F) -> Result<TimerMetrics>
    where
        F: FnOnce(&mut TimerState, DateTime<Local>) -> bool,
    {
        let mut guard = self.state.lock().await;
        let now = Local::now();
        if !transition(&mut guard, now) {
            debug!("{action} ignored while {:?}", guard.status());
        }
        self.storage
            .save(&mut guard, now)
            .with_context(|| format!("failed to save timer after {action}"))?;
        Ok(guard.metrics(now))
    }

    /// Starts publishing metrics to `sink` at the configured interval.
    pub async fn spawn_poller<F>(&self, sink: F) -> Result<()>
    where
        F: FnMut(TimerMetrics) + Send + 'static,
    {
        self.poller
            .lock()
            .await
            .start(self.state.clone(), self.poll_interval, sink)
    }

    /// Stops the poller and writes one last snapshot.
    pub async fn shutdown(&self) -> Result<()> {
        let poller_result = self.poller.lock().await.stop().await;

        {
            let mut guard = self.state.lock().await;
            self.storage
                .save(&mut guard, Local::now())
                .context("failed to save timer on shutdown")?;
        }

        info!("timer shut down");
        poller_result
    }
}
