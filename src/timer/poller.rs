use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{TimerMetrics, TimerState};

// Ticks arrive every few hundred milliseconds; keep per-tick output at debug.
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Owns the periodic reader task. The task only reads metrics; it never
/// mutates the timer or touches storage.
pub struct Poller {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Poller {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start<F>(
        &mut self,
        state: Arc<Mutex<TimerState>>,
        interval: Duration,
        sink: F,
    ) -> Result<()>
    where
        F: FnMut(TimerMetrics) + Send + 'static,
    {
        if self.handle.is_some() {
            bail!("poller already active");
        }
        if interval.is_zero() {
            bail!("poll interval must be greater than zero");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(state, interval, cancel_token.clone(), sink));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Signals the task and waits for it to finish its current tick.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let Some(handle) = self.handle.take() else {
            log_warn!("poller stop requested but no poller was running");
            return Ok(());
        };

        handle
            .await
            .map_err(|err| {
                log_error!("poller task ended abnormally: {err}");
                err
            })
            .context("poller task failed to join")
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn poll_loop<F>(
    state: Arc<Mutex<TimerState>>,
    interval: Duration,
    cancel_token: CancellationToken,
    mut sink: F,
) where
    F: FnMut(TimerMetrics),
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("timer poller stopping after {ticks} tick(s)");
                break;
            }
            _ = ticker.tick() => {
                let metrics = {
                    let guard = state.lock().await;
                    guard.metrics(Local::now())
                };
                ticks = ticks.wrapping_add(1);
                log_debug!(
                    "poll {ticks}: session {}s, break {}s, week {}s",
                    metrics.current_session_s,
                    metrics.current_break_s,
                    metrics.weekly_s
                );
                sink(metrics);
            }
        }
    }
}
