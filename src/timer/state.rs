use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{iso_week_key, same_iso_week, weekly_work_seconds},
    format::start_label,
    models::Session,
    storage::HistoryStore,
};

/// Sessions must run longer than this many seconds to be recorded.
pub const MIN_RECORDED_SECONDS: i64 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Working,
    OnBreak,
}

/// Everything a display needs, read under one lock.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerMetrics {
    pub status: TimerStatus,
    pub current_session_s: i64,
    pub current_break_s: i64,
    pub daily_s: i64,
    pub weekly_s: i64,
    pub yesterday_s: i64,
    pub day_first_start: String,
    pub yesterday_first_start: String,
}

/// Live timer state. Every transition takes the wall-clock `now` so callers
/// decide where time comes from.
#[derive(Debug, Clone, Default)]
pub struct TimerState {
    pub(crate) status: TimerStatus,
    pub(crate) current_session: Option<Session>,
    pub(crate) session_start: Option<DateTime<Local>>,
    pub(crate) break_start: Option<DateTime<Local>>,
    pub(crate) day_first_start: Option<DateTime<Local>>,
    pub(crate) daily_total: i64,
    pub(crate) yesterday_total: i64,
    pub(crate) yesterday_first_start: Option<DateTime<Local>>,
    /// Closed sessions not yet appended to the history log.
    pub(crate) sessions: Vec<Session>,
    pub(crate) weekly_total: i64,
    /// ISO week `weekly_total` was computed for.
    pub(crate) weekly_key: Option<(i32, u32)>,
    pub(crate) history: Option<HistoryStore>,
}

fn elapsed_seconds(from: DateTime<Local>, to: DateTime<Local>) -> i64 {
    (to - from).num_seconds()
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status != TimerStatus::Idle
    }

    pub fn is_on_break(&self) -> bool {
        self.status == TimerStatus::OnBreak
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.current_session.as_ref()
    }

    pub fn pending_sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn daily_total(&self) -> i64 {
        self.daily_total
    }

    pub fn day_first_start(&self) -> Option<DateTime<Local>> {
        self.day_first_start
    }

    pub fn yesterday_first_start(&self) -> Option<DateTime<Local>> {
        self.yesterday_first_start
    }

    /// Moves today's figures to yesterday when `now` is on a later calendar
    /// day than the first start on record. Returns whether it rolled over.
    pub fn roll_over_day(&mut self, now: DateTime<Local>) -> bool {
        let Some(first_start) = self.day_first_start else {
            return false;
        };
        if first_start.date_naive() == now.date_naive() {
            return false;
        }

        debug!(
            "day changed since {}: carrying {}s over to yesterday",
            first_start.date_naive(),
            self.daily_total
        );
        self.yesterday_total = self.daily_total;
        self.yesterday_first_start = Some(first_start);
        self.day_first_start = None;
        self.daily_total = 0;
        true
    }

    pub fn start(&mut self, now: DateTime<Local>) -> bool {
        if self.is_running() {
            return false;
        }

        self.roll_over_day(now);
        if self.day_first_start.is_none() {
            self.day_first_start = Some(now);
        }

        self.current_session = Some(Session::open(now.date_naive()));
        self.session_start = Some(now);
        self.break_start = None;
        self.status = TimerStatus::Working;
        true
    }

    /// Closes the open session. Returns it when it was long enough to keep.
    pub fn stop(&mut self, now: DateTime<Local>) -> Option<Session> {
        if !self.is_running() {
            return None;
        }
        if self.is_on_break() {
            self.stop_break(now);
        }

        let session_start = self.session_start.take();
        let session = self.current_session.take();
        self.status = TimerStatus::Idle;

        let (Some(session_start), Some(mut session)) = (session_start, session) else {
            warn!("running timer had no open session; nothing recorded");
            return None;
        };

        session.duration_s = elapsed_seconds(session_start, now).max(0);
        if session.duration_s <= MIN_RECORDED_SECONDS {
            debug!("discarding {}s session", session.duration_s);
            return None;
        }

        self.daily_total += session.work_seconds();
        self.sessions.push(session.clone());

        let today = now.date_naive();
        if let Err(err) = self.refresh_weekly_total(today) {
            warn!("weekly total updated from pending sessions only: {err:#}");
            self.add_to_weekly_cache(&session, today);
        }
        Some(session)
    }

    pub fn start_break(&mut self, now: DateTime<Local>) -> bool {
        if self.status != TimerStatus::Working {
            return false;
        }
        self.break_start = Some(now);
        self.status = TimerStatus::OnBreak;
        true
    }

    pub fn stop_break(&mut self, now: DateTime<Local>) -> bool {
        if self.status != TimerStatus::OnBreak {
            return false;
        }
        let taken = self
            .break_start
            .take()
            .map(|start| elapsed_seconds(start, now).max(0))
            .unwrap_or(0);
        if let Some(session) = self.current_session.as_mut() {
            session.break_time_s += taken;
        }
        self.status = TimerStatus::Working;
        true
    }

    /// Abandons the open session without recording it.
    pub fn reset(&mut self) -> bool {
        let was_running = self.is_running();
        self.current_session = None;
        self.session_start = None;
        self.break_start = None;
        self.status = TimerStatus::Idle;
        was_running
    }

    pub fn attach_history(&mut self, history: HistoryStore, today: NaiveDate) -> Result<()> {
        self.history = Some(history);
        self.refresh_weekly_total(today)
    }

    /// Rebuilds the weekly cache from the history log plus pending sessions.
    /// On error the cache is left untouched.
    pub fn refresh_weekly_total(&mut self, today: NaiveDate) -> Result<()> {
        let logged = match &self.history {
            Some(history) => weekly_work_seconds(&history.load_all()?, today),
            None => 0,
        };
        self.weekly_total = logged + weekly_work_seconds(&self.sessions, today);
        self.weekly_key = Some(iso_week_key(today));
        Ok(())
    }

    fn add_to_weekly_cache(&mut self, session: &Session, today: NaiveDate) {
        if self.weekly_key != Some(iso_week_key(today)) {
            self.weekly_total = 0;
            self.weekly_key = Some(iso_week_key(today));
        }
        if same_iso_week(session.date, today) {
            self.weekly_total += session.work_seconds();
        }
    }

    pub(crate) fn clear_pending(&mut self) {
        self.sessions.clear();
    }

    fn break_so_far(&self, now: DateTime<Local>) -> i64 {
        let Some(session) = self.current_session.as_ref() else {
            return 0;
        };
        let in_progress = match (self.status, self.break_start) {
            (TimerStatus::OnBreak, Some(start)) => elapsed_seconds(start, now).max(0),
            _ => 0,
        };
        session.break_time_s + in_progress
    }

    /// Break-excluded span of the open session, clamped at zero.
    fn live_work_seconds(&self, now: DateTime<Local>) -> i64 {
        match (self.is_running(), self.session_start) {
            (true, Some(start)) => {
                (elapsed_seconds(start, now) - self.break_so_far(now)).max(0)
            }
            _ => 0,
        }
    }

    pub fn current_session_time(&self, now: DateTime<Local>) -> i64 {
        self.live_work_seconds(now)
    }

    pub fn current_break_time(&self, now: DateTime<Local>) -> i64 {
        if !self.is_running() {
            return 0;
        }
        self.break_so_far(now)
    }

    pub fn daily_time(&self, now: DateTime<Local>) -> i64 {
        self.daily_total + self.live_work_seconds(now)
    }

    pub fn weekly_time(&self, now: DateTime<Local>) -> i64 {
        let today = now.date_naive();
        // A cache built in an earlier week holds nothing from this one.
        let cached = if self.weekly_key == Some(iso_week_key(today)) {
            self.weekly_total
        } else {
            0
        };
        let live = match self.current_session.as_ref() {
            Some(session) if same_iso_week(session.date, today) => self.live_work_seconds(now),
            _ => 0,
        };
        cached + live
    }

    pub fn yesterday_time(&self) -> i64 {
        self.yesterday_total
    }

    pub fn day_first_start_label(&self) -> String {
        start_label(self.day_first_start)
    }

    pub fn yesterday_first_start_label(&self) -> String {
        start_label(self.yesterday_first_start)
    }

    pub fn metrics(&self, now: DateTime<Local>) -> TimerMetrics {
        TimerMetrics {
            status: self.status,
            current_session_s: self.current_session_time(now),
            current_break_s: self.current_break_time(now),
            daily_s: self.daily_time(now),
            weekly_s: self.weekly_time(now),
            yesterday_s: self.yesterday_time(),
            day_first_start: self.day_first_start_label(),
            yesterday_first_start: self.yesterday_first_start_label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn morning() -> DateTime<Local> {
        at(2024, 3, 7, 9, 0, 0)
    }

    #[test]
    fn new_timer_is_idle() {
        let timer = TimerState::new();
        assert!(!timer.is_running());
        assert!(!timer.is_on_break());
        assert_eq!(timer.current_session_time(morning()), 0);
        assert_eq!(timer.current_break_time(morning()), 0);
        assert_eq!(timer.weekly_time(morning()), 0);
    }

    #[test]
    fn start_opens_a_session_dated_today() {
        let mut timer = TimerState::new();
        assert!(timer.start(morning()));
        assert_eq!(timer.status(), TimerStatus::Working);
        assert_eq!(
            timer.current_session().map(|s| s.date),
            Some(morning().date_naive())
        );
        assert_eq!(timer.day_first_start(), Some(morning()));
    }

    #[test]
    fn start_while_running_is_ignored() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        assert!(!timer.start(t0 + Duration::seconds(30)));
        assert_eq!(timer.current_session_time(t0 + Duration::seconds(40)), 40);
    }

    #[test]
    fn break_scenario_records_work_without_break() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        timer.start_break(t0 + Duration::seconds(3));
        timer.stop_break(t0 + Duration::seconds(4));
        let session = timer.stop(t0 + Duration::seconds(6)).expect("session recorded");

        assert_eq!(session.duration_s, 6);
        assert_eq!(session.break_time_s, 1);
        assert_eq!(session.work_seconds(), 5);
        assert_eq!(timer.pending_sessions().len(), 1);
        assert_eq!(timer.daily_total(), 5);
        assert_eq!(timer.weekly_time(t0 + Duration::seconds(6)), 5);
    }

    #[test]
    fn break_lowers_current_session_time_but_not_duration() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        timer.start_break(t0 + Duration::seconds(10));
        assert_eq!(timer.current_session_time(t0 + Duration::seconds(25)), 10);
        assert_eq!(timer.current_break_time(t0 + Duration::seconds(25)), 15);
        timer.stop_break(t0 + Duration::seconds(30));
        assert_eq!(timer.current_session().unwrap().break_time_s, 20);
        assert_eq!(timer.current_session_time(t0 + Duration::seconds(40)), 20);

        let session = timer.stop(t0 + Duration::seconds(40)).unwrap();
        assert_eq!(session.duration_s, 40);
        assert!(session.duration_s >= session.break_time_s);
    }

    #[test]
    fn stop_during_break_closes_the_break_first() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        timer.start_break(t0 + Duration::seconds(60));
        let session = timer.stop(t0 + Duration::seconds(90)).unwrap();
        assert_eq!(session.break_time_s, 30);
        assert!(!timer.is_on_break());
        assert!(!timer.is_running());
    }

    #[test]
    fn short_sessions_are_discarded() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        assert!(timer.stop(t0).is_none());
        timer.start(t0);
        assert!(timer.stop(t0 + Duration::seconds(1)).is_none());
        assert!(timer.pending_sessions().is_empty());
        assert_eq!(timer.daily_total(), 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn every_recorded_stop_adds_exactly_one_session() {
        let mut timer = TimerState::new();
        let mut now = morning();
        for round in 1..=4 {
            timer.start(now);
            now = now + Duration::seconds(5 + round);
            assert!(timer.stop(now).is_some());
            assert_eq!(timer.pending_sessions().len(), round as usize);
        }
        assert_eq!(timer.daily_total(), 6 + 7 + 8 + 9);
    }

    #[test]
    fn break_transitions_require_the_right_state() {
        let mut timer = TimerState::new();
        let t0 = morning();
        assert!(!timer.start_break(t0));
        assert!(!timer.stop_break(t0));

        timer.start(t0);
        assert!(!timer.stop_break(t0));
        assert!(timer.start_break(t0 + Duration::seconds(1)));
        assert!(!timer.start_break(t0 + Duration::seconds(2)));
        assert_eq!(timer.status(), TimerStatus::OnBreak);
    }

    #[test]
    fn reset_discards_the_open_session() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        timer.start_break(t0 + Duration::seconds(100));
        assert!(timer.reset());
        assert!(!timer.is_running());
        assert!(!timer.is_on_break());
        assert!(timer.current_session().is_none());
        assert!(timer.pending_sessions().is_empty());
        assert_eq!(timer.daily_time(t0 + Duration::seconds(200)), 0);
        assert!(!timer.reset());
    }

    #[test]
    fn daily_time_includes_the_live_session() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        timer.stop(t0 + Duration::seconds(100));
        timer.start(t0 + Duration::seconds(200));
        assert_eq!(timer.daily_time(t0 + Duration::seconds(250)), 150);
    }

    #[test]
    fn start_on_a_new_day_rolls_totals_to_yesterday() {
        let mut timer = TimerState::new();
        let yesterday = at(2024, 3, 6, 8, 30, 0);
        timer.start(yesterday);
        timer.stop(yesterday + Duration::minutes(90));

        let today = at(2024, 3, 7, 10, 0, 0);
        timer.start(today);

        assert_eq!(timer.yesterday_time(), 90 * 60);
        assert_eq!(timer.yesterday_first_start(), Some(yesterday));
        assert_eq!(timer.yesterday_first_start_label(), "08:30");
        assert_eq!(timer.daily_total(), 0);
        assert_eq!(timer.day_first_start(), Some(today));
        assert_eq!(timer.day_first_start_label(), "10:00");
    }

    #[test]
    fn first_start_stays_fixed_within_the_day() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        timer.stop(t0 + Duration::minutes(5));
        timer.start(t0 + Duration::hours(3));
        assert_eq!(timer.day_first_start(), Some(t0));
    }

    #[test]
    fn live_work_is_clamped_at_zero() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        timer.current_session.as_mut().unwrap().break_time_s = 500;
        assert_eq!(timer.current_session_time(t0 + Duration::seconds(10)), 0);
        assert_eq!(timer.daily_time(t0 + Duration::seconds(10)), 0);
        assert_eq!(timer.weekly_time(t0 + Duration::seconds(10)), 0);
    }

    #[test]
    fn weekly_cache_from_an_earlier_week_is_not_counted() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        timer.stop(t0 + Duration::seconds(120));
        assert_eq!(timer.weekly_time(t0 + Duration::seconds(120)), 120);
        assert_eq!(timer.weekly_time(t0 + Duration::days(7)), 0);
    }

    #[test]
    fn metrics_bundle_all_queries() {
        let mut timer = TimerState::new();
        let t0 = morning();
        timer.start(t0);
        timer.start_break(t0 + Duration::seconds(30));
        let metrics = timer.metrics(t0 + Duration::seconds(45));
        assert_eq!(metrics.status, TimerStatus::OnBreak);
        assert_eq!(metrics.current_session_s, 30);
        assert_eq!(metrics.current_break_s, 15);
        assert_eq!(metrics.daily_s, 30);
        assert_eq!(metrics.weekly_s, 30);
        assert_eq!(metrics.yesterday_s, 0);
        assert_eq!(metrics.day_first_start, "09:00");
        assert_eq!(metrics.yesterday_first_start, "--:--");
    }

    #[test]
    fn unreadable_history_falls_back_to_incremental_weekly_total() {
        let temp = tempfile::tempdir().unwrap();
        let mut timer = TimerState::new();
        let t0 = morning();
        // A directory is not a readable log.
        assert!(timer
            .attach_history(HistoryStore::new(temp.path()), t0.date_naive())
            .is_err());

        timer.start(t0);
        timer.stop(t0 + Duration::seconds(50));
        assert_eq!(timer.weekly_time(t0 + Duration::seconds(50)), 50);
    }
}
