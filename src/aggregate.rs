//! Weekly totals over closed sessions.
//!
//! The history log is a plain CSV file that people edit by hand, so the sum
//! skips rows outside the current ISO week and rows whose work time is not
//! positive instead of failing.

use chrono::{Datelike, NaiveDate};

use crate::models::Session;

/// ISO (year, week) pair. Comparing both avoids matching week 1 of one year
/// against week 1 of another.
pub fn iso_week_key(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

pub fn same_iso_week(a: NaiveDate, b: NaiveDate) -> bool {
    iso_week_key(a) == iso_week_key(b)
}

fn in_week(session: &Session, today: NaiveDate) -> bool {
    same_iso_week(session.date, today)
}

fn has_positive_work(session: &Session) -> bool {
    session.duration_s - session.break_time_s > 0
}

/// Work seconds of every session that falls in `today`'s ISO week.
pub fn weekly_work_seconds<'a, I>(sessions: I, today: NaiveDate) -> i64
where
    I: IntoIterator<Item = &'a Session>,
{
    sessions
        .into_iter()
        .filter(|session| in_week(session, today))
        .filter(|session| has_positive_work(session))
        .map(Session::work_seconds)
        .sum()
}
