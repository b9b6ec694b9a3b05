use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One work interval. Open while the timer runs, frozen once it lands in the
/// history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub date: NaiveDate,
    pub duration_s: i64,
    pub break_time_s: i64,
}

impl Session {
    pub fn open(date: NaiveDate) -> Self {
        Self {
            date,
            duration_s: 0,
            break_time_s: 0,
        }
    }

    /// Duration minus breaks. Never negative: history rows edited by hand (or
    /// a break that outlived the session clock) yield zero.
    pub fn work_seconds(&self) -> i64 {
        (self.duration_s - self.break_time_s).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_seconds_excludes_breaks() {
        let session = Session {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            duration_s: 600,
            break_time_s: 120,
        };
        assert_eq!(session.work_seconds(), 480);
    }

    #[test]
    fn work_seconds_clamps_at_zero() {
        let session = Session {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            duration_s: 10,
            break_time_s: 25,
        };
        assert_eq!(session.work_seconds(), 0);
    }

    #[test]
    fn serializes_date_as_iso_day() {
        let session = Session::open(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["date"], "2024-01-09");
        assert_eq!(json["duration_s"], 0);
        assert_eq!(json["break_time_s"], 0);
    }
}
