//! Civil-time helpers. All poll scheduling is done against calendar dates
//! and clock hours in one configured IANA timezone, never against server UTC.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

pub fn local_now(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

pub fn civil_today(tz: Tz) -> NaiveDate {
    local_now(tz).date_naive()
}

/// The clock-hour interval [start_hour, end_hour) during which a poll may
/// be created for the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// Too early: nothing is created, nothing is finalized.
    Before,
    /// Polls may be created and posted.
    Open,
    /// Creation is over for the day; a leftover pending row gets skipped.
    Closed,
}

impl PublishWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self { start_hour, end_hour }
    }

    pub fn position_at(&self, local: &DateTime<Tz>) -> WindowPosition {
        let hour = local.hour();
        if hour < self.start_hour {
            WindowPosition::Before
        } else if hour < self.end_hour {
            WindowPosition::Open
        } else {
            WindowPosition::Closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Moscow;

    fn at_hour(hour: u32) -> DateTime<Tz> {
        Moscow.with_ymd_and_hms(2024, 6, 1, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_before_window() {
        let w = PublishWindow::new(13, 17);
        assert_eq!(w.position_at(&at_hour(0)), WindowPosition::Before);
        assert_eq!(w.position_at(&at_hour(12)), WindowPosition::Before);
    }

    #[test]
    fn test_open_window_includes_start_hour() {
        let w = PublishWindow::new(13, 17);
        assert_eq!(w.position_at(&at_hour(13)), WindowPosition::Open);
        assert_eq!(w.position_at(&at_hour(16)), WindowPosition::Open);
    }

    #[test]
    fn test_closed_window_from_end_hour() {
        let w = PublishWindow::new(13, 17);
        assert_eq!(w.position_at(&at_hour(17)), WindowPosition::Closed);
        assert_eq!(w.position_at(&at_hour(23)), WindowPosition::Closed);
    }

    #[test]
    fn test_civil_date_uses_zone_not_utc() {
        // 23:30 UTC on June 1st is already June 2nd in Moscow (UTC+3).
        let utc = Utc.with_ymd_and_hms(2024, 6, 1, 23, 30, 0).unwrap();
        let local = utc.with_timezone(&Moscow);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
    }
}
