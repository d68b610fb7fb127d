//! Gates drop recording by event window and per-town policy.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::Serialize;

use crate::config::Environment;
use crate::models::Town;

/// Days the recording window extends either side of the event day.
const WINDOW_DAYS_BEFORE: i64 = 3;
const WINDOW_DAYS_AFTER: i64 = 3;

/// The annual recording window, with UTC date boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWindow {
    pub opens: DateTime<Utc>,
    /// Exclusive upper bound.
    pub closes: DateTime<Utc>,
}

impl EventWindow {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.opens <= now && now < self.closes
    }
}

/// Decides whether drop recording is currently permitted.
///
/// The deployment context is threaded in at construction; there is no global
/// environment lookup.
#[derive(Debug, Clone)]
pub struct EligibilityGate {
    environment: Environment,
}

impl EligibilityGate {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    /// The annual cleanup day: the first Saturday of May.
    pub fn event_day(year: i32) -> NaiveDate {
        let may_first = NaiveDate::from_ymd_opt(year, 5, 1).expect("valid calendar date");
        let offset = (Weekday::Sat.num_days_from_monday() + 7
            - may_first.weekday().num_days_from_monday())
            % 7;
        may_first + Duration::days(i64::from(offset))
    }

    /// The recording window for the year containing `now`.
    pub fn window_for(now: DateTime<Utc>) -> EventWindow {
        let day = Self::event_day(now.year());
        let opens = (day - Duration::days(WINDOW_DAYS_BEFORE))
            .and_time(NaiveTime::MIN)
            .and_utc();
        let closes = (day + Duration::days(WINDOW_DAYS_AFTER + 1))
            .and_time(NaiveTime::MIN)
            .and_utc();
        EventWindow { opens, closes }
    }

    /// True only during this year's event window.
    pub fn is_within_event_window(now: DateTime<Utc>) -> bool {
        Self::window_for(now).contains(now)
    }

    /// Only the production deployment enforces the window; other contexts
    /// bypass it so the flow stays exercisable off-season. Intentional.
    pub fn is_enforced(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn can_record(&self, now: DateTime<Utc>) -> bool {
        Self::is_within_event_window(now) || !self.is_enforced()
    }

    /// Per-town policy: when false, every drop must go to a collection site.
    pub fn allows_roadside(town: &Town) -> bool {
        town.allows_roadside
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_event_day_is_first_saturday_of_may() {
        assert_eq!(
            EligibilityGate::event_day(2021),
            NaiveDate::from_ymd_opt(2021, 5, 1).unwrap()
        );
        assert_eq!(
            EligibilityGate::event_day(2025),
            NaiveDate::from_ymd_opt(2025, 5, 3).unwrap()
        );
        assert_eq!(
            EligibilityGate::event_day(2026),
            NaiveDate::from_ymd_opt(2026, 5, 2).unwrap()
        );
    }

    #[test]
    fn test_window_straddles_event_day() {
        // 2025 event day is May 3rd; window runs Apr 30th through May 6th.
        let window = EligibilityGate::window_for(utc(2025, 5, 3, 12));
        assert_eq!(window.opens, utc(2025, 4, 30, 0));
        assert_eq!(window.closes, utc(2025, 5, 7, 0));

        assert!(window.contains(utc(2025, 4, 30, 0)));
        assert!(window.contains(utc(2025, 5, 6, 23)));
        assert!(!window.contains(utc(2025, 4, 29, 23)));
        assert!(!window.contains(utc(2025, 5, 7, 0)));
    }

    #[test]
    fn test_production_enforces_window() {
        let gate = EligibilityGate::new(Environment::Production);
        assert!(gate.can_record(utc(2025, 5, 3, 12)));
        assert!(!gate.can_record(utc(2025, 1, 15, 12)));
        assert!(!gate.can_record(utc(2025, 8, 6, 12)));
    }

    #[test]
    fn test_non_production_bypasses_window() {
        let dev = EligibilityGate::new(Environment::Development);
        assert!(dev.can_record(utc(2025, 1, 15, 12)));
        assert!(dev.can_record(utc(2025, 5, 3, 12)));

        let staging = EligibilityGate::new(Environment::Staging);
        assert!(staging.can_record(utc(2025, 11, 2, 8)));
    }
}
