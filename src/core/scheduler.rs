//! Daily notification schedule evaluated in the ledger time zone.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

/// Errors building a [`NotificationSchedule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The time is not `HH:MM`.
    InvalidTime(String),
    InvalidCron(String),
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::InvalidTime(t) => write!(f, "invalid notification time {t:?}"),
            ScheduleError::InvalidCron(e) => write!(f, "invalid cron expression: {e}"),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Daily trigger for the pending-invoice notification, evaluated in the
/// ledger's time zone.
#[derive(Debug, Clone)]
pub struct NotificationSchedule {
    schedule: Schedule,
    tz: Tz,
}

impl NotificationSchedule {
    /// Builds a schedule firing every day at `time` (`HH:MM`) in `tz`.
    pub fn daily(time: &str, tz: Tz) -> Result<Self, ScheduleError> {
        let parsed = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .map_err(|_| ScheduleError::InvalidTime(time.to_string()))?;
        let expr = format!("0 {} {} * * *", parsed.format("%-M"), parsed.format("%-H"));
        let schedule =
            Schedule::from_str(&expr).map_err(|e| ScheduleError::InvalidCron(e.to_string()))?;
        Ok(Self { schedule, tz })
    }

    /// First firing strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.tz))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Whether a firing falls in `(since, until]`.
    pub fn fired_between(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        self.next_after(since).is_some_and(|t| t <= until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fires_at_local_time() {
        let schedule = NotificationSchedule::daily("09:00", chrono_tz::Asia::Jakarta).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(after),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap())
        );
        assert!(schedule.fired_between(after, Utc.with_ymd_and_hms(2024, 6, 1, 2, 0, 0).unwrap()));
        assert!(!schedule.fired_between(after, Utc.with_ymd_and_hms(2024, 6, 1, 1, 59, 0).unwrap()));
    }

    #[test]
    fn rejects_bad_time() {
        assert!(matches!(
            NotificationSchedule::daily("9am", chrono_tz::UTC),
            Err(ScheduleError::InvalidTime(_))
        ));
        assert!(NotificationSchedule::daily("24:00", chrono_tz::UTC).is_err());
    }
}
