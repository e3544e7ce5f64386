use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use invoice_ledger_bot::core::{NotificationSchedule, SlidingWindowGuard};

#[test]
fn admits_up_to_max_within_window() {
    let mut guard = SlidingWindowGuard::new(3, Duration::from_secs(60));
    let start = Instant::now();
    assert!(guard.check_at(start));
    assert!(guard.check_at(start + Duration::from_secs(1)));
    assert!(guard.check_at(start + Duration::from_secs(2)));
    assert!(!guard.check_at(start + Duration::from_secs(3)));
    assert_eq!(guard.in_window(), 3);
}

#[test]
fn window_slides() {
    let mut guard = SlidingWindowGuard::new(2, Duration::from_secs(60));
    let start = Instant::now();
    assert!(guard.check_at(start));
    assert!(guard.check_at(start + Duration::from_secs(30)));
    assert!(!guard.check_at(start + Duration::from_secs(59)));
    // The first admission ages out exactly at the window boundary.
    assert!(guard.check_at(start + Duration::from_secs(60)));
    assert!(!guard.check_at(start + Duration::from_secs(61)));
    assert!(guard.check_at(start + Duration::from_secs(90)));
}

#[test]
fn rejected_attempts_do_not_count() {
    let mut guard = SlidingWindowGuard::new(1, Duration::from_secs(10));
    let start = Instant::now();
    assert!(guard.check_at(start));
    for s in 1..10 {
        assert!(!guard.check_at(start + Duration::from_secs(s)));
    }
    assert!(guard.check_at(start + Duration::from_secs(10)));
}

#[test]
fn notification_fires_once_a_day() {
    let schedule = NotificationSchedule::daily("17:30", chrono_tz::Asia::Jakarta).unwrap();
    let morning = Utc.with_ymd_and_hms(2024, 6, 1, 1, 0, 0).unwrap();
    let fire = Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap();
    assert_eq!(schedule.next_after(morning), Some(fire));
    assert_eq!(
        schedule.next_after(fire),
        Some(Utc.with_ymd_and_hms(2024, 6, 2, 10, 30, 0).unwrap())
    );
    assert!(!schedule.fired_between(fire, fire + chrono::Duration::hours(23)));
}

#[test]
fn huge_limit_starts_empty() {
    let mut guard = SlidingWindowGuard::new(usize::MAX, Duration::from_secs(60));
    assert_eq!(guard.in_window(), 0);
    assert!(guard.check_at(Instant::now()));
    assert_eq!(guard.in_window(), 1);
}
