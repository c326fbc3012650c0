use chrono::{Duration, TimeZone, Utc};
use pathniti_core::{ManualClock, RequestBudget, UsageDenied, UsageLimits, UsageMonitor};
use std::sync::Arc;
use tempfile::TempDir;

fn monitor_at(hour: u32, limits: UsageLimits) -> (UsageMonitor, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap(),
    ));
    (UsageMonitor::new(limits, clock.clone()), clock)
}

#[test]
fn test_daily_limit_holds_until_the_day_changes() {
    let limits = UsageLimits {
        daily_limit: 3,
        per_minute_limit: 1,
        ..Default::default()
    };
    let (monitor, clock) = monitor_at(9, limits);

    for _ in 0..3 {
        assert!(monitor.can_make_request());
        monitor.record_request();
        clock.advance(Duration::minutes(2));
    }

    assert_eq!(monitor.check(), Err(UsageDenied::DailyLimitReached));
    assert_eq!(monitor.remaining_requests_today(), 0);

    // Later the same day: minute window long gone, budget still spent.
    clock.set(Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap());
    assert!(!monitor.can_make_request());

    clock.set(Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 1).unwrap());
    assert!(monitor.can_make_request());
    assert_eq!(monitor.usage_stats().requests_today, 0);
}

#[test]
fn test_per_minute_limit_resets_after_window() {
    let limits = UsageLimits {
        daily_limit: 100,
        per_minute_limit: 2,
        ..Default::default()
    };
    let (monitor, clock) = monitor_at(12, limits);

    monitor.record_request();
    clock.advance(Duration::seconds(10));
    assert!(monitor.can_make_request());
    monitor.record_request();

    assert_eq!(monitor.check(), Err(UsageDenied::PerMinuteLimitReached));
    clock.advance(Duration::seconds(40));
    assert!(!monitor.can_make_request());

    // Window started when the monitor was built; 61s have now passed.
    clock.advance(Duration::seconds(11));
    assert!(monitor.can_make_request());
    assert_eq!(monitor.usage_stats().requests_today, 2);
}

#[test]
fn test_shared_monitor_counts_every_record() {
    let limits = UsageLimits {
        daily_limit: 1_000,
        per_minute_limit: 1_000,
        ..Default::default()
    };
    let (monitor, _clock) = monitor_at(8, limits);
    let monitor = Arc::new(monitor);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let monitor = monitor.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    monitor.record_request();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(monitor.usage_stats().requests_today, 200);
    assert_eq!(monitor.remaining_requests_today(), 800);
}

#[test]
fn test_counters_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("usage.json");
    let limits = UsageLimits {
        daily_limit: 2,
        per_minute_limit: 5,
        ..Default::default()
    };
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
    ));

    let first = UsageMonitor::with_state_file(limits, clock.clone(), &path);
    first.record_request();
    first.record_request();
    assert!(path.exists());
    drop(first);

    // A second process on the same day sees the spent budget.
    clock.advance(Duration::minutes(5));
    let second = UsageMonitor::with_state_file(limits, clock.clone(), &path);
    assert_eq!(second.usage_stats().requests_today, 2);
    assert_eq!(second.check(), Err(UsageDenied::DailyLimitReached));

    // The next day the stored counters roll over.
    clock.set(Utc.with_ymd_and_hms(2024, 3, 11, 8, 0, 0).unwrap());
    let third = UsageMonitor::with_state_file(limits, clock, &path);
    assert_eq!(third.usage_stats().requests_today, 0);
    assert!(third.can_make_request());
}

#[test]
fn test_per_minute_limit_applies_across_restarts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("usage.json");
    let limits = UsageLimits::default();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
    ));

    UsageMonitor::with_state_file(limits, clock.clone(), &path).record_request();

    clock.advance(Duration::seconds(20));
    let again = UsageMonitor::with_state_file(limits, clock.clone(), &path);
    assert_eq!(again.check(), Err(UsageDenied::PerMinuteLimitReached));

    clock.advance(Duration::seconds(41));
    assert!(again.can_make_request());
}

#[test]
fn test_corrupt_state_file_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("usage.json");
    std::fs::write(&path, "{ not json").unwrap();

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
    ));
    let monitor = UsageMonitor::with_state_file(UsageLimits::default(), clock, &path);
    assert_eq!(monitor.usage_stats().requests_today, 0);
    assert_eq!(monitor.state_file(), Some(path.as_path()));

    monitor.record_request();
    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(stored["requests_today"], 1);
}

#[test]
fn test_stats_reflect_rollover_without_a_check() {
    let limits = UsageLimits {
        daily_limit: 10,
        per_minute_limit: 10,
        ..Default::default()
    };
    let (monitor, clock) = monitor_at(22, limits);
    for _ in 0..9 {
        monitor.record_request();
    }
    assert!(monitor.is_approaching_limit());

    clock.set(Utc.with_ymd_and_hms(2024, 3, 11, 7, 0, 0).unwrap());
    let stats = monitor.usage_stats();
    assert_eq!(stats.requests_today, 0);
    assert_eq!(stats.requests_this_minute, 0);
    assert!(!monitor.is_approaching_limit());
    assert_eq!(monitor.remaining_requests_today(), 10);
}
