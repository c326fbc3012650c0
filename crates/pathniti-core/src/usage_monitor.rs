//! Daily and per-minute request budget for the external AI provider.
//!
//! Counters roll over lazily: the next check or stats read notices that
//! the UTC day changed (relative to the last recorded request) or that the
//! minute window expired, and zeroes the affected counter.
//!
//! A monitor built with [`UsageMonitor::with_state_file`] writes its counters
//! to disk after every charged request, so short-lived processes such as the
//! CLI share one budget. Separate processes writing the same file at the same
//! moment can still lose an increment.

use crate::error::PathNitiError;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const MINUTE_WINDOW_MS: i64 = 60_000;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests and replay.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimits {
    pub daily_limit: u32,
    pub per_minute_limit: u32,
    /// Percentage of the daily budget above which usage is "approaching"
    pub warn_percent: u32,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            // Conservative ceilings for the provider's free tier
            daily_limit: 15,
            per_minute_limit: 1,
            warn_percent: 80,
        }
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageDenied {
    DailyLimitReached,
    PerMinuteLimitReached,
}

impl fmt::Display for UsageDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageDenied::DailyLimitReached => write!(f, "daily API limit reached"),
            UsageDenied::PerMinuteLimitReached => write!(f, "per-minute API limit reached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub requests_today: u32,
    pub requests_this_minute: u32,
    pub last_request_time: Option<DateTime<Utc>>,
    pub daily_limit: u32,
    pub per_minute_limit: u32,
}

/// Budget consulted before, and charged after, each external AI call.
///
/// `UsageMonitor` is the in-process implementation; a deployment running
/// several instances would back this with a shared counter store.
pub trait RequestBudget: Send + Sync {
    fn check(&self) -> Result<(), UsageDenied>;

    /// Charge one request. Call only after the provider actually answered.
    fn record_request(&self);

    fn usage_stats(&self) -> UsageStats;

    fn remaining_requests_today(&self) -> u32 {
        let stats = self.usage_stats();
        stats.daily_limit.saturating_sub(stats.requests_today)
    }

    fn is_approaching_limit(&self) -> bool;

    fn can_make_request(&self) -> bool {
        self.check().is_ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UsageState {
    requests_today: u32,
    requests_this_minute: u32,
    last_request_time: Option<DateTime<Utc>>,
    minute_window_start: DateTime<Utc>,
}

impl UsageState {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            requests_today: 0,
            requests_this_minute: 0,
            last_request_time: None,
            minute_window_start: now,
        }
    }

    fn roll_over(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.last_request_time {
            if last.date_naive() != now.date_naive() {
                self.requests_today = 0;
            }
        }

        if (now - self.minute_window_start).num_milliseconds() > MINUTE_WINDOW_MS {
            self.requests_this_minute = 0;
            self.minute_window_start = now;
        }
    }
}

pub struct UsageMonitor {
    limits: UsageLimits,
    clock: Arc<dyn Clock>,
    state: Mutex<UsageState>,
    state_file: Option<PathBuf>,
}

impl fmt::Debug for UsageMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageMonitor")
            .field("limits", &self.limits)
            .field("state", &*self.state.lock())
            .field("state_file", &self.state_file)
            .finish()
    }
}

impl Default for UsageMonitor {
    fn default() -> Self {
        Self::new(UsageLimits::default(), Arc::new(SystemClock))
    }
}

impl UsageMonitor {
    pub fn new(limits: UsageLimits, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            limits,
            clock,
            state: Mutex::new(UsageState::fresh(now)),
            state_file: None,
        }
    }

    /// Resume counters from `path` and keep it updated.
    ///
    /// A missing file starts a fresh budget; an unreadable one is logged and
    /// replaced on the next charged request.
    pub fn with_state_file(
        limits: UsageLimits,
        clock: Arc<dyn Clock>,
        path: impl Into<PathBuf>,
    ) -> Self {
        let path = path.into();
        let mut monitor = Self::new(limits, clock);

        match Self::read_state(&path) {
            Ok(Some(state)) => {
                debug!(
                    "Resumed usage counters from {} ({} today)",
                    path.display(),
                    state.requests_today
                );
                *monitor.state.get_mut() = state;
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Ignoring unreadable usage state {}: {}",
                path.display(),
                e
            ),
        }

        monitor.state_file = Some(path);
        monitor
    }

    fn read_state(path: &Path) -> Result<Option<UsageState>, PathNitiError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write the counters to the state file, if one is attached.
    pub fn save(&self) -> Result<(), PathNitiError> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.state.lock())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    pub fn limits(&self) -> UsageLimits {
        self.limits
    }
}

impl RequestBudget for UsageMonitor {
    fn check(&self) -> Result<(), UsageDenied> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.roll_over(now);

        if state.requests_today >= self.limits.daily_limit {
            warn!("Daily API limit reached. Using fallback recommendations.");
            return Err(UsageDenied::DailyLimitReached);
        }

        if state.requests_this_minute >= self.limits.per_minute_limit {
            warn!("Per-minute API limit reached. Using fallback recommendations.");
            return Err(UsageDenied::PerMinuteLimitReached);
        }

        Ok(())
    }

    fn record_request(&self) {
        let now = self.clock.now();
        {
            let mut state = self.state.lock();
            state.roll_over(now);
            state.requests_today = state.requests_today.saturating_add(1);
            state.requests_this_minute = state.requests_this_minute.saturating_add(1);
            state.last_request_time = Some(now);
        }

        if let Err(e) = self.save() {
            warn!("Failed to persist usage counters: {}", e);
        }
    }

    fn usage_stats(&self) -> UsageStats {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.roll_over(now);
        UsageStats {
            requests_today: state.requests_today,
            requests_this_minute: state.requests_this_minute,
            last_request_time: state.last_request_time,
            daily_limit: self.limits.daily_limit,
            per_minute_limit: self.limits.per_minute_limit,
        }
    }

    fn is_approaching_limit(&self) -> bool {
        if self.limits.daily_limit == 0 {
            return true;
        }
        let used = self.usage_stats().requests_today as f64;
        used / self.limits.daily_limit as f64 * 100.0 > self.limits.warn_percent as f64
    }
}
