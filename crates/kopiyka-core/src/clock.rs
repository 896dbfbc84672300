//! UTC clock and the sanctioned analysis windows.
//!
//! Every period the system reasons about is one of: today (start of UTC day
//! to now), last-N-days, week (N=7), month (N=30), or the previous-period
//! pair of any of those. Nothing else.

use chrono::Utc;

use crate::constants::SECONDS_PER_DAY;
use crate::types::Timestamp;

/// Half-open time window `[start_ts, end_ts)` in unix seconds UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ts: Timestamp,
    pub end_ts: Timestamp,
}

impl TimeRange {
    pub fn new(start_ts: Timestamp, end_ts: Timestamp) -> Self {
        Self { start_ts, end_ts }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start_ts <= ts && ts < self.end_ts
    }

    pub fn duration_secs(&self) -> i64 {
        (self.end_ts - self.start_ts).max(0)
    }

    pub fn days(&self) -> i64 {
        self.duration_secs() / SECONDS_PER_DAY
    }
}

/// Current unix seconds, UTC.
pub fn now_ts() -> Timestamp {
    Utc::now().timestamp()
}

/// Floor a timestamp to the start of its UTC day.
pub fn day_floor(ts: Timestamp) -> Timestamp {
    ts.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY
}

/// `[start-of-day-UTC, now)`.
pub fn range_today(now: Timestamp) -> TimeRange {
    TimeRange::new(day_floor(now), now)
}

/// `[now - days·86400, now)`.
pub fn range_last_days(now: Timestamp, days: i64) -> TimeRange {
    let days = days.max(1);
    TimeRange::new(now - days * SECONDS_PER_DAY, now)
}

pub fn range_week(now: Timestamp) -> TimeRange {
    range_last_days(now, 7)
}

pub fn range_month(now: Timestamp) -> TimeRange {
    range_last_days(now, 30)
}

/// The matching previous period for `[a, b)` is `[a - (b - a), a)`.
pub fn previous_period(range: TimeRange) -> TimeRange {
    let span = range.end_ts - range.start_ts;
    TimeRange::new(range.start_ts - span, range.start_ts)
}
