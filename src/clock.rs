//! Wall-clock source shared by the SLA tracker and the analytics store.
//!
//! Every status in this service is derived from `now - start_time`, so the
//! clock is injected rather than read directly. Production uses
//! [`SystemClock`]; tests drive a [`ManualClock`] forward explicitly.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

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

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn advance_hours(&self, hours: f64) {
        if let Some(by) = hours_to_duration(hours) {
            self.advance(by);
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fractional hours between two instants, millisecond precision.
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 3_600_000.0
}

/// `None` when `hours` is not finite or does not fit a `Duration`.
pub fn hours_to_duration(hours: f64) -> Option<Duration> {
    if !hours.is_finite() {
        return None;
    }
    Duration::try_milliseconds((hours * 3_600_000.0).round() as i64)
}

/// `at + hours`, or `None` if the result leaves chrono's date range.
pub fn add_hours(at: DateTime<Utc>, hours: f64) -> Option<DateTime<Utc>> {
    hours_to_duration(hours).and_then(|by| at.checked_add_signed(by))
}
