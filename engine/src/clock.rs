//! Wall clock used for booking lifecycle decisions and record timestamps.
//!
//! Booking dates and start times are calendar values in the device's local
//! time zone, so [`Clock::now`] returns a naive local date-time. Record
//! timestamps are epoch milliseconds.

use crate::Timestamp;
use chrono::{Local, NaiveDateTime, Utc};
use std::sync::{Mutex, PoisonError};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current local calendar date-time.
    fn now(&self) -> NaiveDateTime;

    /// Current time as milliseconds since the Unix epoch.
    fn now_millis(&self) -> Timestamp;
}

/// The device clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn now_millis(&self) -> Timestamp {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
///
/// Millisecond timestamps are derived by reading the local date-time as UTC,
/// which keeps them monotonic with [`ManualClock::advance`].
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute point in time.
    pub fn set(&self, to: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now_millis(&self) -> Timestamp {
        self.now().and_utc().timestamp_millis()
    }
}
