//! Epoch arithmetic and time sources for rotation
//!
//! An epoch index names the rotation interval an instant falls into. The
//! instant is shifted by a fixed east-of-UTC offset first, so interval
//! boundaries land on local wall-clock hours and days.

use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Duration, FixedOffset, Local, Offset, Utc};

/// Process-wide offset snapshot, taken on first use
static LOCAL_OFFSET: OnceLock<FixedOffset> = OnceLock::new();

/// Map an instant to the index of the rotation interval containing it.
///
/// Only ever compare the result for equality.
pub fn epoch_index(now: DateTime<Utc>, interval_nanos: i64, utc_offset_nanos: i64) -> i64 {
    let nanos = unix_nanos(now).saturating_add(utc_offset_nanos);
    nanos.div_euclid(interval_nanos)
}

/// Nanoseconds since the Unix epoch, saturating outside the i64 range
pub fn unix_nanos(t: DateTime<Utc>) -> i64 {
    t.timestamp_nanos_opt().unwrap_or_else(|| {
        if t.timestamp() < 0 {
            i64::MIN
        } else {
            i64::MAX
        }
    })
}

/// East-of-UTC offset of the local time zone, computed once per process
pub fn local_offset() -> FixedOffset {
    *LOCAL_OFFSET.get_or_init(|| Local::now().offset().fix())
}

/// Offset in nanoseconds, as used by [`epoch_index`]
pub fn offset_nanos(offset: FixedOffset) -> i64 {
    i64::from(offset.local_minus_utc()) * 1_000_000_000
}

/// Source of "now" for rotation decisions
pub trait Clock: Send + Sync {
    /// The current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock stopped at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute instant
    pub fn set(&self, t: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = t;
        }
    }

    /// Move forward by `d`
    pub fn advance(&self, d: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += d;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|t| *t).unwrap_or_else(|e| *e.into_inner())
    }
}
