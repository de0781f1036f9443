//! Time-rotated log files
//!
//! A [`RotatingFileWriter`] owns one active file and, on the first write of a
//! new interval, archives it under a date-suffixed name, reopens a fresh file
//! and prunes the archive that fell out of the retention window.

pub mod clock;
#[cfg(unix)]
pub mod lock;
pub mod retention;
mod writer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use clock::{epoch_index, local_offset, Clock, ManualClock, SystemClock};
pub use retention::{archive_path, list_archives, sweep_expired_archives};
pub use writer::{RotatingFileWriter, WriterBuilder};

const NANOS_PER_HOUR: i64 = 3_600_000_000_000;

/// How often the active file is rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationUnit {
    Hourly,
    Daily,
    Weekly,
}

impl RotationUnit {
    /// Interval length in nanoseconds
    pub fn interval_nanos(&self) -> i64 {
        match self {
            RotationUnit::Hourly => NANOS_PER_HOUR,
            RotationUnit::Daily => 24 * NANOS_PER_HOUR,
            RotationUnit::Weekly => 7 * 24 * NANOS_PER_HOUR,
        }
    }

    /// Interval length as a chrono duration
    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::nanoseconds(self.interval_nanos())
    }

    /// strftime pattern for archive suffixes
    pub fn suffix_format(&self) -> &'static str {
        match self {
            RotationUnit::Hourly => "%Y-%m-%d_%H",
            RotationUnit::Daily | RotationUnit::Weekly => "%Y-%m-%d",
        }
    }

    /// Get the display name for this unit
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationUnit::Hourly => "hourly",
            RotationUnit::Daily => "daily",
            RotationUnit::Weekly => "weekly",
        }
    }
}

impl fmt::Display for RotationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hourly" | "hour" => Ok(RotationUnit::Hourly),
            "daily" | "day" => Ok(RotationUnit::Daily),
            "weekly" | "week" => Ok(RotationUnit::Weekly),
            other => Err(format!("unknown rotation unit '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_lengths() {
        assert_eq!(RotationUnit::Hourly.interval_nanos(), 3_600_000_000_000);
        assert_eq!(
            RotationUnit::Weekly.interval_nanos(),
            7 * RotationUnit::Daily.interval_nanos()
        );
        assert_eq!(RotationUnit::Daily.interval(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_suffix_formats() {
        assert_eq!(RotationUnit::Hourly.suffix_format(), "%Y-%m-%d_%H");
        assert_eq!(RotationUnit::Daily.suffix_format(), "%Y-%m-%d");
        assert_eq!(RotationUnit::Weekly.suffix_format(), "%Y-%m-%d");
    }

    #[test]
    fn test_parse_unit() {
        assert_eq!("Hourly".parse::<RotationUnit>(), Ok(RotationUnit::Hourly));
        assert_eq!("week".parse::<RotationUnit>(), Ok(RotationUnit::Weekly));
        assert!("monthly".parse::<RotationUnit>().is_err());
    }
}
