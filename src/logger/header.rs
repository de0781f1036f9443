//! Line headers
//!
//! A header is the level tag, an optional prefix, the timestamp and the
//! caller location, in that order (the prefix moves after the location with
//! [`HeaderFlags::MSG_PREFIX`]).

use std::fmt::Write;
use std::panic::Location;

use bitflags::bitflags;
use chrono::{DateTime, FixedOffset, Utc};

use super::Level;

/// Source location of the code that emitted a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller<'a> {
    pub file: &'a str,
    pub line: u32,
}

impl Caller<'static> {
    /// Location of the caller, through any `#[track_caller]` frames
    #[track_caller]
    pub fn here() -> Self {
        Location::caller().into()
    }
}

impl<'a> From<&'a Location<'a>> for Caller<'a> {
    fn from(location: &'a Location<'a>) -> Self {
        Caller {
            file: location.file(),
            line: location.line(),
        }
    }
}

bitflags! {
    /// Which fields a header carries
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeaderFlags: u32 {
        /// `2009/01/23`
        const DATE = 1 << 0;
        /// `01:23:23`
        const TIME = 1 << 1;
        /// `01:23:23.123123`, implies TIME
        const MICROSECONDS = 1 << 2;
        /// `/a/b/c/d.rs:23`
        const LONG_FILE = 1 << 3;
        /// `d.rs:23`, overrides LONG_FILE
        const SHORT_FILE = 1 << 4;
        /// Render the timestamp in UTC instead of the logger's offset
        const UTC = 1 << 5;
        /// Put the prefix right before the message instead of after the level tag
        const MSG_PREFIX = 1 << 6;
    }
}

impl Default for HeaderFlags {
    fn default() -> Self {
        HeaderFlags::DATE | HeaderFlags::TIME | HeaderFlags::MICROSECONDS | HeaderFlags::SHORT_FILE
    }
}

impl HeaderFlags {
    /// Parse flag names such as `"date"` or `"short_file"`
    pub fn from_names<I, S>(names: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(HeaderFlags::empty(), |flags, name| {
            let name = name.as_ref();
            HeaderFlags::from_name(&name.to_ascii_uppercase())
                .map(|flag| flags | flag)
                .ok_or_else(|| format!("unknown header flag '{}'", name))
        })
    }
}

/// Append the full header for one record to `buf`
pub fn format_header(
    buf: &mut String,
    level: Level,
    timestamp: DateTime<Utc>,
    offset: FixedOffset,
    flags: HeaderFlags,
    prefix: &str,
    caller: Option<Caller<'_>>,
) {
    buf.push_str(level.tag());
    if !flags.contains(HeaderFlags::MSG_PREFIX) {
        buf.push_str(prefix);
    }
    format_stamp(buf, timestamp, offset, flags, caller);
    if flags.contains(HeaderFlags::MSG_PREFIX) {
        buf.push_str(prefix);
    }
}

/// Append the timestamp and caller fields selected by `flags`
pub fn format_stamp(
    buf: &mut String,
    timestamp: DateTime<Utc>,
    offset: FixedOffset,
    flags: HeaderFlags,
    caller: Option<Caller<'_>>,
) {
    let offset = if flags.contains(HeaderFlags::UTC) {
        FixedOffset::east_opt(0).unwrap_or(offset)
    } else {
        offset
    };
    let local = timestamp.with_timezone(&offset);

    // Writing into a String cannot fail
    if flags.contains(HeaderFlags::DATE) {
        let _ = write!(buf, "{} ", local.format("%Y/%m/%d"));
    }
    if flags.intersects(HeaderFlags::TIME | HeaderFlags::MICROSECONDS) {
        let _ = write!(buf, "{}", local.format("%H:%M:%S"));
        if flags.contains(HeaderFlags::MICROSECONDS) {
            let _ = write!(buf, "{}", local.format("%.6f"));
        }
        buf.push(' ');
    }

    if flags.intersects(HeaderFlags::LONG_FILE | HeaderFlags::SHORT_FILE) {
        let (file, line) = match caller {
            Some(caller) => (caller.file, caller.line),
            None => ("???", 0),
        };
        let file = if flags.contains(HeaderFlags::SHORT_FILE) {
            file.rsplit(['/', '\\']).next().unwrap_or(file)
        } else {
            file
        };
        let _ = write!(buf, "{}:{}: ", file, line);
    }
}
