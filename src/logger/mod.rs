//! Level-filtered line logger
//!
//! A [`Logger`] renders each record as a header (see [`header`]) followed by
//! the message and hands the line to a [`FanOut`] of sinks, typically a
//! [`RotatingFileWriter`] and/or the console.

pub mod header;
mod level;
pub mod registry;
pub mod sink;

use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bitflags::bitflags;
use chrono::FixedOffset;

use crate::error::Result;
use crate::rotation::{self, Clock, RotatingFileWriter, SystemClock};
pub use header::{Caller, HeaderFlags};
pub use level::Level;
pub use registry::{default_logger, LoggerOptions, Registry};
pub use sink::{Console, FanOut, LogSink};

bitflags! {
    /// Where a logger built from [`LoggerOptions`] writes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Appenders: u8 {
        const CONSOLE = 1 << 0;
        const FILE = 1 << 1;
    }
}

/// Builder for [`Logger`]
pub struct LoggerBuilder {
    level: Level,
    trace_on: bool,
    flags: HeaderFlags,
    prefix: String,
    offset: Option<FixedOffset>,
    clock: Arc<dyn Clock>,
    sinks: FanOut,
}

impl LoggerBuilder {
    /// Lowest level that is emitted (trace has its own switch)
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace_on = enabled;
        self
    }

    pub fn flags(mut self, flags: HeaderFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Render timestamps at `offset` instead of the local zone
    pub fn utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn file(self, writer: Arc<RotatingFileWriter>) -> Self {
        self.sink(writer)
    }

    pub fn console(self) -> Self {
        self.sink(Arc::new(Console))
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> Logger {
        Logger {
            level: self.level,
            trace_on: AtomicBool::new(self.trace_on),
            flags: self.flags,
            prefix: self.prefix,
            offset: self.offset.unwrap_or_else(rotation::local_offset),
            clock: self.clock,
            sinks: self.sinks,
            line: Mutex::new(String::with_capacity(256)),
        }
    }
}

/// A logger with a fixed level threshold and a runtime trace switch
pub struct Logger {
    level: Level,
    trace_on: AtomicBool,
    flags: HeaderFlags,
    prefix: String,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
    sinks: FanOut,
    /// Reused line buffer; holding it also serializes writes to the sinks
    line: Mutex<String>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder {
            level: Level::Debug,
            trace_on: false,
            flags: HeaderFlags::default(),
            prefix: String::new(),
            offset: None,
            clock: Arc::new(SystemClock),
            sinks: FanOut::default(),
        }
    }

    /// A logger writing only to standard output
    pub fn console(level: Level) -> Self {
        Self::builder().level(level).console().build()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn flags(&self) -> HeaderFlags {
        self.flags
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_trace_on(&self) -> bool {
        self.trace_on.load(Ordering::Relaxed)
    }

    pub fn start_trace(&self) {
        self.trace_on.store(true, Ordering::Relaxed);
    }

    pub fn stop_trace(&self) {
        self.trace_on.store(false, Ordering::Relaxed);
    }

    /// Whether a record at `level` would be written
    pub fn enabled(&self, level: Level) -> bool {
        match level {
            Level::Trace => self.is_trace_on(),
            level => level >= self.level,
        }
    }

    /// Write one record regardless of the level gates.
    ///
    /// A newline is appended unless `message` already ends with one.
    pub fn output(&self, caller: Option<Caller<'_>>, level: Level, message: &str) -> Result<()> {
        self.emit(caller, level, format_args!("{}", message))
    }

    pub fn flush(&self) -> Result<()> {
        self.sinks.flush()
    }

    #[track_caller]
    pub fn trace(&self, args: fmt::Arguments<'_>) {
        self.log(Caller::here(), Level::Trace, args);
    }

    #[track_caller]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Caller::here(), Level::Debug, args);
    }

    #[track_caller]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Caller::here(), Level::Info, args);
    }

    #[track_caller]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Caller::here(), Level::Warn, args);
    }

    #[track_caller]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Caller::here(), Level::Error, args);
    }

    /// Write a record, flush, then panic with the message.
    ///
    /// Does nothing when the threshold is above [`Level::Panic`].
    #[track_caller]
    pub fn panic(&self, args: fmt::Arguments<'_>) {
        if !self.enabled(Level::Panic) {
            return;
        }
        let message = args.to_string();
        let _ = self.output(Some(Caller::here()), Level::Panic, &message);
        let _ = self.flush();
        std::panic!("{}", message);
    }

    /// Write a record, flush, then exit the process with status 1
    #[track_caller]
    pub fn fatal(&self, args: fmt::Arguments<'_>) {
        if !self.enabled(Level::Fatal) {
            return;
        }
        let _ = self.emit(Some(Caller::here()), Level::Fatal, args);
        let _ = self.flush();
        std::process::exit(1);
    }

    /// Gated write for the per-level methods, which have nowhere to return
    /// a sink failure to
    fn log(&self, caller: Caller<'_>, level: Level, args: fmt::Arguments<'_>) {
        if self.enabled(level) {
            let _ = self.emit(Some(caller), level, args);
        }
    }

    fn emit(&self, caller: Option<Caller<'_>>, level: Level, args: fmt::Arguments<'_>) -> Result<()> {
        let now = self.clock.now();
        let mut line = self.line.lock().unwrap_or_else(|e| e.into_inner());
        line.clear();
        header::format_header(
            &mut line,
            level,
            now,
            self.offset,
            self.flags,
            &self.prefix,
            caller,
        );
        let _ = line.write_fmt(args);
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.sinks.write_record(line.as_bytes())
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("trace_on", &self.is_trace_on())
            .field("flags", &self.flags)
            .field("prefix", &self.prefix)
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::sink::testing::{BrokenSink, MemorySink};
    use super::*;
    use crate::rotation::ManualClock;
    use chrono::{DateTime, Utc};
    use std::thread;

    fn memory_logger(level: Level, trace_on: bool) -> (Logger, Arc<MemorySink>) {
        let memory = Arc::new(MemorySink::default());
        let logger = Logger::builder()
            .level(level)
            .trace(trace_on)
            .flags(HeaderFlags::empty())
            .sink(memory.clone())
            .build();
        (logger, memory)
    }

    fn emit_at(logger: &Logger, level: Level) {
        match level {
            Level::Trace => logger.trace(format_args!("at {}", level)),
            Level::Debug => logger.debug(format_args!("at {}", level)),
            Level::Info => logger.info(format_args!("at {}", level)),
            Level::Warn => logger.warn(format_args!("at {}", level)),
            Level::Error => logger.error(format_args!("at {}", level)),
            Level::Panic | Level::Fatal => {
                if logger.enabled(level) {
                    logger.output(None, level, "at level").unwrap();
                }
            }
        }
    }

    #[test]
    fn test_threshold_gate_for_every_level() {
        for threshold in Level::ALL {
            for level in Level::ALL.into_iter().filter(|l| *l != Level::Trace) {
                let (logger, memory) = memory_logger(threshold, false);
                emit_at(&logger, level);
                assert_eq!(
                    memory.records().len(),
                    usize::from(level >= threshold),
                    "level {} threshold {}",
                    level,
                    threshold
                );
            }
        }
    }

    #[test]
    fn test_trace_follows_only_the_flag() {
        for threshold in Level::ALL {
            let (logger, memory) = memory_logger(threshold, false);
            logger.trace(format_args!("hidden"));
            logger.start_trace();
            logger.trace(format_args!("shown"));
            logger.stop_trace();
            logger.trace(format_args!("hidden again"));

            assert_eq!(memory.records(), vec!["[TRACE] shown\n"]);
        }
    }

    #[test]
    fn test_output_appends_single_newline() {
        let (logger, memory) = memory_logger(Level::Info, false);
        logger.output(None, Level::Info, "one").unwrap();
        logger.output(None, Level::Info, "two\n").unwrap();
        assert_eq!(memory.records(), vec!["[INFO] one\n", "[INFO] two\n"]);
    }

    #[test]
    fn test_output_ignores_gates() {
        let (logger, memory) = memory_logger(Level::Error, false);
        logger.output(None, Level::Debug, "forced").unwrap();
        logger.output(None, Level::Trace, "forced").unwrap();
        assert_eq!(memory.records().len(), 2);
    }

    #[test]
    fn test_header_uses_clock_offset_and_call_site() {
        let now: DateTime<Utc> = DateTime::parse_from_rfc3339("2023-03-04T05:06:07.089123Z")
            .unwrap()
            .with_timezone(&Utc);
        let memory = Arc::new(MemorySink::default());
        let logger = Logger::builder()
            .clock(Arc::new(ManualClock::new(now)))
            .utc_offset(FixedOffset::east_opt(0).unwrap())
            .prefix("svc: ")
            .sink(memory.clone())
            .build();

        let line = line!() + 1;
        logger.info(format_args!("ready on {}", 8080));

        assert_eq!(
            memory.records(),
            vec![format!(
                "[INFO] svc: 2023/03/04 05:06:07.089123 mod.rs:{}: ready on 8080\n",
                line
            )]
        );
    }

    #[test]
    fn test_macros_record_call_site() {
        let memory = Arc::new(MemorySink::default());
        let logger = Logger::builder()
            .flags(HeaderFlags::SHORT_FILE)
            .sink(memory.clone())
            .build();

        let line = line!() + 1;
        crate::warn!(&logger, "disk at {}%", 91);
        crate::debug!(logger, "plain");

        assert_eq!(
            memory.records(),
            vec![
                format!("[WARN] mod.rs:{}: disk at 91%\n", line),
                format!("[DEBUG] mod.rs:{}: plain\n", line + 1),
            ]
        );
    }

    #[test]
    fn test_panic_writes_then_panics() {
        let (logger, memory) = memory_logger(Level::Debug, false);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            logger.panic(format_args!("invariant {} broken", "x"));
        }));

        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<String>().unwrap(), "invariant x broken");
        assert_eq!(memory.records(), vec!["[PANIC] invariant x broken\n"]);

        // The logger stays usable after the unwind
        logger.info(format_args!("after"));
        assert_eq!(memory.records().len(), 2);
    }

    #[test]
    fn test_panic_below_threshold_is_a_no_op() {
        let (logger, memory) = memory_logger(Level::Fatal, false);
        logger.panic(format_args!("ignored"));
        assert!(memory.records().is_empty());
    }

    #[test]
    fn test_sink_failure_is_returned_from_output() {
        let logger = Logger::builder().sink(Arc::new(BrokenSink)).build();
        assert!(logger.output(None, Level::Info, "lost").is_err());
        // The per-level methods swallow it
        logger.info(format_args!("lost"));
    }

    #[test]
    fn test_concurrent_records_stay_whole() {
        let (logger, memory) = memory_logger(Level::Debug, false);
        let logger = Arc::new(logger);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let logger = Arc::clone(&logger);
                thread::spawn(move || {
                    for i in 0..100 {
                        logger.info(format_args!("thread {} record {}", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records = memory.records();
        assert_eq!(records.len(), 400);
        assert!(records
            .iter()
            .all(|r| r.starts_with("[INFO] thread ") && r.matches('\n').count() == 1));
    }
}
