//! Shared writers and the default logger
//!
//! Loggers for the same path must share one [`RotatingFileWriter`] so that a
//! single rotation state and lock guard the file. The [`Registry`] hands out
//! those shared writers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use super::{Appenders, Level, Logger};
use crate::error::Result;
use crate::rotation::{RotatingFileWriter, RotationUnit, WriterBuilder};

/// Path of the default logger's file
pub const DEFAULT_LOG_FILE: &str = "./logs/app.log";
/// Archives kept by the default logger
pub const DEFAULT_RETENTION: u32 = 7;

/// Everything needed to build a logger over a shared writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerOptions {
    pub path: PathBuf,
    pub level: Level,
    pub unit: RotationUnit,
    pub retention: u32,
    pub trace_on: bool,
    pub appenders: Appenders,
}

impl LoggerOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_FILE),
            level: Level::Debug,
            unit: RotationUnit::Daily,
            retention: DEFAULT_RETENTION,
            trace_on: true,
            appenders: Appenders::FILE,
        }
    }
}

/// Cache of writers keyed by path
#[derive(Default)]
pub struct Registry {
    writers: Mutex<HashMap<PathBuf, Arc<RotatingFileWriter>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The writer for `path`, created on first request.
    ///
    /// Later requests get the existing writer whatever unit and retention they
    /// ask for.
    pub fn writer(
        &self,
        path: impl AsRef<Path>,
        unit: RotationUnit,
        retention: u32,
    ) -> Result<Arc<RotatingFileWriter>> {
        let path = path.as_ref();
        self.writer_with(path, || RotatingFileWriter::builder(path, unit, retention))
    }

    /// Like [`Registry::writer`], with full control over how a new writer is built
    pub fn writer_with<F>(&self, path: &Path, builder: F) -> Result<Arc<RotatingFileWriter>>
    where
        F: FnOnce() -> WriterBuilder,
    {
        if let Some(writer) = self.lock().get(path) {
            return Ok(Arc::clone(writer));
        }

        // Opening happens outside the lock; if another thread won the race,
        // its writer is kept and ours is dropped.
        let created = Arc::new(builder().build()?);
        let mut writers = self.lock();
        let writer = writers.entry(path.to_path_buf()).or_insert(created);
        Ok(Arc::clone(writer))
    }

    /// Build a logger over the shared writer for `options.path`
    pub fn logger(&self, options: &LoggerOptions) -> Result<Logger> {
        let mut builder = Logger::builder()
            .level(options.level)
            .trace(options.trace_on);

        if options.appenders.contains(Appenders::FILE) {
            let writer = self.writer(&options.path, options.unit, options.retention)?;
            builder = builder.file(writer);
        }
        if options.appenders.contains(Appenders::CONSOLE) {
            builder = builder.console();
        }

        Ok(builder.build())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Flush and close every cached writer.
    ///
    /// Writers stay cached; a later write reopens its file.
    pub fn close_all(&self) -> Result<()> {
        let writers: Vec<_> = self.lock().values().cloned().collect();
        let mut first_error = None;
        for writer in writers {
            if let Err(e) = writer.close() {
                tracing::warn!("Failed to close {}: {}", writer.path().display(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<RotatingFileWriter>>> {
        self.writers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();
static DEFAULT_LOGGER: OnceLock<Logger> = OnceLock::new();

/// The process-wide registry
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(Registry::new)
}

/// The process-wide default logger, built on first use.
///
/// Writes to [`DEFAULT_LOG_FILE`]; falls back to the console if that file
/// cannot be opened.
pub fn default_logger() -> &'static Logger {
    DEFAULT_LOGGER.get_or_init(|| {
        let options = LoggerOptions::default();
        global().logger(&options).unwrap_or_else(|e| {
            tracing::error!(
                "Failed to open default log file {}, logging to console: {}",
                options.path.display(),
                e
            );
            Logger::builder()
                .level(options.level)
                .trace(options.trace_on)
                .console()
                .build()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::HeaderFlags;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_same_path_shares_writer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        let registry = Registry::new();

        let first = registry.writer(&path, RotationUnit::Daily, 3).unwrap();
        let second = registry.writer(&path, RotationUnit::Hourly, 9).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.unit(), RotationUnit::Daily);
        assert_eq!(second.retention(), 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_paths_get_distinct_writers() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Registry::new();

        let a = registry
            .writer(temp_dir.path().join("a.log"), RotationUnit::Daily, 3)
            .unwrap();
        let b = registry
            .writer(temp_dir.path().join("b.log"), RotationUnit::Daily, 3)
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_failed_writer_is_not_cached() {
        let registry = Registry::new();
        assert!(registry.writer("", RotationUnit::Daily, 3).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_requests_share_one_writer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        let registry = Arc::new(Registry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let path = path.clone();
                thread::spawn(move || registry.writer(&path, RotationUnit::Daily, 3).unwrap())
            })
            .collect();
        let writers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(writers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_loggers_for_one_path_write_one_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        let registry = Registry::new();
        let options = LoggerOptions {
            level: Level::Info,
            trace_on: false,
            ..LoggerOptions::new(&path)
        };

        let first = registry.logger(&options).unwrap();
        let second = registry.logger(&options).unwrap();
        first.info(format_args!("from first"));
        second.info(format_args!("from second"));
        second.debug(format_args!("dropped"));
        registry.close_all().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[INFO] ") && lines[0].ends_with("from first"));
        assert!(lines[1].ends_with("from second"));
    }

    #[test]
    fn test_console_only_logger_opens_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        let registry = Registry::new();
        let options = LoggerOptions {
            appenders: Appenders::CONSOLE,
            ..LoggerOptions::new(&path)
        };

        let logger = registry.logger(&options).unwrap();

        assert!(registry.is_empty());
        assert!(!path.exists());
        assert_eq!(logger.flags(), HeaderFlags::default());
    }

    #[test]
    fn test_default_options() {
        let options = LoggerOptions::default();
        assert_eq!(options.path, PathBuf::from("./logs/app.log"));
        assert_eq!(options.level, Level::Debug);
        assert_eq!(options.unit, RotationUnit::Daily);
        assert_eq!(options.retention, 7);
        assert!(options.trace_on);
        assert_eq!(options.appenders, Appenders::FILE);
    }

    #[test]
    fn test_close_all_then_write_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        let registry = Registry::new();
        let writer = registry.writer(&path, RotationUnit::Daily, 3).unwrap();

        writer.write(b"before\n").unwrap();
        registry.close_all().unwrap();
        writer.write(b"after\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "before\nafter\n");
    }
}
