//! The rotating file writer
//!
//! Every write first checks whether the clock has entered a new rotation
//! interval. If it has, the active file is archived as
//! `<path>.<suffix>`, a fresh file is opened in its place and the archive
//! that fell out of the retention window is removed. The check and the write
//! happen under one lock, so records and rotations of a writer never
//! interleave.

use std::cell::Cell;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, FixedOffset, Utc};

use super::clock::{self, Clock, SystemClock};
use super::retention;
use super::RotationUnit;
use crate::error::{Error, Result};

thread_local! {
    static REPORTING: Cell<bool> = const { Cell::new(false) };
}

/// Report a rotation failure on the diagnostics channel.
///
/// A writer can itself back the tracing subscriber, so a failure reported
/// from inside that subscriber's write is dropped instead of recursing.
fn report(err: &Error) {
    REPORTING.with(|reporting| {
        if reporting.replace(true) {
            return;
        }
        tracing::warn!(error = %err, "log rotation failed");
        reporting.set(false);
    });
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

struct State {
    /// Active file of the current epoch, if open
    file: Option<File>,
    /// Epoch the active file belongs to
    epoch: i64,
}

/// Builder for [`RotatingFileWriter`]
pub struct WriterBuilder {
    path: PathBuf,
    unit: RotationUnit,
    retention: u32,
    clock: Arc<dyn Clock>,
    offset: Option<FixedOffset>,
    cross_process_lock: bool,
    sweep_on_open: bool,
}

impl WriterBuilder {
    /// Drive rotation from a custom clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Align intervals and archive names to `offset` instead of the local zone
    pub fn utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Take a non-blocking `flock` before rotating, for paths shared between processes
    pub fn cross_process_lock(mut self, enabled: bool) -> Self {
        self.cross_process_lock = enabled;
        self
    }

    /// Delete archives older than the retention window when the writer opens
    pub fn sweep_on_open(mut self, enabled: bool) -> Self {
        self.sweep_on_open = enabled;
        self
    }

    /// Create the directory if needed and open the active file
    pub fn build(self) -> Result<RotatingFileWriter> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::EmptyPath);
        }

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|source| Error::CreateDirectory {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }

        let offset = self.offset.unwrap_or_else(clock::local_offset);
        let now = self.clock.now();

        if self.sweep_on_open {
            match retention::sweep_expired_archives(
                &self.path,
                self.unit,
                self.retention,
                now,
                offset,
            ) {
                Ok(0) => {}
                Ok(count) => tracing::info!(
                    "Removed {} expired archives of {}",
                    count,
                    self.path.display()
                ),
                Err(e) => tracing::warn!(
                    "Failed to sweep archives of {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }

        // Resume the epoch of an existing file so a restart within the same
        // interval keeps appending to it.
        let started = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or(now);
        let interval_nanos = self.unit.interval_nanos();
        let epoch = clock::epoch_index(started, interval_nanos, clock::offset_nanos(offset));

        let file = open_append(&self.path).map_err(|source| Error::Open {
            path: self.path.clone(),
            source,
        })?;

        Ok(RotatingFileWriter {
            path: self.path,
            unit: self.unit,
            retention: self.retention,
            interval_nanos,
            offset,
            clock: self.clock,
            cross_process_lock: self.cross_process_lock,
            state: Mutex::new(State {
                file: Some(file),
                epoch,
            }),
            rotations: AtomicU64::new(0),
        })
    }
}

/// A log file that rotates on hour, day or week boundaries
pub struct RotatingFileWriter {
    path: PathBuf,
    unit: RotationUnit,
    /// Number of archives to keep
    retention: u32,
    interval_nanos: i64,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
    cross_process_lock: bool,
    state: Mutex<State>,
    rotations: AtomicU64,
}

impl RotatingFileWriter {
    /// Open a writer with the system clock and the local UTC offset
    pub fn new(path: impl Into<PathBuf>, unit: RotationUnit, retention: u32) -> Result<Self> {
        Self::builder(path, unit, retention).build()
    }

    /// Start configuring a writer
    pub fn builder(path: impl Into<PathBuf>, unit: RotationUnit, retention: u32) -> WriterBuilder {
        WriterBuilder {
            path: path.into(),
            unit,
            retention,
            clock: Arc::new(SystemClock),
            offset: None,
            cross_process_lock: false,
            sweep_on_open: false,
        }
    }

    /// Path of the active file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn unit(&self) -> RotationUnit {
        self.unit
    }

    pub fn retention(&self) -> u32 {
        self.retention
    }

    /// Number of completed rotations since the writer was opened
    pub fn rotation_count(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Write one record, rotating first if a new interval has started.
    ///
    /// The whole buffer is written or an error is returned. Rotation
    /// failures are reported on the diagnostics channel; the write is still
    /// attempted and fails with [`Error::NoActiveFile`] if no file could be
    /// opened.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let (result, rotation_error) = {
            let mut state = self.lock_state();
            let rotation_error = self.check_rotation(&mut state).err();
            let result = match state.file.as_mut() {
                Some(file) => file.write_all(buf).map(|_| buf.len()).map_err(Error::Write),
                None => Err(Error::NoActiveFile(self.path.clone())),
            };
            (result, rotation_error)
        };

        if let Some(err) = rotation_error {
            report(&err);
        }
        result
    }

    pub fn flush(&self) -> Result<()> {
        let mut state = self.lock_state();
        if let Some(file) = state.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    /// Sync and close the active file.
    ///
    /// A later write reopens the file in append mode.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock_state();
        if let Some(file) = state.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_rotation(&self, state: &mut State) -> Result<()> {
        let now = self.clock.now();
        let now_epoch =
            clock::epoch_index(now, self.interval_nanos, clock::offset_nanos(self.offset));

        if now_epoch == state.epoch {
            if state.file.is_none() {
                state.file = Some(self.reopen()?);
            }
            return Ok(());
        }

        self.rotate(state, now, now_epoch)
    }

    fn rotate(&self, state: &mut State, now: DateTime<Utc>, now_epoch: i64) -> Result<()> {
        let owns_path = self.coordinate(state.file.as_ref())?;

        // Kept open until the new file is in place so an advisory lock spans
        // the whole sequence.
        let retired = state.file.take();
        let mut close_error = None;
        if let Some(file) = retired.as_ref() {
            if let Err(source) = file.sync_all() {
                close_error = Some(Error::Rotation {
                    step: "close",
                    path: self.path.clone(),
                    source,
                });
            }
        }

        if owns_path {
            self.archive(now)?;
        }

        state.file = Some(self.reopen()?);
        state.epoch = now_epoch;
        self.rotations.fetch_add(1, Ordering::Relaxed);

        retention::prune_expired(&self.path, self.unit, self.retention, now, self.offset);

        drop(retired);
        match close_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Rename the active file to its archive name, if it exists
    fn archive(&self, now: DateTime<Utc>) -> Result<()> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(Error::Rotation {
                    step: "stat",
                    path: self.path.clone(),
                    source,
                })
            }
        };

        // A file idle for longer than one interval is dated by its own mtime
        let mut archived_at = now - self.unit.interval();
        if let Ok(modified) = metadata.modified() {
            let modified = DateTime::<Utc>::from(modified);
            if modified < archived_at {
                archived_at = modified;
            }
        }

        let target = retention::archive_path(&self.path, self.unit, archived_at, self.offset);
        fs::rename(&self.path, &target).map_err(|source| Error::Rotation {
            step: "archive",
            path: self.path.clone(),
            source,
        })
    }

    fn reopen(&self) -> Result<File> {
        open_append(&self.path).map_err(|source| Error::Rotation {
            step: "reopen",
            path: self.path.clone(),
            source,
        })
    }

    /// Decide whether this writer may archive the file at its path.
    ///
    /// With cross-process locking enabled the active descriptor is locked
    /// first; if another process already rotated, the path holds a new file
    /// that must not be archived again.
    #[cfg(unix)]
    fn coordinate(&self, file: Option<&File>) -> Result<bool> {
        use super::lock::{self, LockError};
        use std::os::unix::fs::MetadataExt;

        let Some(file) = file.filter(|_| self.cross_process_lock) else {
            return Ok(true);
        };

        match lock::try_lock_exclusive(file) {
            Ok(()) => {}
            Err(LockError::Held) => return Err(Error::Busy(self.path.clone())),
            Err(LockError::Io(source)) => {
                return Err(Error::Rotation {
                    step: "lock",
                    path: self.path.clone(),
                    source,
                })
            }
        }

        let ours = file.metadata().map_err(|source| Error::Rotation {
            step: "stat",
            path: self.path.clone(),
            source,
        })?;
        Ok(match fs::metadata(&self.path) {
            Ok(current) => current.dev() == ours.dev() && current.ino() == ours.ino(),
            Err(_) => true,
        })
    }

    #[cfg(not(unix))]
    fn coordinate(&self, _file: Option<&File>) -> Result<bool> {
        Ok(true)
    }
}

impl Write for &RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        RotatingFileWriter::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        RotatingFileWriter::flush(*self).map_err(io::Error::from)
    }
}

impl Drop for RotatingFileWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl fmt::Debug for RotatingFileWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatingFileWriter")
            .field("path", &self.path)
            .field("unit", &self.unit)
            .field("retention", &self.retention)
            .field("offset", &self.offset)
            .field("rotations", &self.rotation_count())
            .finish_non_exhaustive()
    }
}
