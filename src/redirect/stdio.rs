//! Descriptor-level redirection of stdin, stdout and stderr

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Local};

use super::dup::{self, DupDescriptor};
use super::{RedirectConfig, StdTarget, CAPTURE_ARCHIVE_FORMAT, CAPTURE_FILE};
use crate::error::Error;

const NULL_DEVICE: &str = "/dev/null";

/// Descriptor numbers a redirector rewires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdDescriptors {
    pub stdin: RawFd,
    pub stdout: RawFd,
    pub stderr: RawFd,
}

impl StdDescriptors {
    /// The calling process's own standard streams
    pub const PROCESS: Self = Self {
        stdin: libc::STDIN_FILENO,
        stdout: libc::STDOUT_FILENO,
        stderr: libc::STDERR_FILENO,
    };
}

/// Result of applying a [`RedirectConfig`].
///
/// Holds the null device and capture file open for as long as it lives; the
/// process-wide instance lives until exit.
#[derive(Debug)]
pub struct Redirection {
    target: StdTarget,
    _null: Option<File>,
    _capture: Option<File>,
    capture_path: Option<PathBuf>,
    archived_capture: Option<PathBuf>,
    errors: Vec<Error>,
}

impl Redirection {
    pub fn target(&self) -> StdTarget {
        self.target
    }

    /// Path of the capture file, when stdout and stderr go to a file
    pub fn capture_path(&self) -> Option<&Path> {
        self.capture_path.as_deref()
    }

    /// Where the previous run's capture file was moved to, if there was one
    pub fn archived_capture(&self) -> Option<&Path> {
        self.archived_capture.as_deref()
    }

    /// Failures encountered while redirecting; the remaining steps still ran
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    fn fail(&mut self, action: impl Into<String>, source: io::Error) {
        let err = Error::Redirect {
            action: action.into(),
            source,
        };
        tracing::error!("Stream redirection: {}", err);
        self.errors.push(err);
    }

    fn duplicate(&mut self, dup: &dyn DupDescriptor, src: RawFd, dst: RawFd, what: &str) {
        if let Err(e) = dup.duplicate(src, dst) {
            self.fail(format!("redirect {}", what), e);
        }
    }
}

/// Apply `config` to `fds` once, without a one-shot guard.
///
/// stdin always reads from the null device. Errors are collected and
/// reported, never rolled back.
pub fn apply(
    config: &RedirectConfig,
    fds: StdDescriptors,
    dup: &dyn DupDescriptor,
    now: DateTime<Local>,
) -> Redirection {
    let mut redirection = Redirection {
        target: config.target,
        _null: None,
        _capture: None,
        capture_path: None,
        archived_capture: None,
        errors: Vec::new(),
    };

    let null = match OpenOptions::new().read(true).write(true).open(NULL_DEVICE) {
        Ok(null) => Some(null),
        Err(e) => {
            redirection.fail(format!("open {}", NULL_DEVICE), e);
            None
        }
    };

    if let Some(null) = null.as_ref() {
        redirection.duplicate(dup, null.as_raw_fd(), fds.stdin, "stdin to /dev/null");
    }

    match config.target {
        StdTarget::Console => {}
        StdTarget::Null => {
            if let Some(null) = null.as_ref() {
                redirection.duplicate(dup, null.as_raw_fd(), fds.stdout, "stdout to /dev/null");
                redirection.duplicate(dup, null.as_raw_fd(), fds.stderr, "stderr to /dev/null");
            }
        }
        StdTarget::File => {
            if let Some(capture) = open_capture(&mut redirection, config.dir.as_deref(), now) {
                redirection.duplicate(dup, capture.as_raw_fd(), fds.stdout, "stdout to capture file");
                redirection.duplicate(dup, capture.as_raw_fd(), fds.stderr, "stderr to capture file");
                redirection._capture = Some(capture);
            }
        }
    }

    redirection._null = null;
    redirection
}

/// Archive the previous capture file and open a fresh one
fn open_capture(
    redirection: &mut Redirection,
    dir: Option<&Path>,
    now: DateTime<Local>,
) -> Option<File> {
    let Some(dir) = dir.filter(|d| !d.as_os_str().is_empty()) else {
        redirection.fail(
            "redirect to file",
            io::Error::new(io::ErrorKind::InvalidInput, "no capture directory configured"),
        );
        return None;
    };

    if !dir.exists() {
        if let Err(e) = fs::create_dir_all(dir) {
            redirection.fail(format!("create {}", dir.display()), e);
            return None;
        }
    }

    let latest = dir.join(CAPTURE_FILE);
    if latest.exists() {
        let archived = dir.join(format!(
            "{}.{}",
            CAPTURE_FILE,
            now.format(CAPTURE_ARCHIVE_FORMAT)
        ));
        match fs::rename(&latest, &archived) {
            Ok(()) => redirection.archived_capture = Some(archived),
            Err(e) => redirection.fail(format!("archive {}", latest.display()), e),
        }
    }

    match OpenOptions::new().create(true).append(true).open(&latest) {
        Ok(file) => {
            redirection.capture_path = Some(latest);
            Some(file)
        }
        Err(e) => {
            redirection.fail(format!("open {}", latest.display()), e);
            None
        }
    }
}

/// Applies one redirection for its lifetime, ignoring later requests
pub struct Redirector {
    fds: StdDescriptors,
    dup: Box<dyn DupDescriptor>,
    applied: OnceLock<Redirection>,
}

impl Redirector {
    pub fn new(fds: StdDescriptors, dup: Box<dyn DupDescriptor>) -> Self {
        Self {
            fds,
            dup,
            applied: OnceLock::new(),
        }
    }

    /// A redirector for this process's standard streams
    pub fn for_process() -> Self {
        Self::new(StdDescriptors::PROCESS, dup::platform())
    }

    /// Apply `config` if nothing was applied yet.
    ///
    /// Concurrent first callers block until the single application finishes;
    /// every caller gets the same result.
    pub fn redirect(&self, config: &RedirectConfig) -> &Redirection {
        self.applied
            .get_or_init(|| apply(config, self.fds, self.dup.as_ref(), Local::now()))
    }

    /// The applied redirection, if any
    pub fn current(&self) -> Option<&Redirection> {
        self.applied.get()
    }
}

static PROCESS_REDIRECTOR: OnceLock<Redirector> = OnceLock::new();

/// The redirector for this process's standard streams
pub fn process_redirector() -> &'static Redirector {
    PROCESS_REDIRECTOR.get_or_init(Redirector::for_process)
}

/// Redirect this process's stdin, stdout and stderr, once.
///
/// Call it early from the application; the logger never redirects on its own.
pub fn redirect_std_streams(config: &RedirectConfig) -> &'static Redirection {
    process_redirector().redirect(config)
}
