//! Process-wide standard stream redirection
//!
//! Rewires the OS descriptors behind stdin, stdout and stderr so that output
//! from every part of the process (including child libraries writing to fd 1
//! and 2 directly) ends up in `/dev/null` or in a capture file. Redirection
//! is applied at most once per [`Redirector`]; the process-wide instance
//! backs [`redirect_std_streams`].

#[cfg(unix)]
pub mod dup;
#[cfg(unix)]
mod stdio;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[cfg(unix)]
pub use dup::DupDescriptor;
#[cfg(unix)]
pub use stdio::{
    apply, process_redirector, redirect_std_streams, Redirection, Redirector, StdDescriptors,
};

/// Name of the capture file inside the redirect directory
pub const CAPTURE_FILE: &str = "stdout.log";

/// Suffix pattern for capture files left over from a previous run
pub const CAPTURE_ARCHIVE_FORMAT: &str = "%Y%m%d.%H%M%S";

/// Where stdout and stderr should go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdTarget {
    /// Leave stdout and stderr alone
    #[default]
    Console,
    /// Capture both into `<dir>/stdout.log`
    File,
    /// Discard both
    Null,
}

impl std::str::FromStr for StdTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(StdTarget::Console),
            "file" => Ok(StdTarget::File),
            "null" => Ok(StdTarget::Null),
            other => Err(format!("unknown redirect target '{}'", other)),
        }
    }
}

/// Redirection settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectConfig {
    pub target: StdTarget,
    /// Directory for the capture file, required for [`StdTarget::File`]
    pub dir: Option<PathBuf>,
}

impl RedirectConfig {
    pub fn console() -> Self {
        Self::default()
    }

    pub fn null() -> Self {
        Self {
            target: StdTarget::Null,
            dir: None,
        }
    }

    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self {
            target: StdTarget::File,
            dir: Some(dir.into()),
        }
    }
}
