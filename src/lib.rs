//! rotalog - time-rotated log files and process-wide stream redirection
//!
//! The core is [`RotatingFileWriter`], a file that rotates on hour, day or
//! week boundaries and keeps a fixed number of archives. A level-filtered
//! [`Logger`] formats records onto one or more writers, and
//! [`redirect`] rewires stdin, stdout and stderr at the descriptor level.

mod macros;

pub mod config;
pub mod error;
pub mod logger;
pub mod logging;
pub mod redirect;
pub mod rotation;

pub use error::{Error, Result};
pub use logger::registry::global as global_registry;
pub use logger::{
    default_logger, Appenders, Caller, HeaderFlags, Level, LogSink, Logger, LoggerBuilder,
    LoggerOptions, Registry,
};
#[cfg(unix)]
pub use redirect::redirect_std_streams;
pub use redirect::{RedirectConfig, StdTarget};
pub use rotation::{RotatingFileWriter, RotationUnit, WriterBuilder};
