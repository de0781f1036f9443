//! Diagnostics for the crate itself
//!
//! rotalog reports rotation and redirection failures through `tracing`.
//! These helpers install a subscriber for them, writing either to stderr or
//! into a [`RotatingFileWriter`](crate::rotation::RotatingFileWriter).

mod file_writer;

pub use file_writer::{
    file_layer, init_file_logging, init_stderr_logging, RotatingMakeWriter, DEFAULT_FILTER,
};
