//! tracing integration
//!
//! Routes the crate's own diagnostics (and those of the application that
//! installs the subscriber) either to stderr or into a rotated file.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::rotation::RotatingFileWriter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "rotalog=info";

/// Writer factory for tracing-subscriber over a shared rotating writer
#[derive(Debug, Clone)]
pub struct RotatingMakeWriter {
    writer: Arc<RotatingFileWriter>,
}

impl RotatingMakeWriter {
    pub fn new(writer: Arc<RotatingFileWriter>) -> Self {
        Self { writer }
    }
}

impl<'a> MakeWriter<'a> for RotatingMakeWriter {
    type Writer = &'a RotatingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        &self.writer
    }
}

/// A plain-text fmt layer writing into `writer`
pub fn file_layer<S>(writer: Arc<RotatingFileWriter>) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(RotatingMakeWriter::new(writer))
        .with_ansi(false)
        .with_target(true)
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into())
}

/// Install a global subscriber writing into `writer`
pub fn init_file_logging(writer: Arc<RotatingFileWriter>, default_filter: &str) -> Result<()> {
    let path = writer.path().to_path_buf();
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(file_layer(writer))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!("Diagnostics logging to: {}", path.display());
    Ok(())
}

/// Install a global subscriber writing to stderr
pub fn init_stderr_logging(default_filter: &str) -> Result<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")
}
