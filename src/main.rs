use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use rotalog::config::{self, Config};
use rotalog::logging;
use rotalog::{Caller, Level, Logger, RotatingFileWriter, RotationUnit, StdTarget};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pipe stdin into a time-rotated log file", long_about = None)]
struct Args {
    /// Config file (default: ~/.rotalog/config.toml)
    #[arg(short, long, env = "ROTALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Log file, overriding root_dir and file from the config
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Level of the records written for each line
    #[arg(short, long)]
    level: Option<Level>,

    /// Rotation interval: hourly, daily or weekly
    #[arg(short, long)]
    rotation: Option<RotationUnit>,

    /// Number of archives to keep
    #[arg(long)]
    retention: Option<u32>,

    /// Also echo records to stdout
    #[arg(long)]
    console: bool,

    /// Redirect this process's stdout and stderr: console, file or null
    #[arg(long)]
    redirect: Option<StdTarget>,

    /// Directory for stdout.log when redirecting to a file
    #[arg(long)]
    redirect_dir: Option<PathBuf>,

    /// Delete expired archives before writing
    #[arg(long)]
    sweep: bool,

    /// Write lines as they are, without headers
    #[arg(long)]
    raw: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(file) = &self.file {
            let dir = file
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            config.root_dir = dir;
            if let Some(name) = file.file_name() {
                config.file = name.to_string_lossy().into_owned();
            }
        }
        if let Some(level) = self.level {
            config.level = level;
        }
        if let Some(rotation) = self.rotation {
            config.rotation = rotation;
        }
        if let Some(retention) = self.retention {
            config.retention = retention;
        }
        if self.console {
            config.console = true;
        }
        if let Some(redirect) = self.redirect {
            config.redirect = redirect;
        }
        if let Some(dir) = &self.redirect_dir {
            config.redirect_dir = Some(dir.clone());
        }
        if self.sweep {
            config.sweep_on_start = true;
        }
    }
}

fn init_diagnostics(config: &Config) -> Result<()> {
    match &config.diagnostics_file {
        Some(path) => {
            let writer = RotatingFileWriter::new(path, config.rotation, config.retention)
                .with_context(|| format!("Failed to open diagnostics file {}", path.display()))?;
            logging::init_file_logging(Arc::new(writer), logging::DEFAULT_FILTER)
        }
        None => logging::init_stderr_logging(logging::DEFAULT_FILTER),
    }
}

/// Keep reading the piped input after fd 0 is pointed at /dev/null
#[cfg(unix)]
fn detach_stdin(config: &Config) -> Result<Box<dyn Read>> {
    use std::fs::File;
    use std::os::fd::AsFd;

    if config.redirect == StdTarget::Console {
        return Ok(Box::new(io::stdin()));
    }

    let input = io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .context("Failed to duplicate stdin")?;
    let redirection = rotalog::redirect_std_streams(&config.redirect_config());
    if !redirection.is_complete() {
        anyhow::bail!(
            "Failed to redirect standard streams: {}",
            redirection.errors()[0]
        );
    }
    Ok(Box::new(File::from(input)))
}

#[cfg(not(unix))]
fn detach_stdin(config: &Config) -> Result<Box<dyn Read>> {
    if config.redirect != StdTarget::Console {
        anyhow::bail!("Stream redirection is only supported on unix");
    }
    Ok(Box::new(io::stdin()))
}

/// Copy `input` line by line into the log, returning the number of lines.
///
/// With `raw` set the bytes go to the writer as they are, newline-terminated;
/// otherwise each line becomes a record at `level`, invalid UTF-8 replaced.
fn pipe_lines<R: BufRead>(
    mut input: R,
    logger: &Logger,
    raw: Option<&RotatingFileWriter>,
    level: Level,
    echo: bool,
) -> Result<u32> {
    let mut line_count: u32 = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = input
            .read_until(b'\n', &mut buf)
            .context("Failed to read stdin")?;
        if n == 0 {
            break;
        }
        line_count = line_count.saturating_add(1);

        let result = match raw {
            Some(writer) => {
                if buf.last() != Some(&b'\n') {
                    buf.push(b'\n');
                }
                if echo {
                    if let Err(e) = io::stdout().write_all(&buf) {
                        tracing::warn!("Failed to echo line {}: {}", line_count, e);
                    }
                }
                writer.write(&buf).map(|_| ())
            }
            None => {
                let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                logger.output(
                    Some(Caller {
                        file: "<stdin>",
                        line: line_count,
                    }),
                    level,
                    &String::from_utf8_lossy(line),
                )
            }
        };
        if let Err(e) = result {
            tracing::warn!("Dropped line {}: {}", line_count, e);
        }
    }
    Ok(line_count)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    args.apply(&mut config);

    init_diagnostics(&config)?;
    tracing::debug!("Config file: {}", config::config_file_path().display());

    if args.raw && !config.file_appender {
        anyhow::bail!("--raw writes to the log file, but file_appender is disabled");
    }

    let input = detach_stdin(&config)?;

    let log_path = config.log_path();
    let registry = rotalog::global_registry();
    let writer = if config.file_appender {
        let writer = registry
            .writer_with(&log_path, || {
                RotatingFileWriter::builder(&log_path, config.rotation, config.retention)
                    .cross_process_lock(config.cross_process_lock)
                    .sweep_on_open(config.sweep_on_start)
            })
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
        Some(writer)
    } else {
        None
    };

    let mut builder = Logger::builder()
        .level(config.level)
        .trace(config.trace)
        .flags(config.header_flags()?);
    if let Some(writer) = &writer {
        builder = builder.file(Arc::clone(writer));
    }
    if config.console {
        builder = builder.console();
    }
    let logger = builder.build();

    tracing::info!(
        "Logging to {} ({}, {} archives)",
        log_path.display(),
        config.rotation,
        config.retention
    );

    let raw = if args.raw { writer.as_deref() } else { None };
    let line_count = pipe_lines(
        BufReader::new(input),
        &logger,
        raw,
        config.level,
        config.console,
    )?;

    logger.flush().context("Failed to flush log")?;
    registry.close_all().context("Failed to close log file")?;
    tracing::info!("Wrote {} lines", line_count);
    Ok(())
}
