//! Configuration management for rotalog

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::logger::{Appenders, HeaderFlags, Level, LoggerOptions};
use crate::redirect::{RedirectConfig, StdTarget};
use crate::rotation::RotationUnit;

/// Logger and redirection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the log file (default: ./logs)
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Log file name inside `root_dir` (default: app.log)
    #[serde(default = "default_file")]
    pub file: String,

    /// Lowest level written: "debug" (default), "info", "warn", ...
    #[serde(default = "default_level")]
    pub level: Level,

    /// Rotation interval: "hourly", "daily" (default) or "weekly"
    #[serde(default = "default_rotation")]
    pub rotation: RotationUnit,

    /// Number of archived files to keep (default: 7)
    #[serde(default = "default_retention")]
    pub retention: u32,

    /// Emit trace records (default: true)
    #[serde(default = "default_trace")]
    pub trace: bool,

    /// Also write records to stdout
    #[serde(default)]
    pub console: bool,

    /// Write records to the log file (default: true)
    #[serde(default = "default_file_appender")]
    pub file_appender: bool,

    /// Header fields, e.g. ["date", "time", "microseconds", "short_file"]
    #[serde(default = "default_flags")]
    pub flags: Vec<String>,

    /// Where stdout and stderr go: "console" (default), "file" or "null"
    #[serde(default)]
    pub redirect: StdTarget,

    /// Directory for `stdout.log` when `redirect = "file"` (default: root_dir)
    #[serde(default)]
    pub redirect_dir: Option<PathBuf>,

    /// Delete expired archives when the log file is opened
    #[serde(default)]
    pub sweep_on_start: bool,

    /// Coordinate rotation with other processes writing the same file
    #[serde(default)]
    pub cross_process_lock: bool,

    /// Rotated file for rotalog's own diagnostics; stderr if unset
    #[serde(default)]
    pub diagnostics_file: Option<PathBuf>,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_file() -> String {
    "app.log".to_string()
}

fn default_level() -> Level {
    Level::Debug
}

fn default_rotation() -> RotationUnit {
    RotationUnit::Daily
}

fn default_retention() -> u32 {
    7
}

fn default_trace() -> bool {
    true
}

fn default_file_appender() -> bool {
    true
}

fn default_flags() -> Vec<String> {
    ["date", "time", "microseconds", "short_file"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            file: default_file(),
            level: default_level(),
            rotation: default_rotation(),
            retention: default_retention(),
            trace: default_trace(),
            console: false,
            file_appender: default_file_appender(),
            flags: default_flags(),
            redirect: StdTarget::default(),
            redirect_dir: None,
            sweep_on_start: false,
            cross_process_lock: false,
            diagnostics_file: None,
        }
    }
}

impl Config {
    /// Load configuration from the default file, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, or return default if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`, creating its directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Full path of the active log file
    pub fn log_path(&self) -> PathBuf {
        self.root_dir.join(&self.file)
    }

    pub fn header_flags(&self) -> Result<HeaderFlags> {
        HeaderFlags::from_names(&self.flags).map_err(anyhow::Error::msg)
    }

    pub fn appenders(&self) -> Appenders {
        let mut appenders = Appenders::empty();
        appenders.set(Appenders::FILE, self.file_appender);
        appenders.set(Appenders::CONSOLE, self.console);
        appenders
    }

    pub fn logger_options(&self) -> LoggerOptions {
        LoggerOptions {
            path: self.log_path(),
            level: self.level,
            unit: self.rotation,
            retention: self.retention,
            trace_on: self.trace,
            appenders: self.appenders(),
        }
    }

    pub fn redirect_config(&self) -> RedirectConfig {
        RedirectConfig {
            target: self.redirect,
            dir: Some(
                self.redirect_dir
                    .clone()
                    .unwrap_or_else(|| self.root_dir.clone()),
            ),
        }
    }
}

/// Get the base configuration directory (~/.rotalog)
/// Falls back to ./.rotalog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".rotalog")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".rotalog"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_path(), PathBuf::from("./logs/app.log"));
        assert_eq!(config.level, Level::Debug);
        assert_eq!(config.rotation, RotationUnit::Daily);
        assert_eq!(config.retention, 7);
        assert!(config.trace);
        assert_eq!(config.appenders(), Appenders::FILE);
        assert_eq!(config.header_flags().unwrap(), HeaderFlags::default());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.rotation = RotationUnit::Hourly;
        config.redirect = StdTarget::Null;
        config.diagnostics_file = Some(PathBuf::from("/var/log/rotalog.log"));

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            level = "warn"
            rotation = "hourly"
            console = true
            "#,
        )
        .unwrap();

        assert_eq!(parsed.level, Level::Warn);
        assert_eq!(parsed.rotation, RotationUnit::Hourly);
        assert_eq!(parsed.retention, 7);
        assert_eq!(parsed.file, "app.log");
        assert_eq!(parsed.appenders(), Appenders::FILE | Appenders::CONSOLE);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(toml::from_str::<Config>(r#"rotation = "monthly""#).is_err());
        assert!(toml::from_str::<Config>(r#"retention = -1"#).is_err());

        let config: Config = toml::from_str(r#"flags = ["date", "nanos"]"#).unwrap();
        assert!(config.header_flags().is_err());
    }

    #[test]
    fn test_load_from_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.retention = 30;
        config.sweep_on_start = true;

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_from_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "level = [").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_redirect_dir_defaults_to_root_dir() {
        let mut config = Config::default();
        config.redirect = StdTarget::File;
        assert_eq!(
            config.redirect_config(),
            RedirectConfig::file("./logs")
        );

        config.redirect_dir = Some(PathBuf::from("/tmp/capture"));
        assert_eq!(config.redirect_config().dir, Some(PathBuf::from("/tmp/capture")));
    }

    #[test]
    fn test_logger_options_follow_config() {
        let mut config = Config::default();
        config.level = Level::Error;
        config.file_appender = false;
        config.console = true;

        let options = config.logger_options();
        assert_eq!(options.level, Level::Error);
        assert_eq!(options.appenders, Appenders::CONSOLE);
        assert_eq!(options.path, PathBuf::from("./logs/app.log"));
    }

    #[test]
    fn test_config_dir_does_not_panic() {
        let dir = config_dir();
        assert!(dir.ends_with(".rotalog"));
    }
}
