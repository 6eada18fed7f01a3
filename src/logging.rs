//! File logging for Spacehost.
//!
//! Logs go to timestamped files under ~/.spacehost/logs/; files older than
//! the retention period are removed at startup.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default log retention in hours.
pub const DEFAULT_LOG_RETENTION_HOURS: u32 = 24;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log retention period in hours.
    pub retention_hours: u32,
    /// Log level (trace, debug, info, warn, error, off).
    pub level: String,
    /// Whether logging is enabled.
    pub enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            retention_hours: DEFAULT_LOG_RETENTION_HOURS,
            level: DEFAULT_LOG_LEVEL.to_string(),
            enabled: true,
        }
    }
}

impl LogConfig {
    /// Parses log level from string.
    #[must_use]
    pub fn parse_level(value: &str) -> String {
        match value.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" | "warning" => "warn",
            "error" => "error",
            "off" | "none" | "disabled" => "off",
            _ => DEFAULT_LOG_LEVEL,
        }
        .to_string()
    }

    /// Parses retention hours from string.
    #[must_use]
    pub fn parse_retention(value: &str) -> u32 {
        value.parse().unwrap_or(DEFAULT_LOG_RETENTION_HOURS)
    }

    /// Returns true if nothing should be logged.
    #[must_use]
    pub fn is_off(&self) -> bool {
        !self.enabled || self.level == "off"
    }
}

/// Returns the log directory path (~/.spacehost/logs/).
#[must_use]
pub fn log_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".spacehost")
        .join("logs")
}

/// Returns a fresh log file path inside `dir`.
#[must_use]
pub fn log_file_path(dir: &Path) -> PathBuf {
    let now = chrono::Local::now();
    dir.join(format!("spacehost_{}.log", now.format("%Y-%m-%d_%H-%M-%S")))
}

/// Removes `.log` files in `dir` older than `retention_hours`.
///
/// # Errors
/// Returns error if the directory cannot be read.
pub fn cleanup_old_logs(dir: &Path, retention_hours: u32) -> io::Result<u32> {
    if !dir.exists() {
        return Ok(0);
    }

    let retention = Duration::from_secs(u64::from(retention_hours) * 3600);
    let now = SystemTime::now();
    let mut deleted = 0;

    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > retention);

        if expired && fs::remove_file(&path).is_ok() {
            deleted += 1;
        }
    }

    Ok(deleted)
}

/// Initializes file logging in the default log directory.
///
/// # Errors
/// Returns error if the log directory or file cannot be created.
pub fn init(config: &LogConfig) -> io::Result<Option<PathBuf>> {
    init_in(config, &log_directory())
}

/// Initializes file logging in `dir`, returning the log file path.
///
/// Does nothing and returns `None` when logging is off. `RUST_LOG`
/// overrides the configured level.
///
/// # Errors
/// Returns error if the log directory or file cannot be created.
pub fn init_in(config: &LogConfig, dir: &Path) -> io::Result<Option<PathBuf>> {
    if config.is_off() {
        return Ok(None);
    }

    fs::create_dir_all(dir)?;
    let deleted = cleanup_old_logs(dir, config.retention_hours)?;

    let log_path = log_file_path(dir);
    let log_file = File::create(&log_path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::other(e.to_string()))?;

    tracing::info!("Spacehost logging initialized");
    tracing::info!("Log file: {}", log_path.display());
    tracing::info!("Log level: {}", config.level);
    if deleted > 0 {
        tracing::info!("Cleaned up {} old log file(s)", deleted);
    }

    Ok(Some(log_path))
}
