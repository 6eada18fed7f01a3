//! Configuration module for Spacehost.
//!
//! Handles loading and parsing the .spacehostrc configuration file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::extension::extensions_dir;
use crate::logging::LogConfig;
use crate::space::host::{DEFAULT_LAUNCH_TIMEOUT, DEFAULT_STOP_TIMEOUT};
use crate::space::hub::DEFAULT_HUB_ENDPOINT;
use crate::space::requirements::DEFAULT_PYTHON;

/// Default .spacehostrc file content with all settings documented.
const DEFAULT_SPACEHOSTRC: &str = r#"# Spacehost Configuration File
# =============================
# This file is read on application startup.
# Lines starting with '#' are comments.
#
# Space Servers
# -------------
# Interface space servers bind to (default: 127.0.0.1)
# server_name = 127.0.0.1
#
# First port tried when looking for a free port (default: 7860)
# port = 7860
#
# Seconds to wait for a space to start / stop
# launch_timeout = 120
# stop_timeout = 30
#
# Open each launched space in the default browser (default: false)
# open_browser = false

# Extensions
# ----------
# Directory scanned for extensions (default: ~/.spacehost/extensions)
# extensions_dir = ~/.spacehost/extensions

# Downloads
# ---------
# Hub that space repositories are downloaded from
# hub_endpoint = https://huggingface.co
# hub_token = hf_xxx
#
# Copy repositories from a local directory instead of the hub
# (a repository owner/name is read from <mirror_source>/owner/name)
# mirror_source = /srv/space-mirrors

# Requirements
# ------------
# Interpreter used to run `pip install -r requirements.txt`
# python = python3

# Logging Configuration
# ---------------------
# Logs are stored in ~/.spacehost/logs/ with automatic cleanup.
#
# log_enabled = true       # Enable/disable file logging (true/false)
# log_level = info         # Log level: trace, debug, info, warn, error, off
# log_retention = 24       # Hours to keep log files (default: 24)
"#;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the config file.
    pub config_path: PathBuf,
    /// Interface space servers bind to.
    pub server_name: Option<String>,
    /// First port tried by the free port probe.
    pub port: Option<u16>,
    /// How long a launch may take.
    pub launch_timeout: Duration,
    /// How long a shutdown may take.
    pub stop_timeout: Duration,
    /// Open launched spaces in the browser.
    pub open_browser: bool,
    /// Directory scanned for extensions.
    pub extensions_dir: PathBuf,
    /// Hub base URL.
    pub hub_endpoint: String,
    /// Hub bearer token.
    pub hub_token: Option<String>,
    /// Local directory used instead of the hub.
    pub mirror_source: Option<PathBuf>,
    /// Python interpreter for requirements.
    pub python: String,
    /// Logging configuration.
    pub log_config: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            server_name: None,
            port: None,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            open_browser: false,
            extensions_dir: extensions_dir().unwrap_or_else(|| PathBuf::from("extensions")),
            hub_endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            hub_token: None,
            mirror_source: None,
            python: DEFAULT_PYTHON.to_string(),
            log_config: LogConfig::default(),
        }
    }
}

impl Config {
    /// Returns the default config file path (~/.spacehostrc).
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".spacehostrc")
    }

    /// Loads configuration from the default path, creating it if it doesn't exist.
    ///
    /// # Errors
    /// Returns error if config cannot be read.
    pub fn load() -> io::Result<Self> {
        let path = Self::default_config_path();
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    ///
    /// # Errors
    /// Returns error if config cannot be read.
    pub fn load_from(path: &Path) -> io::Result<Self> {
        if !path.exists() {
            Self::create_default_config(path)?;
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self {
            config_path: path.to_path_buf(),
            ..Self::default()
        };
        config.parse(&content);

        Ok(config)
    }

    /// Parses configuration content over the defaults.
    #[must_use]
    pub fn from_content(content: &str) -> Self {
        let mut config = Self::default();
        config.parse(content);
        config
    }

    /// Creates the default config file.
    fn create_default_config(path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_SPACEHOSTRC.as_bytes())?;
        Ok(())
    }

    /// Parses the config file content.
    fn parse(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                // Remove inline comments
                let value = value.split('#').next().unwrap_or(value).trim();

                self.apply_setting(key, value);
            }
        }
    }

    /// Applies a single setting.
    fn apply_setting(&mut self, key: &str, value: &str) {
        match key {
            "server_name" | "host" => {
                self.server_name = non_empty(value);
            }
            "port" => {
                if let Ok(port) = value.parse() {
                    self.port = Some(port);
                }
            }
            "launch_timeout" => {
                if let Ok(secs) = value.parse() {
                    self.launch_timeout = Duration::from_secs(secs);
                }
            }
            "stop_timeout" => {
                if let Ok(secs) = value.parse() {
                    self.stop_timeout = Duration::from_secs(secs);
                }
            }
            "open_browser" | "inbrowser" => {
                self.open_browser = parse_flag(value);
            }
            "extensions_dir" => {
                if !value.is_empty() {
                    self.extensions_dir = expand_home(value);
                }
            }
            "hub_endpoint" => {
                if !value.is_empty() {
                    self.hub_endpoint = value.to_string();
                }
            }
            "hub_token" => {
                self.hub_token = non_empty(value);
            }
            "mirror_source" => {
                self.mirror_source = non_empty(value).map(|v| expand_home(&v));
            }
            "python" => {
                if !value.is_empty() {
                    self.python = value.to_string();
                }
            }
            "log_level" => {
                self.log_config.level = LogConfig::parse_level(value);
            }
            "log_retention" | "log_retention_hours" => {
                self.log_config.retention_hours = LogConfig::parse_retention(value);
            }
            "log_enabled" | "logging" => {
                self.log_config.enabled = parse_flag(value);
            }
            _ => {
                tracing::debug!("Ignoring unknown setting: {}", key);
            }
        }
    }

    /// Reloads the configuration from disk.
    ///
    /// # Errors
    /// Returns error if config cannot be read.
    pub fn reload(&mut self) -> io::Result<()> {
        let path = self.config_path.clone();
        *self = Self::load_from(&path)?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1" | "on")
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Expands a leading `~/` to the home directory.
fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|h| h.join(rest))
            .unwrap_or_else(|| PathBuf::from(value)),
        None => PathBuf::from(value),
    }
}
