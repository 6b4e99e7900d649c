//! Configuration management for skufill.
//!
//! Configuration is read from `~/.config/skufill/config.toml` unless a path
//! is given on the command line. If the default file doesn't exist, a
//! default configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::batch::PacingConfig;
use crate::lookup::{LookupConfig, PageExtractor};
use crate::scheduler::ScheduleConfig;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lookup: LookupConfig,
    pub pacing: PacingConfig,
    pub schedule: ScheduleConfig,
    pub paths: PathsConfig,
    pub log: LogConfig,
}

/// On-disk locations. Unset entries resolve under the user data directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub database: Option<PathBuf>,
    pub uploads_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub lock_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Rotate the scrape log once it grows past this many bytes
    pub max_bytes: Option<u64>,
}

impl PathsConfig {
    fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skufill")
    }

    fn resolve(&self, value: &Option<PathBuf>, default_name: &str) -> PathBuf {
        value
            .clone()
            .unwrap_or_else(|| Self::data_dir().join(default_name))
    }

    pub fn database(&self) -> PathBuf {
        self.resolve(&self.database, "skufill.db")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.resolve(&self.uploads_dir, "uploads")
    }

    pub fn log_file(&self) -> PathBuf {
        self.resolve(&self.log_file, "scrape_log.txt")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.resolve(&self.lock_file, "update.lock")
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path: `~/.config/skufill/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("skufill").join("config.toml"))
    }

    /// Reject ranges with min above max and patterns without a capture group.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pacing.min_delay_secs > self.pacing.max_delay_secs {
            return Err(ConfigError::Invalid(format!(
                "pacing.min_delay_secs ({}) exceeds pacing.max_delay_secs ({})",
                self.pacing.min_delay_secs, self.pacing.max_delay_secs
            )));
        }

        if self.schedule.min_offset_secs > self.schedule.max_offset_secs {
            return Err(ConfigError::Invalid(format!(
                "schedule.min_offset_secs ({}) exceeds schedule.max_offset_secs ({})",
                self.schedule.min_offset_secs, self.schedule.max_offset_secs
            )));
        }

        PageExtractor::from_config(&self.lookup)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(())
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# skufill configuration
#
# Every key is optional. Commented keys show the built-in default.

[lookup]
# Lookup site root; the barcode is appended as the last path segment
base_url = "https://www.barcodelookup.com"

# Request timeout in seconds (unset = no explicit timeout)
# timeout_secs = 30

# Override the User-Agent header
# user_agent = "Mozilla/5.0 ..."

# Regexes whose first capture group holds the description / image URL
# description_pattern = '(?is)<div[^>]*class="[^"]*product-description[^"]*"[^>]*>(.*?)</div>'
# image_pattern = '(?is)<div[^>]*id="largeProductImage"[^>]*>.*?<img[^>]*src="([^"]+)"'

[pacing]
# Random pause after each lookup, in seconds (inclusive range)
min_delay_secs = 5
max_delay_secs = 15

[schedule]
# Next run is armed this many seconds after a run finishes (inclusive range)
min_offset_secs = 1800
max_offset_secs = 3600

# How often the daemon checks for a due run
poll_interval_secs = 60

[paths]
# Defaults live under the user data directory, e.g. ~/.local/share/skufill/
# database = "/var/lib/skufill/skufill.db"
# uploads_dir = "/var/lib/skufill/uploads"
# log_file = "/var/lib/skufill/scrape_log.txt"
# lock_file = "/var/lib/skufill/update.lock"

[log]
# Rotate the scrape log to <name>.1 past this size (unset = never rotate)
# max_bytes = 10485760
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
