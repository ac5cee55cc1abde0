//! Configuration management for cloudphotos.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{PathBuf, MAIN_SEPARATOR};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::importer::ImportOptions;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "cloudphotos";

/// Default ledger database file name.
const DATABASE_FILE_NAME: &str = "ledger.db";

/// Default log file name.
const LOG_FILE_NAME: &str = "cloudphotos.log";

/// Default external image converter.
pub const DEFAULT_CONVERTER: &str = "magick";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CLOUDPHOTOS_`, `__` between sections)
/// 2. TOML config file at `~/.config/cloudphotos/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger configuration.
    pub storage: StorageConfig,
    /// Import behaviour.
    pub import: ImportConfig,
    /// Log file configuration.
    pub logging: LoggingConfig,
}

/// Ledger-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the ledger database.
    /// Defaults to `~/.local/share/cloudphotos/ledger.db`
    pub database_path: Option<PathBuf>,
}

/// Import-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Appended to every year and month directory name.
    pub dir_suffix: String,
    /// Convert HEIC images to JPEG.
    pub convert_heic: bool,
    /// Program used for conversion, looked up on `PATH`.
    pub converter: String,
    /// Ignore dotfiles in the source directory.
    pub skip_hidden: bool,
}

/// Log file configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to a file.
    pub to_file: bool,
    /// Path to the log file.
    /// Defaults to `~/.local/share/cloudphotos/cloudphotos.log`
    pub file: Option<PathBuf>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            dir_suffix: String::new(),
            convert_heic: true,
            converter: DEFAULT_CONVERTER.to_string(),
            skip_hidden: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            to_file: true,
            file: None, // Will be resolved to default at runtime
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CLOUDPHOTOS_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.import.converter.trim().is_empty() {
            return Err(Error::config_validation("converter must not be empty"));
        }

        // The suffix names directories, it must not create extra levels
        if self.import.dir_suffix.contains(MAIN_SEPARATOR) || self.import.dir_suffix.contains('/')
        {
            return Err(Error::config_validation(format!(
                "dir_suffix must not contain a path separator: {:?}",
                self.import.dir_suffix
            )));
        }

        Ok(())
    }

    /// Get the ledger database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the log file path, or `None` when file logging is disabled.
    #[must_use]
    pub fn log_file(&self) -> Option<PathBuf> {
        if !self.logging.to_file {
            return None;
        }
        Some(
            self.logging
                .file
                .clone()
                .unwrap_or_else(|| Self::default_data_dir().join(LOG_FILE_NAME)),
        )
    }

    /// Build the importer options from this configuration.
    #[must_use]
    pub fn import_options(&self, dry_run: bool) -> ImportOptions {
        ImportOptions {
            dir_suffix: self.import.dir_suffix.clone(),
            convert_heic: self.import.convert_heic,
            skip_hidden: self.import.skip_hidden,
            dry_run,
        }
    }
}
