//! Configuration file support for refcap.
//!
//! This module provides serialization and deserialization of session settings:
//! the fields stamped into saved records, the interaction thresholds, the
//! allowed label values and the log verbosity.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DATASET_TAG, DEFAULT_IMAGE_PREFIX, DEFAULT_TEXT_TYPE, MIN_DRAW_SIZE, NORMALIZED_SCALE,
    SAVED_INDICATOR_MS,
};

/// Log level setting for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get the display name for this log level.
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
        }
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Install the process-wide logger at the given level.
///
/// Does nothing if a logger is already installed (tests, host applications).
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(level: LogLevel) {
    let result = env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .format_timestamp_millis()
        .try_init();

    if result.is_ok() {
        log::debug!("Logging initialized at {}", level.name());
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Session configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Dataset tag written into each record
    #[serde(default = "default_dataset_tag")]
    pub dataset_tag: String,

    /// Text type written into each record
    #[serde(default = "default_text_type")]
    pub text_type: String,

    /// Prefix for the record's `image` reference
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,

    /// Minimum custom-box drag per axis, in canvas pixels
    #[serde(default = "default_min_draw_size")]
    pub min_draw_size: f64,

    /// Display window of the saved acknowledgment, in milliseconds
    #[serde(default = "default_saved_indicator_ms")]
    pub saved_indicator_ms: u64,

    /// Side of the normalized solution coordinate space
    #[serde(default = "default_normalized_scale")]
    pub normalized_scale: u32,

    /// Allowed hops values (empty accepts anything)
    #[serde(default = "default_hops_options")]
    pub hops_options: Vec<String>,

    /// Allowed type tags (empty accepts anything)
    #[serde(default = "default_type_options")]
    pub type_options: Vec<String>,

    /// Allowed attribute tags (empty accepts anything)
    #[serde(default = "default_attribute_options")]
    pub attribute_options: Vec<String>,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_dataset_tag() -> String {
    DEFAULT_DATASET_TAG.to_string()
}

fn default_text_type() -> String {
    DEFAULT_TEXT_TYPE.to_string()
}

fn default_image_prefix() -> String {
    DEFAULT_IMAGE_PREFIX.to_string()
}

fn default_min_draw_size() -> f64 {
    MIN_DRAW_SIZE
}

fn default_saved_indicator_ms() -> u64 {
    SAVED_INDICATOR_MS
}

fn default_normalized_scale() -> u32 {
    NORMALIZED_SCALE
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn default_hops_options() -> Vec<String> {
    strings(&["2", "3", "4", "5"])
}

fn default_type_options() -> Vec<String> {
    strings(&["spatial", "exclude", "verb", "attr"])
}

fn default_attribute_options() -> Vec<String> {
    strings(&["occluded", "truncated", "groupof", "depiction", "inside"])
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            dataset_tag: default_dataset_tag(),
            text_type: default_text_type(),
            image_prefix: default_image_prefix(),
            min_draw_size: default_min_draw_size(),
            saved_indicator_ms: default_saved_indicator_ms(),
            normalized_scale: default_normalized_scale(),
            hops_options: default_hops_options(),
            type_options: default_type_options(),
            attribute_options: default_attribute_options(),
            log_level: LogLevel::default(),
        }
    }

    /// Whether `value` is allowed by `options` (an empty list allows anything).
    pub fn allows(options: &[String], value: &str) -> bool {
        options.is_empty() || options.iter().any(|o| o == value)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Get the default filename for config export.
    pub fn default_filename() -> &'static str {
        "refcap-config.json"
    }

    /// Get the default config file path for auto-load/save.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("refcap").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("refcap")
                    .join(Self::default_filename())
            })
        }
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_default_path() -> Option<Self> {
        Self::load_from_path(&Self::default_path()?)
    }

    /// Load configuration from a file.
    /// Returns None if the file doesn't exist or can't be parsed.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_path(path: &std::path::Path) -> Option<Self> {
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(config) => {
                    log::info!("Loaded configuration from {:?}", path);
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse config file {:?}: {}", path, e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to the default path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save_to_path(&path)
    }

    /// Save configuration to a file, creating parent directories.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
