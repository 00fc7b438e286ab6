//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::infrastructure::image::compressor::{DEFAULT_MIN_QUALITY, DEFAULT_TARGET_SIZE};
use crate::infrastructure::image::memory_cache::{DEFAULT_CACHE_SIZE, DEFAULT_MAX_BYTES};

pub(super) const APP_NAME: &str = "media-transfer";
pub(super) const APP_QUALIFIER: &str = "com";
pub(super) const APP_ORGANIZATION: &str = "storage";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Media server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Memory cache limits.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Upload compression settings.
    #[serde(default)]
    pub compression: CompressionConfig,
}

/// Media server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server root; relative image paths resolve against it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upload endpoint path.
    #[serde(default = "default_upload_path")]
    pub upload_path: String,

    /// Image list endpoint path.
    #[serde(default = "default_list_path")]
    pub list_path: String,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            upload_path: default_upload_path(),
            list_path: default_list_path(),
            bearer_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Memory cache limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of decoded images.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Maximum decoded size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_bytes: default_max_bytes(),
        }
    }
}

/// Upload compression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Size budget for uploaded images in bytes.
    #[serde(default = "default_target_size")]
    pub target_size: usize,

    /// Lowest JPEG quality to try, in `[0.1, 1.0]`.
    #[serde(default = "default_min_quality")]
    pub min_quality: f32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            min_quality: default_min_quality(),
        }
    }
}

fn default_base_url() -> String {
    "http://164.90.163.215:1337".to_string()
}

fn default_upload_path() -> String {
    "/api/upload".to_string()
}

fn default_list_path() -> String {
    "/api/upload/files".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_entries() -> usize {
    DEFAULT_CACHE_SIZE
}

const fn default_max_bytes() -> usize {
    DEFAULT_MAX_BYTES
}

const fn default_target_size() -> usize {
    DEFAULT_TARGET_SIZE
}

const fn default_min_quality() -> f32 {
    DEFAULT_MIN_QUALITY
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(base_url) = &args.base_url {
            self.server.base_url.clone_from(base_url);
        }
        if let Some(token) = &args.token {
            self.server.bearer_token = Some(token.clone());
        }
        if let Some(target_size) = args.target_size {
            self.compression.target_size = target_size;
        }
        if let Some(min_quality) = args.min_quality {
            self.compression.min_quality = min_quality;
        }
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("media-transfer.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}
