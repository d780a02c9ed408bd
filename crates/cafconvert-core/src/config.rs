//! Application configuration types.
//!
//! The top-level [`Config`] is deserialized from TOML and carries the server,
//! storage, tool and conversion sections. Every section defaults sensibly, so
//! an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Locations searched, in order, when no config path is given.
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./config.toml",
    "./cafconvert.toml",
    "~/.config/cafconvert/config.toml",
    "/etc/cafconvert/config.toml",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
    pub conversion: ConversionConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Reject configurations the server cannot run with.
    pub fn check(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Validation("server.port cannot be 0".into()));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(Error::Validation(
                "server.max_upload_bytes must be greater than 0".into(),
            ));
        }
        if self.conversion.timeout_secs == 0 {
            return Err(Error::Validation(
                "conversion.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.conversion.bitrate.trim().is_empty() {
            return Err(Error::Validation("conversion.bitrate is empty".into()));
        }
        if self.conversion.codec.trim().is_empty() {
            return Err(Error::Validation("conversion.codec is empty".into()));
        }
        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.storage.upload_dir == self.storage.output_dir {
            warnings.push(
                "storage.upload_dir and storage.output_dir are the same directory".into(),
            );
        }

        if let Some(ref path) = self.tools.ffmpeg_path {
            if !path.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path {} does not exist; falling back to PATH",
                    path.display()
                ));
            }
        }

        if self.conversion.codec != DEFAULT_CODEC {
            warnings.push(format!(
                "conversion.codec is {}; output may not be MP3-compatible",
                self.conversion.codec
            ));
        }

        warnings
    }
}

/// Load configuration from a TOML file and reject unusable values.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Validation(format!("failed to read config file {}: {e}", path.display()))
    })?;

    let config = Config::from_toml(&content)?;
    config.check()?;

    Ok(config)
}

/// Load config from the given path, the default locations, or fall back to
/// the built-in defaults.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {}", path.display());
            return load_config(path);
        }
    }

    tracing::info!("No config file found; using defaults");
    Ok(Config::default())
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body size, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Filesystem locations used during conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the transient upload area; each request gets its own
    /// subdirectory here.
    pub upload_dir: PathBuf,
    /// Deliverable destination for single-file conversions. A leading `~` is
    /// expanded to the user's home directory.
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("~/Downloads"),
        }
    }
}

impl StorageConfig {
    /// The upload root with `~` expanded.
    pub fn resolved_upload_dir(&self) -> PathBuf {
        expand_home(&self.upload_dir)
    }

    /// The deliverable directory with `~` expanded.
    pub fn resolved_output_dir(&self) -> PathBuf {
        expand_home(&self.output_dir)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

// ---------------------------------------------------------------------------
// ToolsConfig
// ---------------------------------------------------------------------------

/// Overrides for external tool locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// ConversionConfig
// ---------------------------------------------------------------------------

const DEFAULT_CODEC: &str = "libmp3lame";

/// How a multi-file submission treats entries that are ineligible or fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPolicy {
    /// Drop bad entries silently and return whatever converted.
    #[default]
    Permissive,
    /// Reject the whole batch on the first bad entry.
    Strict,
}

/// Encoder settings and failure policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// ffmpeg audio encoder (default: libmp3lame).
    pub codec: String,
    /// Audio bitrate passed to `-b:a` (default: 192k).
    pub bitrate: String,
    /// Per-file converter timeout in seconds (default: 300).
    pub timeout_secs: u64,
    /// Multi-file failure policy (default: permissive).
    pub batch_policy: BatchPolicy,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_CODEC.into(),
            bitrate: "192k".into(),
            timeout_secs: 300,
            batch_policy: BatchPolicy::default(),
        }
    }
}

impl ConversionConfig {
    /// The converter timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
