//! TOML configuration for the bridge.
//!
//! The file is looked up in this order:
//!
//! 1. the path in the `ASTBRIDGE_CONFIG` environment variable;
//! 2. `$XDG_CONFIG_HOME/astbridge/config.toml`;
//! 3. `~/.config/astbridge/config.toml`.
//!
//! A missing file is not an error: the bridge runs with defaults, which match
//! the stock BMC device nodes.
//!
//! ```toml
//! [capture]
//! device_path = "/dev/videocap"
//! wakeup_ms = 50
//! frame_dump_path = "/tmp/videocap.bin"
//!
//! [hid]
//! device_path = "/dev/usb"
//! mouse_mode = "absolute"
//! ```
//!
//! Every field carries `#[serde(default = "...")]`, so any subset of the
//! sections and fields above may be given.

use std::path::{Path, PathBuf};

use ast_core::protocol::MouseMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ASTBRIDGE_CONFIG";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub hid: HidConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Video capture engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    #[serde(default = "default_capture_device")]
    pub device_path: PathBuf,
    /// Length of the shared memory mapping.
    #[serde(default = "default_mmap_size")]
    pub mmap_size: usize,
    /// Interval between capture ticks, in milliseconds.
    #[serde(default = "default_wakeup_ms")]
    pub wakeup_ms: u64,
    /// Re-serve the last frame when the engine reports no change.
    #[serde(default = "default_true")]
    pub resend_cached_frame: bool,
    /// Where to dump each captured frame.  Unset disables dumping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_dump_path: Option<PathBuf>,
}

/// USB HID redirector settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HidConfig {
    #[serde(default = "default_hid_device")]
    pub device_path: PathBuf,
    #[serde(default)]
    pub mouse_mode: MouseModeSetting,
    /// Use the blocking LED query call instead of the non-blocking one.
    #[serde(default)]
    pub led_query_blocking: bool,
}

/// Primary surface used before the first frame reports a resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub default_width: u32,
    #[serde(default = "default_height")]
    pub default_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Configured pointer mode of the emulated mouse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MouseModeSetting {
    #[default]
    Relative,
    Absolute,
}

impl From<MouseModeSetting> for MouseMode {
    fn from(setting: MouseModeSetting) -> Self {
        match setting {
            MouseModeSetting::Relative => MouseMode::Relative,
            MouseModeSetting::Absolute => MouseMode::Absolute,
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_capture_device() -> PathBuf {
    PathBuf::from("/dev/videocap")
}
fn default_mmap_size() -> usize {
    ast_core::domain::capture::CAPTURE_MMAP_SIZE
}
fn default_wakeup_ms() -> u64 {
    50
}
fn default_true() -> bool {
    true
}
fn default_hid_device() -> PathBuf {
    PathBuf::from("/dev/usb")
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_path: default_capture_device(),
            mmap_size: default_mmap_size(),
            wakeup_ms: default_wakeup_ms(),
            resend_cached_frame: default_true(),
            frame_dump_path: None,
        }
    }
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            device_path: default_hid_device(),
            mouse_mode: MouseModeSetting::default(),
            led_query_blocking: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_width: default_width(),
            default_height: default_height(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when neither
/// `XDG_CONFIG_HOME` nor `HOME` is set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the config file path, honouring [`CONFIG_ENV_VAR`].
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if no override is set and the
/// base directory cannot be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from its default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<BridgeConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<BridgeConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BridgeConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &BridgeConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("astbridge"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
