//! Capture configuration (`capture.toml`)
//!
//! Recording mode, quality and frame skip are passed explicitly into the
//! [`Recorder`](crate::Recorder) rather than read from process-wide state.
//! Settings are stored in TOML format in the platform-specific config directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::Quality;
use crate::manifest::DEFAULT_GAME_VERSION;

/// Name of the config file inside [`config_dir`].
pub const CONFIG_FILE: &str = "capture.toml";

/// Recording settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Whether sessions record at all (default: false)
    #[serde(default)]
    pub enabled: bool,
    /// Save an image every N ticks; 1 saves every tick (default: 1)
    #[serde(default = "default_frame_skip")]
    pub frame_skip: u32,
    /// Image quality tier (default: medium)
    #[serde(default)]
    pub quality: Quality,
    /// Directory that receives `recording_<timestamp>` folders (default: recordings)
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Image-save queue capacity (default: 64)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Longest a saturated submit may stall the game loop (default: 10ms)
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
    /// Bound on draining the save queue at stop (default: 5000ms)
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Save worker queue poll interval (default: 100ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// `game_version` written into manifests
    #[serde(default = "default_game_version")]
    pub game_version: String,
}

fn default_frame_skip() -> u32 {
    1
}
fn default_output_root() -> PathBuf {
    PathBuf::from("recordings")
}
fn default_queue_capacity() -> usize {
    64
}
fn default_submit_timeout_ms() -> u64 {
    10
}
fn default_shutdown_timeout_ms() -> u64 {
    5000
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_game_version() -> String {
    DEFAULT_GAME_VERSION.to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frame_skip: default_frame_skip(),
            quality: Quality::default(),
            output_root: default_output_root(),
            queue_capacity: default_queue_capacity(),
            submit_timeout_ms: default_submit_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            game_version: default_game_version(),
        }
    }
}

/// Error loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl CaptureConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Human-readable warnings for values that will be adjusted.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.frame_skip == 0 {
            warnings.push("frame_skip must be at least 1, using 1".to_string());
        }
        if self.queue_capacity == 0 {
            warnings.push("queue_capacity must be at least 1, using 1".to_string());
        }
        if self.submit_timeout_ms > 100 {
            warnings.push(format!(
                "submit_timeout_ms = {} may stall the game loop when the save queue is full",
                self.submit_timeout_ms
            ));
        }
        warnings
    }

    /// Copy with out-of-range values clamped to their minimum.
    pub fn normalized(mut self) -> Self {
        self.frame_skip = self.frame_skip.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self
    }
}

/// Returns the platform-specific configuration directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "playcap", "playcap")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from the platform config directory.
///
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> CaptureConfig {
    let Some(path) = config_dir().map(|dir| dir.join(CONFIG_FILE)) else {
        return CaptureConfig::default();
    };
    if !path.exists() {
        return CaptureConfig::default();
    }
    match load_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring capture config: {}", e);
            CaptureConfig::default()
        }
    }
}

/// Loads the configuration from an explicit file.
pub fn load_from(path: &Path) -> Result<CaptureConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
