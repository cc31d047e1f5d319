//! On-disk recording format.
//!
//! A session directory looks like:
//!
//! ```text
//! recordings/recording_<unix_timestamp>/
//! ├── frames/frame_000000.png ...
//! ├── recording_data.json      (RecordingManifest)
//! └── statistics.json          (StatisticsReport)
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::action::{ActionCode, NONE_LABEL};
use crate::frame::FrameRecord;

pub const MANIFEST_FILE: &str = "recording_data.json";
pub const STATISTICS_FILE: &str = "statistics.json";
pub const FRAMES_DIR: &str = "frames";

/// `game_version` written by sessions and assumed for recovered manifests.
pub const DEFAULT_GAME_VERSION: &str = "Mario Level 1";

/// `recording_time` of a manifest whose header could not be recovered.
pub const UNKNOWN_RECORDING_TIME: &str = "unknown";

/// chrono format for `recording_time`.
pub const RECORDING_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Strategy that produced a loaded manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryTier {
    /// File parsed as-is
    Strict,
    /// Cut back to the last complete frame object and re-closed
    RepairByTruncation,
    /// Frame objects extracted one by one from raw text
    StructuralScan,
}

impl std::fmt::Display for RecoveryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecoveryTier::Strict => "strict parse",
            RecoveryTier::RepairByTruncation => "repair by truncation",
            RecoveryTier::StructuralScan => "structural frame scan",
        };
        f.write_str(name)
    }
}

/// Session header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub total_frames: u64,
    /// Seconds; `null` when unknown (recovered manifests)
    #[serde(default)]
    pub duration: Option<f64>,
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    pub recording_time: String,
    pub game_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naming_format: Option<String>,
    /// Set when the manifest was salvaged from a damaged file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_by: Option<RecoveryTier>,
}

/// Complete description of one recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingManifest {
    pub recording_info: RecordingInfo,
    pub frame_data: Vec<FrameRecord>,
}

/// Error reading or writing a manifest-format file.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl RecordingManifest {
    /// Synthetic manifest for frames salvaged without a usable header.
    pub fn recovered(frame_data: Vec<FrameRecord>, tier: RecoveryTier) -> Self {
        Self {
            recording_info: RecordingInfo {
                total_frames: frame_data.len() as u64,
                duration: None,
                recording_time: UNKNOWN_RECORDING_TIME.to_string(),
                game_version: DEFAULT_GAME_VERSION.to_string(),
                user_name: None,
                naming_format: None,
                recovered_by: Some(tier),
            },
            frame_data,
        }
    }

    /// Strict parse of manifest text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Strict read of a manifest file.
    pub fn read_from(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write as pretty-printed JSON (2-space indent, one field per line).
    pub fn write_to(&self, path: &Path) -> Result<(), ManifestError> {
        write_json_pretty(path, self)
    }

    /// Frames with a confirmed image.
    pub fn saved_images(&self) -> usize {
        self.frame_data
            .iter()
            .filter(|f| f.image_filename.is_some())
            .count()
    }
}

/// Histograms derived from a frame log at session stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatisticsReport {
    /// Action code (as string) to tick count
    pub action_statistics: BTreeMap<String, u64>,
    /// Character state to tick count
    pub state_statistics: BTreeMap<String, u64>,
    /// Single-input action codes to their labels, plus `"0": "NONE"`
    pub action_descriptions: BTreeMap<String, String>,
}

impl StatisticsReport {
    pub fn from_frames(frames: &[FrameRecord]) -> Self {
        let mut action_statistics = BTreeMap::new();
        let mut state_statistics = BTreeMap::new();

        for frame in frames {
            *action_statistics
                .entry(frame.action_code.to_string())
                .or_insert(0) += 1;
            *state_statistics
                .entry(frame.character_state.to_string())
                .or_insert(0) += 1;
        }

        let mut action_descriptions: BTreeMap<String, String> = ActionCode::single_inputs()
            .iter()
            .map(|(code, label)| (code.to_string(), label.to_string()))
            .collect();
        action_descriptions.insert(ActionCode::empty().to_string(), NONE_LABEL.to_string());

        Self {
            action_statistics,
            state_statistics,
            action_descriptions,
        }
    }

    /// Ticks counted in the action histogram.
    pub fn total_actions(&self) -> u64 {
        self.action_statistics.values().sum()
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ManifestError> {
        write_json_pretty(path, self)
    }
}

fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), ManifestError> {
    let io_err = |source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.write_all(b"\n").map_err(io_err)?;
    writer.flush().map_err(io_err)
}
