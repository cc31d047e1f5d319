//! Per-tick frame records and the in-memory session log.

use serde::{Deserialize, Serialize};

use crate::action::ActionCode;

/// Opaque character state tag supplied by the game loop.
///
/// Games report either a numeric id or a short name; both round-trip through
/// the manifest unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacterState {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for CharacterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharacterState::Int(id) => write!(f, "{}", id),
            CharacterState::Text(name) => f.write_str(name),
        }
    }
}

impl From<&str> for CharacterState {
    fn from(name: &str) -> Self {
        CharacterState::Text(name.to_string())
    }
}

impl From<String> for CharacterState {
    fn from(name: String) -> Self {
        CharacterState::Text(name)
    }
}

impl From<i64> for CharacterState {
    fn from(id: i64) -> Self {
        CharacterState::Int(id)
    }
}

/// One tick's observed state plus its optional image reference.
///
/// Serialized field names follow the manifest schema (`mario_state`,
/// `mario_dead`, `frame_filename`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// 0-based tick index, dense within a session
    pub frame_id: u64,
    /// Seconds since recording start
    pub timestamp: f64,
    pub action_code: ActionCode,
    pub action_binary: String,
    pub action_names: Vec<String>,
    #[serde(rename = "mario_state")]
    pub character_state: CharacterState,
    #[serde(rename = "mario_dead")]
    pub character_dead: bool,
    /// Whether this tick's image was queued for persistence
    #[serde(default)]
    pub frame_saved: bool,
    /// Filename assigned by the image sink; `None` until the write is
    /// confirmed, or forever if the frame was skipped or dropped
    #[serde(rename = "frame_filename", default)]
    pub image_filename: Option<String>,
}

impl FrameRecord {
    /// Build a record for a tick; the image filename starts unset.
    pub fn new(
        frame_id: u64,
        timestamp: f64,
        action_code: ActionCode,
        character_state: CharacterState,
        character_dead: bool,
        frame_saved: bool,
    ) -> Self {
        Self {
            frame_id,
            timestamp,
            action_code,
            action_binary: action_code.binary(),
            action_names: action_code
                .labels()
                .iter()
                .map(|label| label.to_string())
                .collect(),
            character_state,
            character_dead,
            frame_saved,
            image_filename: None,
        }
    }
}

/// Append-only, ordered log of a session's frame records.
///
/// Records are indexed by `frame_id`, which equals their position.
#[derive(Debug, Clone, Default)]
pub struct FrameLog {
    records: Vec<FrameRecord>,
}

impl FrameLog {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append the next record. Its `frame_id` must equal the current length.
    pub fn push(&mut self, record: FrameRecord) {
        debug_assert_eq!(record.frame_id, self.records.len() as u64);
        self.records.push(record);
    }

    pub fn get(&self, frame_id: u64) -> Option<&FrameRecord> {
        self.records.get(frame_id as usize)
    }

    /// Stamp the image filename of an existing record.
    ///
    /// Returns `false` if no record with that id exists.
    pub fn set_image_filename(&mut self, frame_id: u64, filename: Option<String>) -> bool {
        match self.records.get_mut(frame_id as usize) {
            Some(record) => {
                record.image_filename = filename;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<FrameRecord> {
        self.records
    }

    /// Number of records with a confirmed image.
    pub fn saved_images(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.image_filename.is_some())
            .count()
    }
}
