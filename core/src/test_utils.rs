//! Shared fixtures for unit tests.

use std::path::Path;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::action::ActionCode;
use crate::capture::{FrameImage, Quality};
use crate::frame::{CharacterState, FrameRecord};
use crate::manifest::{DEFAULT_GAME_VERSION, RecordingInfo, RecordingManifest};
use crate::sink::{FrameEncoder, PngEncoder, SaveError, sequence_filename};

/// Solid-color RGBA frame whose every byte is `fill`.
pub fn test_frame(width: u32, height: u32, fill: u8) -> FrameImage {
    FrameImage::from_rgba(width, height, vec![fill; (width * height * 4) as usize])
        .expect("valid test frame")
}

/// Frame record with an explicit filename.
pub fn sample_record(
    frame_id: u64,
    action_bits: u32,
    dead: bool,
    filename: Option<&str>,
) -> FrameRecord {
    let mut record = FrameRecord::new(
        frame_id,
        frame_id as f64 / 60.0,
        ActionCode::from_bits_retain(action_bits),
        CharacterState::from(if frame_id % 3 == 0 { "small" } else { "big" }),
        dead,
        filename.is_some(),
    );
    record.image_filename = filename.map(str::to_string);
    record
}

/// Manifest with `frames` records; every even tick has a sequential image.
pub fn sample_manifest(frames: u64) -> RecordingManifest {
    let actions = [0u32, 1, 2, 4, 8, 16, 5, 10, 20, 0];
    let frame_data = (0..frames)
        .map(|i| {
            let filename = (i % 2 == 0).then(|| sequence_filename(i / 2));
            sample_record(
                i,
                actions[(i as usize) % actions.len()],
                i + 1 == frames,
                filename.as_deref(),
            )
        })
        .collect();

    RecordingManifest {
        recording_info: RecordingInfo {
            total_frames: frames,
            duration: Some(frames as f64 / 60.0 + 0.123_456_789),
            recording_time: "2025-10-22 09:15:54".to_string(),
            game_version: DEFAULT_GAME_VERSION.to_string(),
            user_name: None,
            naming_format: None,
            recovered_by: None,
        },
        frame_data,
    }
}

/// Encoder that reports each start and blocks until released.
///
/// Frames are identified by their first pixel byte. Dropping the release
/// sender lets every pending encode proceed.
pub struct GateEncoder {
    started: Sender<u64>,
    release: Receiver<()>,
}

impl GateEncoder {
    /// Returns the encoder, the start notifications and the release handle.
    pub fn new() -> (Self, Receiver<u64>, Sender<()>) {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let encoder = Self {
            started: started_tx,
            release: release_rx,
        };
        (encoder, started_rx, release_tx)
    }
}

impl FrameEncoder for GateEncoder {
    fn encode(&self, image: &FrameImage, path: &Path, quality: Quality) -> Result<(), SaveError> {
        let _ = self.started.send(image.pixels()[0] as u64);
        let _ = self.release.recv();
        PngEncoder.encode(image, path, quality)
    }
}

/// Encoder that fails for chosen frames (keyed by first pixel byte).
pub struct FailingEncoder {
    fail: Vec<u8>,
}

impl FailingEncoder {
    pub fn new(fail: &[u8]) -> Self {
        Self {
            fail: fail.to_vec(),
        }
    }
}

impl FrameEncoder for FailingEncoder {
    fn encode(&self, image: &FrameImage, path: &Path, quality: Quality) -> Result<(), SaveError> {
        if self.fail.contains(&image.pixels()[0]) {
            return Err(SaveError::Io(std::io::Error::other("disk full")));
        }
        PngEncoder.encode(image, path, quality)
    }
}
