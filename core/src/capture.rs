//! Frame buffer snapshots and image quality tiers.
//!
//! The game loop hands the recorder an immutable [`FrameImage`] per saved
//! tick. Encoding (and any downscaling required by the [`Quality`] tier)
//! happens later on the image-save worker, never on the game thread.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::action::InputState;
use crate::frame::CharacterState;

/// Trait for game loops that can be observed by the recorder.
///
/// Every accessor is read-only; the recorder never calls back into game
/// logic. Implement this to use [`Recorder::capture`](crate::Recorder::capture).
pub trait FrameSource {
    /// Currently held input signals.
    fn input_state(&self) -> InputState;

    /// Character state tag (e.g. `"small"`, `"big"`, or a numeric id).
    fn character_state(&self) -> CharacterState;

    /// Whether the character is in a terminal (dead) condition.
    fn character_dead(&self) -> bool;

    /// Snapshot of the rendered frame buffer.
    ///
    /// Only called on ticks whose image will be persisted.
    fn snapshot(&self) -> FrameImage;
}

/// Image quality tier applied by the save worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// 50% linear scale
    Low,
    /// 75% linear scale
    #[default]
    Medium,
    /// Original resolution
    High,
}

/// Error parsing a [`Quality`] name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quality '{0}' (expected low, medium or high)")]
pub struct ParseQualityError(pub String);

impl Quality {
    /// Linear scale factor for this tier.
    pub fn scale(self) -> f32 {
        match self {
            Quality::Low => 0.5,
            Quality::Medium => 0.75,
            Quality::High => 1.0,
        }
    }

    /// Output dimensions for a source frame (truncated, never below 1px).
    pub fn scaled_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        let scale = self.scale();
        let w = ((width as f32 * scale) as u32).max(1);
        let h = ((height as f32 * scale) as u32).max(1);
        (w, h)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }
}

impl FromStr for Quality {
    type Err = ParseQualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            _ => Err(ParseQualityError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error constructing a [`FrameImage`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameImageError {
    #[error("frame has zero area ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("pixel buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Immutable RGBA8 snapshot of a rendered frame.
///
/// Cloning shares the pixel buffer, so handing a snapshot to the save worker
/// costs a reference count bump on the game thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl FrameImage {
    /// Wrap tightly packed RGBA8 pixels (`width * height * 4` bytes).
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameImageError> {
        if width == 0 || height == 0 {
            return Err(FrameImageError::Empty { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(FrameImageError::SizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Produce the image to encode for a quality tier.
    ///
    /// `High` keeps the original resolution; lower tiers resize with nearest
    /// neighbour sampling to keep pixel art crisp.
    pub fn prepare(&self, quality: Quality) -> RgbaImage {
        // Dimensions were validated at construction, so from_raw cannot fail
        let full = RgbaImage::from_raw(self.width, self.height, self.pixels.to_vec())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height));

        if quality == Quality::High {
            return full;
        }
        let (w, h) = quality.scaled_dimensions(self.width, self.height);
        image::imageops::resize(&full, w, h, FilterType::Nearest)
    }

    /// Encode as PNG at `path` for the given quality tier.
    pub fn write_png(&self, path: &Path, quality: Quality) -> image::ImageResult<()> {
        self.prepare(quality).save_with_format(path, ImageFormat::Png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32) -> FrameImage {
        FrameImage::from_rgba(width, height, vec![200; (width * height * 4) as usize]).unwrap()
    }

    #[test]
    fn test_quality_scaled_dimensions() {
        assert_eq!(Quality::Low.scaled_dimensions(800, 600), (400, 300));
        assert_eq!(Quality::Medium.scaled_dimensions(800, 600), (600, 450));
        assert_eq!(Quality::High.scaled_dimensions(800, 600), (800, 600));
        // Truncation, clamped to one pixel
        assert_eq!(Quality::Medium.scaled_dimensions(5, 1), (3, 1));
        assert_eq!(Quality::Low.scaled_dimensions(1, 1), (1, 1));
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!("low".parse::<Quality>(), Ok(Quality::Low));
        assert_eq!("HIGH".parse::<Quality>(), Ok(Quality::High));
        assert_eq!("Medium".parse::<Quality>(), Ok(Quality::Medium));
        assert!("ultra".parse::<Quality>().is_err());
        assert_eq!(Quality::default(), Quality::Medium);
    }

    #[test]
    fn test_frame_image_rejects_bad_buffers() {
        assert!(matches!(
            FrameImage::from_rgba(0, 4, vec![]),
            Err(FrameImageError::Empty { .. })
        ));
        assert!(matches!(
            FrameImage::from_rgba(2, 2, vec![0; 15]),
            Err(FrameImageError::SizeMismatch { expected: 16, actual: 15, .. })
        ));
    }

    #[test]
    fn test_prepare_resizes_per_tier() {
        let frame = solid(16, 8);
        assert_eq!(frame.prepare(Quality::High).dimensions(), (16, 8));
        assert_eq!(frame.prepare(Quality::Medium).dimensions(), (12, 6));
        assert_eq!(frame.prepare(Quality::Low).dimensions(), (8, 4));
    }

    #[test]
    fn test_write_png_to_arbitrary_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png.partial");
        solid(4, 4).write_png(&path, Quality::Low).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 2));
    }

    #[test]
    fn test_clone_shares_pixels() {
        let frame = solid(2, 2);
        let copy = frame.clone();
        assert!(std::ptr::eq(frame.pixels().as_ptr(), copy.pixels().as_ptr()));
    }
}
