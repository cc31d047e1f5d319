//! Playcap Core - Gameplay telemetry capture
//!
//! This crate records per-tick player actions and character state alongside
//! periodic screen images, and provides the tooling to recover and relabel
//! those recordings afterwards.
//!
//! # Architecture
//!
//! - [`ActionCode`] - 5-bit bitmask of simultaneously held inputs
//! - [`FrameLog`] - Ordered per-tick records for one session
//! - [`ImageSink`] - Bounded background queue that writes PNGs off the game loop
//! - [`Recorder`] - Session lifecycle: start, record every tick, stop and persist
//! - [`recovery::load`] - Tiered loading of possibly truncated manifests
//! - [`rename::rename_recording`] - Deterministic renaming of saved images

pub mod action;
pub mod capture;
pub mod config;
pub mod frame;
pub mod manifest;
pub mod recorder;
pub mod recovery;
pub mod rename;
pub mod sink;
#[cfg(test)]
pub mod test_utils;

pub use action::{ActionCode, ActionLabels, InputState};
pub use capture::{FrameImage, FrameImageError, FrameSource, Quality};
pub use config::CaptureConfig;
pub use frame::{CharacterState, FrameLog, FrameRecord};
pub use manifest::{RecordingInfo, RecordingManifest, RecoveryTier, StatisticsReport};
pub use recorder::{RecordOutcome, Recorder, RecorderError, SessionSummary};
pub use recovery::{LoadedManifest, RecoveryError};
pub use rename::{FrameName, RenameError, RenameFailure, RenameReport};
pub use sink::{ImageSink, ShutdownReport, SubmitOutcome};
