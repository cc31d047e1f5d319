//! Session recorder
//!
//! Records every tick's action and character state, queues sub-sampled frame
//! images for asynchronous saving, and writes the manifest and statistics
//! when the session stops.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::action::{ActionCode, InputState};
use crate::capture::{FrameImage, FrameSource};
use crate::config::CaptureConfig;
use crate::frame::{CharacterState, FrameLog, FrameRecord};
use crate::manifest::{
    FRAMES_DIR, MANIFEST_FILE, ManifestError, RECORDING_TIME_FORMAT, RecordingInfo,
    RecordingManifest, STATISTICS_FILE, StatisticsReport,
};
use crate::sink::{
    FrameEncoder, ImageSink, PngEncoder, SaveRequest, SinkConfig, SubmitOutcome, staging_path,
};

/// What happened to one tick passed to [`Recorder::record_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Not recording; nothing was logged
    Idle,
    /// Logged without an image (skipped by `frame_skip`)
    Logged,
    /// Logged and its image queued for saving
    Queued,
    /// Logged, but the save queue was saturated and the image was dropped
    Dropped,
}

/// Totals for a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub dir: PathBuf,
    pub total_frames: u64,
    pub saved_images: u64,
    /// Images dropped at submit time (queue saturated)
    pub dropped_frames: u64,
    /// Images whose write failed on the worker
    pub failed_writes: u64,
    /// Images still queued when the shutdown timeout elapsed
    pub abandoned_frames: u64,
    /// Seconds
    pub duration: f64,
}

/// Error starting or stopping a session.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("a recording session is already active")]
    AlreadyRecording,

    #[error("failed to create session directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start frame save worker: {0}")]
    SpawnWorker(#[source] std::io::Error),

    #[error("failed to write session output: {0}")]
    Write(#[from] ManifestError),
}

/// Gameplay recorder.
///
/// `Idle → Recording → Idle`; each `start`/`stop` pair produces an
/// independent session directory.
pub struct Recorder {
    config: CaptureConfig,
    session: Option<Session>,
}

/// State owned by one active session.
struct Session {
    dir: PathBuf,
    frames_dir: PathBuf,
    started: Instant,
    log: FrameLog,
    sink: ImageSink,
    next_frame_id: u64,
    queued: u64,
    dropped: u64,
    completed: u64,
    failed: u64,
}

impl Recorder {
    /// Create a recorder with the given configuration
    pub fn new(config: CaptureConfig) -> Self {
        for warning in config.validate() {
            warn!("Capture config: {}", warning);
        }
        Self {
            config: config.normalized(),
            session: None,
        }
    }

    /// Start a session.
    ///
    /// No-op when recording is disabled in the configuration. Starting while
    /// a session is active is rejected rather than orphaning its worker.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        self.start_with(PngEncoder)
    }

    /// Start a session whose images are written by `encoder`.
    pub(crate) fn start_with<E: FrameEncoder>(&mut self, encoder: E) -> Result<(), RecorderError> {
        if !self.config.enabled {
            return Ok(());
        }
        if self.session.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        let dir = create_session_dir(&self.config.output_root)?;
        let frames_dir = dir.join(FRAMES_DIR);
        std::fs::create_dir_all(&frames_dir).map_err(|source| RecorderError::CreateDir {
            path: frames_dir.clone(),
            source,
        })?;

        let sink = ImageSink::spawn_with(
            SinkConfig {
                frames_dir: frames_dir.clone(),
                quality: self.config.quality,
                capacity: self.config.queue_capacity,
                submit_timeout: self.config.submit_timeout(),
                poll_interval: self.config.poll_interval(),
            },
            encoder,
        )
        .map_err(RecorderError::SpawnWorker)?;

        info!(
            dir = %dir.display(),
            frame_skip = self.config.frame_skip,
            quality = %self.config.quality,
            "Recording started"
        );

        self.session = Some(Session {
            dir,
            frames_dir,
            started: Instant::now(),
            log: FrameLog::new(),
            sink,
            next_frame_id: 0,
            queued: 0,
            dropped: 0,
            completed: 0,
            failed: 0,
        });
        Ok(())
    }

    /// Check if recording is active
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the next recorded tick will have its image saved.
    ///
    /// Lets a game loop skip an expensive frame-buffer readback on other ticks.
    pub fn needs_snapshot(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.next_frame_id % self.config.frame_skip as u64 == 0)
    }

    /// Record one tick.
    ///
    /// Cheap on the common path: the image is only shared with the save
    /// worker, never encoded here. The only wait is the bounded submit
    /// timeout when the save queue is saturated.
    pub fn record_frame(
        &mut self,
        input: &InputState,
        character_state: impl Into<CharacterState>,
        character_dead: bool,
        frame: &FrameImage,
    ) -> RecordOutcome {
        self.record_with(input, character_state.into(), character_dead, || {
            frame.clone()
        })
    }

    /// Record one tick read from a [`FrameSource`].
    ///
    /// The frame buffer is only snapshotted on ticks whose image is saved.
    pub fn capture<S: FrameSource>(&mut self, source: &S) -> RecordOutcome {
        if !self.is_recording() {
            return RecordOutcome::Idle;
        }
        self.record_with(
            &source.input_state(),
            source.character_state(),
            source.character_dead(),
            || source.snapshot(),
        )
    }

    fn record_with(
        &mut self,
        input: &InputState,
        character_state: CharacterState,
        character_dead: bool,
        snapshot: impl FnOnce() -> FrameImage,
    ) -> RecordOutcome {
        let frame_skip = self.config.frame_skip as u64;
        let Some(session) = self.session.as_mut() else {
            return RecordOutcome::Idle;
        };
        session.apply_completions();

        let frame_id = session.next_frame_id;
        let action = ActionCode::encode(input);
        let timestamp = session.started.elapsed().as_secs_f64();
        let should_save = frame_id % frame_skip == 0;

        let outcome = if should_save {
            let request = SaveRequest {
                frame_id,
                image: snapshot(),
                staging_path: staging_path(&session.frames_dir, frame_id),
            };
            match session.sink.submit(request) {
                SubmitOutcome::Queued => {
                    session.queued += 1;
                    RecordOutcome::Queued
                }
                SubmitOutcome::Dropped | SubmitOutcome::Closed => {
                    session.dropped += 1;
                    RecordOutcome::Dropped
                }
            }
        } else {
            RecordOutcome::Logged
        };

        session.log.push(FrameRecord::new(
            frame_id,
            timestamp,
            action,
            character_state,
            character_dead,
            outcome == RecordOutcome::Queued,
        ));
        session.next_frame_id += 1;

        outcome
    }

    /// Stop the session and write its manifest and statistics.
    ///
    /// Waits at most the configured shutdown timeout for queued images;
    /// anything still pending is abandoned. Returns `None` when not
    /// recording or when no tick was recorded (nothing is written).
    ///
    /// The recorder is idle afterwards even if writing fails.
    pub fn stop(&mut self) -> Result<Option<SessionSummary>, RecorderError> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        let report = session.sink.shutdown(self.config.shutdown_timeout());
        session.apply_completions();

        if session.log.is_empty() {
            info!(dir = %session.dir.display(), "Recording stopped with no frames");
            return Ok(None);
        }

        let duration = session.started.elapsed().as_secs_f64();
        let abandoned = session.queued.saturating_sub(session.completed);
        if report.timed_out || abandoned > 0 {
            warn!(abandoned, "Frames left unsaved at shutdown");
        }

        let frames = session.log.into_records();
        let statistics = StatisticsReport::from_frames(&frames);
        let manifest = RecordingManifest {
            recording_info: RecordingInfo {
                total_frames: frames.len() as u64,
                duration: Some(duration),
                recording_time: chrono::Local::now()
                    .format(RECORDING_TIME_FORMAT)
                    .to_string(),
                game_version: self.config.game_version.clone(),
                user_name: None,
                naming_format: None,
                recovered_by: None,
            },
            frame_data: frames,
        };

        let summary = SessionSummary {
            dir: session.dir.clone(),
            total_frames: manifest.recording_info.total_frames,
            saved_images: manifest.saved_images() as u64,
            dropped_frames: session.dropped,
            failed_writes: session.failed,
            abandoned_frames: abandoned,
            duration,
        };

        manifest.write_to(&session.dir.join(MANIFEST_FILE))?;
        statistics.write_to(&session.dir.join(STATISTICS_FILE))?;

        info!(
            dir = %summary.dir.display(),
            total_frames = summary.total_frames,
            saved_images = summary.saved_images,
            "Recording complete"
        );
        Ok(Some(summary))
    }

    /// Ticks recorded in the active session (0 when idle).
    pub fn frame_count(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.next_frame_id)
    }

    /// Directory of the active session.
    pub fn session_dir(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.dir.as_path())
    }

    /// Get the configuration
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.stop() {
                error!("Failed to finalize recording on shutdown: {}", e);
            }
        }
    }
}

impl Session {
    /// Stamp filenames reported by the save worker onto their records.
    fn apply_completions(&mut self) {
        for completion in self.sink.drain_completions() {
            self.completed += 1;
            if completion.filename.is_none() {
                self.failed += 1;
            }
            if !self
                .log
                .set_image_filename(completion.frame_id, completion.filename)
            {
                debug!(frame_id = completion.frame_id, "Completion for unknown frame");
            }
        }
    }
}

/// Create `root/recording_<unix_timestamp>`, suffixed if that name is taken.
fn create_session_dir(root: &Path) -> Result<PathBuf, RecorderError> {
    let timestamp = chrono::Utc::now().timestamp();
    let base = format!("recording_{}", timestamp);

    let mut dir = root.join(&base);
    let mut suffix = 1;
    while dir.exists() {
        dir = root.join(format!("{}_{}", base, suffix));
        suffix += 1;
    }

    std::fs::create_dir_all(&dir).map_err(|source| RecorderError::CreateDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
