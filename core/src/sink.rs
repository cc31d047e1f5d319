//! Asynchronous image-save pipeline.
//!
//! The game thread submits [`SaveRequest`]s into a bounded queue; a single
//! `frame-save` worker encodes them in FIFO order. Because there is exactly
//! one worker, completion order equals submission order and the sink can
//! hand out dense `frame_<seq>.png` names from its own saved counter.
//!
//! Completions travel back over a second channel keyed by `frame_id`; the
//! sink never touches the frame log itself.
//!
//! ```text
//! game thread ──submit──▶ [bounded queue] ──▶ frame-save worker
//!      ▲                                          │ encode to staging path
//!      └──────────── SaveCompletion ◀─────────────┘ rename to frame_<seq>.png
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded, unbounded,
};
use tracing::{debug, info, warn};

use crate::capture::{FrameImage, Quality};

/// Name the sink assigns to the `seq`-th successfully saved image.
pub fn sequence_filename(seq: u64) -> String {
    format!("frame_{:06}.png", seq)
}

/// Producer-chosen staging path for a tick's image.
///
/// Never the final name: the worker renames onto [`sequence_filename`] once
/// the encode succeeded.
pub fn staging_path(frames_dir: &Path, frame_id: u64) -> PathBuf {
    frames_dir.join(format!(".tick_{:06}.png.partial", frame_id))
}

/// Error writing a single frame image.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to write frame: {0}")]
    Io(#[from] std::io::Error),
}

/// Encodes a frame to disk. The default is [`PngEncoder`].
pub trait FrameEncoder: Send + 'static {
    fn encode(&self, image: &FrameImage, path: &Path, quality: Quality) -> Result<(), SaveError>;
}

/// PNG encoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder;

impl FrameEncoder for PngEncoder {
    fn encode(&self, image: &FrameImage, path: &Path, quality: Quality) -> Result<(), SaveError> {
        image.write_png(path, quality)?;
        Ok(())
    }
}

/// One queued image write.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Record the resulting filename belongs to
    pub frame_id: u64,
    pub image: FrameImage,
    /// Where the worker encodes before renaming into place
    pub staging_path: PathBuf,
}

/// Outcome of one request, reported back to the frame log owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveCompletion {
    pub frame_id: u64,
    /// Assigned filename, or `None` if the write failed
    pub filename: Option<String>,
}

/// Result of [`ImageSink::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted into the queue
    Queued,
    /// Queue stayed full past the submit timeout; the frame was dropped
    Dropped,
    /// The sink was shut down or its worker exited
    Closed,
}

/// Result of [`ImageSink::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Images written over the sink's lifetime
    pub saved: u64,
    /// The worker did not drain within the timeout; remaining items were abandoned
    pub timed_out: bool,
}

/// Sink settings.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub frames_dir: PathBuf,
    pub quality: Quality,
    /// Maximum queued requests
    pub capacity: usize,
    /// Longest a saturated submit may block the caller
    pub submit_timeout: Duration,
    /// Worker queue poll interval (bounds stop-signal latency)
    pub poll_interval: Duration,
}

/// Handle to the image-save worker.
pub struct ImageSink {
    /// Request sender (Option to allow explicit drop on shutdown)
    tx: Option<Sender<SaveRequest>>,
    completions: Receiver<SaveCompletion>,
    /// Worker signals here when it exits
    finished: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    saved: Arc<AtomicU64>,
    abandon: Arc<AbandonFlag>,
    submit_timeout: Duration,
}

struct SaveWorker<E> {
    rx: Receiver<SaveRequest>,
    completions: Sender<SaveCompletion>,
    finished: Sender<()>,
    saved: Arc<AtomicU64>,
    abandon: Arc<AbandonFlag>,
    frames_dir: PathBuf,
    quality: Quality,
    poll_interval: Duration,
    encoder: E,
}

impl ImageSink {
    /// Spawn a sink that writes PNGs.
    pub fn spawn(config: SinkConfig) -> std::io::Result<Self> {
        Self::spawn_with(config, PngEncoder)
    }

    /// Spawn a sink with a custom encoder.
    pub fn spawn_with<E: FrameEncoder>(config: SinkConfig, encoder: E) -> std::io::Result<Self> {
        let (tx, rx) = bounded::<SaveRequest>(config.capacity.max(1));
        let (done_tx, done_rx) = unbounded::<SaveCompletion>();
        let (finished_tx, finished_rx) = bounded::<()>(1);
        let saved = Arc::new(AtomicU64::new(0));
        let abandon = Arc::new(AbandonFlag::default());

        let worker = SaveWorker {
            rx,
            completions: done_tx,
            finished: finished_tx,
            saved: saved.clone(),
            abandon: abandon.clone(),
            frames_dir: config.frames_dir,
            quality: config.quality,
            poll_interval: config.poll_interval,
            encoder,
        };

        let handle = thread::Builder::new()
            .name("frame-save".into())
            .spawn(move || worker.run())?;

        Ok(Self {
            tx: Some(tx),
            completions: done_rx,
            finished: finished_rx,
            handle: Some(handle),
            saved,
            abandon,
            submit_timeout: config.submit_timeout,
        })
    }

    /// Queue an image write.
    ///
    /// Returns immediately while the queue has room. When it is full the
    /// caller waits at most the submit timeout, then the request is dropped.
    pub fn submit(&self, request: SaveRequest) -> SubmitOutcome {
        let Some(ref tx) = self.tx else {
            return SubmitOutcome::Closed;
        };
        match tx.send_timeout(request, self.submit_timeout) {
            Ok(()) => SubmitOutcome::Queued,
            Err(SendTimeoutError::Timeout(request)) => {
                warn!(
                    frame_id = request.frame_id,
                    "Save queue saturated, frame dropped"
                );
                SubmitOutcome::Dropped
            }
            Err(SendTimeoutError::Disconnected(request)) => {
                warn!(frame_id = request.frame_id, "Save worker gone, frame dropped");
                SubmitOutcome::Closed
            }
        }
    }

    /// Completions that have arrived since the last call (non-blocking).
    pub fn drain_completions(&self) -> impl Iterator<Item = SaveCompletion> + '_ {
        self.completions.try_iter()
    }

    /// Images successfully written so far.
    pub fn saved_count(&self) -> u64 {
        self.saved.load(Ordering::Acquire)
    }

    /// Whether the sink still accepts requests.
    pub fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    /// Stop accepting requests and wait up to `timeout` for the queue to drain.
    ///
    /// On timeout the worker is told to abandon whatever is still queued and
    /// is detached; those frames never receive a filename.
    pub fn shutdown(&mut self, timeout: Duration) -> ShutdownReport {
        // Dropping the sender lets the worker drain and then see Disconnected
        drop(self.tx.take());

        let timed_out = match self.finished.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                false
            }
            Err(RecvTimeoutError::Timeout) => {
                self.abandon.set();
                self.handle.take();
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Save worker did not drain in time, abandoning queued frames"
                );
                true
            }
        };

        ShutdownReport {
            saved: self.saved_count(),
            timed_out,
        }
    }
}

impl Drop for ImageSink {
    fn drop(&mut self) {
        // An un-shutdown sink abandons its queue rather than blocking the caller
        if self.tx.take().is_some() {
            self.abandon.set();
        }
    }
}

impl<E: FrameEncoder> SaveWorker<E> {
    fn run(self) {
        debug!("Frame save worker started");

        loop {
            if *self.abandon.lock() {
                break;
            }
            match self.rx.recv_timeout(self.poll_interval) {
                Ok(request) => self.save(request),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let abandoned = self.rx.try_iter().count();
        if abandoned > 0 {
            warn!(abandoned, "Frame save worker exiting with queued frames");
        }
        info!(
            saved = self.saved.load(Ordering::Acquire),
            "Frame save worker stopped"
        );
        let _ = self.finished.send(());
    }

    fn save(&self, request: SaveRequest) {
        let encoded = self
            .encoder
            .encode(&request.image, &request.staging_path, self.quality);

        // Held until the completion is sent so a timed-out shutdown either
        // sees this frame's completion or the frame never gets a final name
        let abandoned = self.abandon.lock();
        if *abandoned {
            debug!(
                frame_id = request.frame_id,
                "Discarding frame finished after shutdown timed out"
            );
            let _ = std::fs::remove_file(&request.staging_path);
            return;
        }

        // Only this thread advances the counter
        let seq = self.saved.load(Ordering::Acquire);
        let filename = sequence_filename(seq);
        let final_path = self.frames_dir.join(&filename);

        let result = encoded.and_then(|()| {
            std::fs::rename(&request.staging_path, &final_path).map_err(SaveError::from)
        });

        let filename = match result {
            Ok(()) => {
                self.saved.store(seq + 1, Ordering::Release);
                Some(filename)
            }
            Err(e) => {
                warn!(
                    frame_id = request.frame_id,
                    path = %request.staging_path.display(),
                    "Failed to save frame image: {}",
                    e
                );
                let _ = std::fs::remove_file(&request.staging_path);
                None
            }
        };

        let _ = self.completions.send(SaveCompletion {
            frame_id: request.frame_id,
            filename,
        });
        drop(abandoned);
    }
}

/// Set once the sink stops waiting for the worker.
#[derive(Debug, Default)]
struct AbandonFlag(Mutex<bool>);

impl AbandonFlag {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self) {
        *self.lock() = true;
    }
}
