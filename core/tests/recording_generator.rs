//! Session generation for integration tests.
//!
//! Drives a real [`Recorder`] with deterministic inputs and gradient frames
//! so the tests below exercise the save worker and the on-disk format.

use std::path::Path;

use playcap_core::{
    CaptureConfig, FrameImage, InputState, Quality, Recorder, SessionSummary,
};

/// Frame dimensions used by every generated session
pub const WIDTH: u32 = 32;
pub const HEIGHT: u32 = 24;

/// Input state whose encoded action equals `bits`.
pub fn input_for(bits: u32) -> InputState {
    InputState {
        left: bits & 1 != 0,
        right: bits & 2 != 0,
        jump: bits & 4 != 0,
        action: bits & 8 != 0,
        down: bits & 16 != 0,
    }
}

/// Gradient frame that differs per tick.
pub fn gradient_frame(tick: u64) -> FrameImage {
    let mut pixels = Vec::with_capacity((WIDTH * HEIGHT * 4) as usize);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            pixels.extend_from_slice(&[(x * 8) as u8, (y * 10) as u8, tick as u8, 255]);
        }
    }
    FrameImage::from_rgba(WIDTH, HEIGHT, pixels).expect("valid gradient frame")
}

/// Recorder config writing under `root`.
pub fn config(root: &Path, frame_skip: u32, quality: Quality) -> CaptureConfig {
    CaptureConfig {
        enabled: true,
        frame_skip,
        quality,
        output_root: root.to_path_buf(),
        poll_interval_ms: 5,
        ..Default::default()
    }
}

/// Record one session, one tick per entry in `actions`.
///
/// The last tick is recorded with a dead character.
pub fn record_session(
    root: &Path,
    frame_skip: u32,
    quality: Quality,
    actions: &[u32],
) -> SessionSummary {
    let mut recorder = Recorder::new(config(root, frame_skip, quality));
    recorder.start().expect("start recording");

    for (tick, &bits) in actions.iter().enumerate() {
        let state = if tick % 4 == 0 { "small" } else { "big" };
        let dead = tick + 1 == actions.len();
        recorder.record_frame(&input_for(bits), state, dead, &gradient_frame(tick as u64));
    }

    recorder
        .stop()
        .expect("stop recording")
        .expect("session recorded frames")
}
