//! Simulate command - record a deterministic synthetic session
//!
//! Drives a [`Recorder`] from a small seeded game loop so the capture
//! pipeline can be exercised without a real game. The same seed always
//! produces the same inputs, states and frames.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Args;
use playcap_core::config::{self, CaptureConfig};
use playcap_core::{
    CharacterState, FrameImage, FrameSource, InputState, Quality, RecordOutcome, Recorder,
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tracing::{info, warn};

/// Fixed tick rate of the synthetic game
const TICK_RATE: u32 = 60;

/// Ticks the character stays dead before respawning
const DEATH_TICKS: u32 = 45;

const SKY: [u8; 4] = [92, 148, 252, 255];
const GROUND: [u8; 4] = [200, 76, 12, 255];

/// Arguments for the simulate command
#[derive(Args)]
pub struct SimulateArgs {
    /// Number of ticks to record
    #[arg(long, default_value_t = 300)]
    pub ticks: u64,

    /// Save an image every N ticks (overrides config)
    #[arg(long)]
    pub skip: Option<u32>,

    /// Image quality: low, medium or high (overrides config)
    #[arg(long)]
    pub quality: Option<Quality>,

    /// Seed for inputs and state changes
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Frame width in pixels
    #[arg(long, default_value_t = 256)]
    pub width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = 240)]
    pub height: u32,

    /// Pace the loop at 60 ticks per second instead of running flat out
    #[arg(long)]
    pub realtime: bool,

    /// Capture config file (defaults to the platform config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory receiving the recording (overrides config)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Execute the simulate command
pub fn execute(args: SimulateArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let mut game = SyntheticGame::new(args.seed, args.width, args.height)?;

    println!("=== Simulating ===");
    println!("  Ticks: {}", args.ticks);
    println!("  Frame skip: {}", config.frame_skip.max(1));
    println!("  Quality: {}", config.quality);
    println!("  Output: {}", config.output_root.display());

    info!(seed = args.seed, ticks = args.ticks, "Simulation started");
    let mut recorder = Recorder::new(config);
    recorder.start().context("Failed to start recording")?;

    let tick_duration = Duration::from_secs(1) / TICK_RATE;
    let started = Instant::now();
    let mut dropped = 0u64;

    for tick in 0..args.ticks {
        game.step()?;
        if recorder.capture(&game) == RecordOutcome::Dropped {
            dropped += 1;
        }

        if args.realtime {
            let target = tick_duration * (tick + 1) as u32;
            if let Some(wait) = target.checked_sub(started.elapsed()) {
                std::thread::sleep(wait);
            }
        }
    }

    let Some(summary) = recorder.stop().context("Failed to finish recording")? else {
        bail!("No ticks were recorded");
    };
    if dropped > 0 {
        warn!(dropped, "Frames dropped because the save queue was saturated");
    }

    println!();
    println!("=== Session ===");
    println!("  Directory: {}", summary.dir.display());
    println!("  Frames: {}", summary.total_frames);
    println!("  Images: {}", summary.saved_images);
    println!("  Dropped at submit: {}", dropped);
    println!("  Failed writes: {}", summary.failed_writes);
    println!("  Abandoned at shutdown: {}", summary.abandoned_frames);
    println!("  Duration: {:.2}s", summary.duration);
    Ok(())
}

/// Load the capture config and apply command-line overrides.
fn resolve_config(args: &SimulateArgs) -> Result<CaptureConfig> {
    let mut config = match args.config {
        Some(ref path) => config::load_from(path)?,
        None => config::load(),
    };
    config.enabled = true;
    if let Some(skip) = args.skip {
        config.frame_skip = skip;
    }
    if let Some(quality) = args.quality {
        config.quality = quality;
    }
    if let Some(ref output) = args.output {
        config.output_root = output.clone();
    }
    Ok(config)
}

/// Byte length of a `width x height` RGBA8 buffer.
fn rgba_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .with_context(|| format!("Frame dimensions {}x{} are too large", width, height))
}

/// Seeded stand-in for a side-scrolling game.
struct SyntheticGame {
    rng: Pcg32,
    width: u32,
    height: u32,
    input: InputState,
    state: &'static str,
    dead_ticks: u32,
    x: u32,
    frame: FrameImage,
}

impl SyntheticGame {
    fn new(seed: u64, width: u32, height: u32) -> Result<Self> {
        let frame = FrameImage::from_rgba(width, height, vec![0; rgba_len(width, height)?])
            .context("Invalid frame dimensions")?;
        Ok(Self {
            rng: Pcg32::seed_from_u64(seed),
            width,
            height,
            input: InputState::default(),
            state: "small",
            dead_ticks: 0,
            x: width / 4,
            frame,
        })
    }

    /// Advance one tick and render it.
    fn step(&mut self) -> Result<()> {
        if self.dead_ticks > 0 {
            self.dead_ticks -= 1;
            self.input = InputState::default();
            if self.dead_ticks == 0 {
                self.state = "small";
                self.x = self.width / 4;
            }
        } else {
            self.update_input();
            self.update_state();
        }

        if self.input.left {
            self.x = self.x.saturating_sub(1);
        } else if self.input.right {
            self.x = (self.x + 1).min(self.width.saturating_sub(1));
        }

        self.frame = self.render()?;
        Ok(())
    }

    /// Held inputs change every few ticks, like a player's would.
    fn update_input(&mut self) {
        if !self.rng.random_bool(0.2) {
            return;
        }
        let direction = self.rng.random_range(0..4u8);
        self.input = InputState {
            left: direction == 1 || direction == 3,
            right: direction == 2 || direction == 3,
            jump: self.rng.random_bool(0.25),
            action: self.rng.random_bool(0.15),
            down: self.rng.random_bool(0.05),
        };
    }

    fn update_state(&mut self) {
        if self.rng.random_bool(0.003) {
            self.dead_ticks = DEATH_TICKS;
        } else if self.rng.random_bool(0.01) {
            self.state = match self.state {
                "small" => "big",
                "big" => "fire",
                _ => "small",
            };
        }
    }

    fn render(&self) -> Result<FrameImage> {
        let (w, h) = (self.width, self.height);
        let ground_y = h - h / 8;
        let size = (h / 10).max(1) * if self.state == "small" { 1 } else { 2 };
        let color: [u8; 4] = match (self.dead_ticks > 0, self.state) {
            (true, _) => [80, 80, 80, 255],
            (false, "fire") => [248, 248, 248, 255],
            (false, _) => [216, 40, 0, 255],
        };

        let mut pixels = Vec::with_capacity(rgba_len(w, h)?);
        for y in 0..h {
            for x in 0..w {
                let in_character = x >= self.x
                    && x < self.x + size / 2 + 1
                    && y < ground_y
                    && y + size >= ground_y;
                let pixel = if in_character {
                    color
                } else if y >= ground_y {
                    GROUND
                } else {
                    SKY
                };
                pixels.extend_from_slice(&pixel);
            }
        }
        Ok(FrameImage::from_rgba(w, h, pixels)?)
    }
}

impl FrameSource for SyntheticGame {
    fn input_state(&self) -> InputState {
        self.input
    }

    fn character_state(&self) -> CharacterState {
        CharacterState::from(self.state)
    }

    fn character_dead(&self) -> bool {
        self.dead_ticks > 0
    }

    fn snapshot(&self) -> FrameImage {
        self.frame.clone()
    }
}
