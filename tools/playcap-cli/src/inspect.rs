//! Inspect command - summarize a recording, recovering it if damaged
//!
//! Recovery happens in memory only; a damaged manifest is left as it is.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use playcap_core::manifest::FRAMES_DIR;
use playcap_core::{LoadedManifest, RecordingManifest, recovery};

/// Arguments for the inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Recording directory (e.g. recordings/recording_1761098154)
    pub folder: PathBuf,
}

/// Execute the inspect command
pub fn execute(args: InspectArgs) -> Result<()> {
    let loaded = recovery::load_read_only(&args.folder)
        .with_context(|| format!("Failed to load {}", args.folder.display()))?;

    print_summary(&args.folder, &loaded);
    Ok(())
}

fn print_summary(dir: &Path, loaded: &LoadedManifest) {
    let manifest = &loaded.manifest;
    let info = &manifest.recording_info;

    println!("=== Recording ===");
    println!("  Path: {}", dir.display());
    println!("  Loaded by: {}", loaded.tier);
    println!("  Recorded: {}", info.recording_time);
    println!("  Game: {}", info.game_version);
    match info.duration {
        Some(seconds) => println!("  Duration: {:.2}s", seconds),
        None => println!("  Duration: unknown"),
    }
    if let Some(ref user) = info.user_name {
        println!("  User: {}", user);
    }
    if let Some(ref format) = info.naming_format {
        println!("  Naming: {}", format);
    }

    println!();
    println!("=== Frames ===");
    println!("  Header total: {}", info.total_frames);
    println!("  Entries: {}", manifest.frame_data.len());
    println!("  Images: {}", manifest.saved_images());
    println!(
        "  Dead ticks: {}",
        manifest.frame_data.iter().filter(|f| f.character_dead).count()
    );
    if let (Some(first), Some(last)) = (manifest.frame_data.first(), manifest.frame_data.last()) {
        println!("  Ticks: {}..={}", first.frame_id, last.frame_id);
    }

    let gaps = missing_ticks(manifest);
    if !gaps.is_empty() {
        println!("  Missing ticks: {}", gaps.len());
    }
    let missing = missing_images(manifest, &dir.join(FRAMES_DIR));
    if !missing.is_empty() {
        println!("  Images referenced but not on disk: {}", missing.len());
        for frame_id in missing.iter().take(10) {
            println!("    frame {}", frame_id);
        }
    }
}

/// Tick ids absent between the first and last recorded tick.
fn missing_ticks(manifest: &RecordingManifest) -> Vec<u64> {
    let mut missing = Vec::new();
    for pair in manifest.frame_data.windows(2) {
        missing.extend(pair[0].frame_id + 1..pair[1].frame_id);
    }
    missing
}

/// Ticks whose manifest filename has no file in `frames_dir`.
fn missing_images(manifest: &RecordingManifest, frames_dir: &Path) -> Vec<u64> {
    manifest
        .frame_data
        .iter()
        .filter(|f| {
            f.image_filename
                .as_ref()
                .is_some_and(|name| !frames_dir.join(name).is_file())
        })
        .map(|f| f.frame_id)
        .collect()
}
