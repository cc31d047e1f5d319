//! Rename command - relabel a recording's images for dataset use
//!
//! Loads the manifest (recovering it if the game was killed mid-write),
//! shows a sample, asks for confirmation, then renames every saved image to
//! `{user}_f{frame_id}_a{action_code}_nt{0|1}.png`. The manifest is only
//! rewritten when every rename succeeded.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use playcap_core::manifest::FRAMES_DIR;
use playcap_core::recovery;
use playcap_core::rename::{rename_recording, validate_user_name};
use tracing::{info, warn};

/// Frames shown before asking for confirmation
const SAMPLE_FRAMES: usize = 3;

/// Arguments for the rename command
#[derive(Args)]
pub struct RenameArgs {
    /// User name prefixed to every image
    #[arg(long)]
    pub user: String,

    /// Recording directory name (e.g. recording_1761098154)
    #[arg(long = "f", value_name = "FOLDER")]
    pub folder: String,

    /// Directory containing recordings
    #[arg(long, default_value = "recordings")]
    pub root: PathBuf,
}

/// Execute the rename command
pub fn execute(args: RenameArgs) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    run(&args, &mut stdin.lock(), &mut stdout.lock())
}

fn run(args: &RenameArgs, input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
    validate_user_name(&args.user)?;
    let recording_dir = args.root.join(&args.folder);

    writeln!(out, "User: {}", args.user)?;
    writeln!(out, "Recording: {}", recording_dir.display())?;
    writeln!(out, "{}", "=".repeat(50))?;

    if !recording_dir.is_dir() {
        bail!("Recording directory not found: {}", recording_dir.display());
    }
    let frames_dir = recording_dir.join(FRAMES_DIR);
    if !frames_dir.is_dir() {
        bail!("Frames directory not found: {}", frames_dir.display());
    }

    writeln!(out, "Loading recording data...")?;
    let mut loaded = recovery::load(&recording_dir).context("Failed to load recording data")?;
    if loaded.is_recovered() {
        writeln!(out, "  Manifest was damaged, recovered by {}", loaded.tier)?;
        if let Some(ref backup) = loaded.backup {
            writeln!(out, "  Original backed up to {}", backup.display())?;
        }
    }

    let frames = &loaded.manifest.frame_data;
    if frames.is_empty() {
        bail!("No frame data found in {}", recording_dir.display());
    }
    writeln!(out, "Found {} frames", frames.len())?;

    writeln!(out)?;
    writeln!(out, "Sample:")?;
    for frame in frames.iter().take(SAMPLE_FRAMES) {
        writeln!(
            out,
            "  frame {}: action={}, dead={}",
            frame.frame_id, frame.action_code, frame.character_dead
        )?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "About to rename {} images ({} frames have no image)",
        loaded.manifest.saved_images(),
        frames.len() - loaded.manifest.saved_images()
    )?;
    if !confirm(input, out, "Continue? (y/N): ")? {
        info!(dir = %recording_dir.display(), "Rename cancelled by user");
        writeln!(out, "Cancelled")?;
        return Ok(());
    }
    info!(user = %args.user, dir = %recording_dir.display(), "Rename confirmed");

    writeln!(out)?;
    writeln!(out, "Renaming...")?;
    let report = rename_recording(&args.user, &recording_dir, &mut loaded.manifest)?;

    writeln!(out)?;
    writeln!(out, "  Renamed: {}", report.renamed)?;
    writeln!(out, "  Failed:  {}", report.failures.len())?;
    writeln!(out, "  Skipped: {} (no image)", report.skipped)?;

    if !report.is_success() {
        warn!(
            failed = report.failures.len(),
            dir = %recording_dir.display(),
            "Rename finished with failures"
        );
        writeln!(out)?;
        writeln!(out, "Failed frames ({}):", report.failures.len())?;
        writeln!(out, "{}", "=".repeat(50))?;
        for failure in &report.failures {
            writeln!(out, "  frame {}: {}", failure.frame_id, failure.reason)?;
        }
        bail!(
            "{} frames failed to rename; manifest left unchanged",
            report.failures.len()
        );
    }

    writeln!(
        out,
        "Manifest updated: {}",
        recovery::manifest_path(&recording_dir).display()
    )?;
    writeln!(out, "Rename complete")?;
    Ok(())
}

/// Ask a yes/no question; only `y` (any case) confirms.
fn confirm(input: &mut impl BufRead, out: &mut impl Write, prompt: &str) -> Result<bool> {
    write!(out, "{}", prompt)?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line).context("Failed to read confirmation")?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}
