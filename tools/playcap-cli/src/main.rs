//! Playcap CLI - Tooling for gameplay recordings
//!
//! # Commands
//!
//! - `playcap rename` - Rename a recording's images to `{user}_f{id}_a{action}_nt{0|1}.png`
//! - `playcap inspect` - Load a recording (recovering it if damaged) and summarize it
//! - `playcap stats` - Recompute action and state histograms
//! - `playcap simulate` - Record a synthetic session without a game
//!
//! # Usage
//!
//! ```bash
//! # Relabel the images of recordings/recording_1761098154
//! playcap rename --user zf --f recording_1761098154
//!
//! # Check a recording that was cut short
//! playcap inspect recordings/recording_1761098154
//!
//! # Produce a 600-tick test session saving every 4th frame
//! playcap simulate --ticks 600 --skip 4 --quality low
//! ```

mod inspect;
mod rename;
mod simulate;
mod stats;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Playcap CLI - Tooling for gameplay recordings
#[derive(Parser)]
#[command(name = "playcap")]
#[command(about = "Inspect, relabel and simulate gameplay recordings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rename saved frames with user, tick, action and terminal state
    Rename(rename::RenameArgs),

    /// Load a recording with recovery and print a summary (never modifies it)
    Inspect(inspect::InspectArgs),

    /// Recompute the statistics report of a recording (manifest is never modified)
    Stats(stats::StatsArgs),

    /// Record a deterministic synthetic session
    Simulate(simulate::SimulateArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rename(args) => rename::execute(args),
        Commands::Inspect(args) => inspect::execute(args),
        Commands::Stats(args) => stats::execute(args),
        Commands::Simulate(args) => simulate::execute(args),
    }
}
