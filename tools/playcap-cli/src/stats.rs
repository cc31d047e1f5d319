//! Stats command - recompute action and state histograms from a manifest
//!
//! The manifest is never modified, even when it had to be recovered.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use playcap_core::manifest::STATISTICS_FILE;
use playcap_core::{ActionCode, StatisticsReport, recovery};

/// Arguments for the stats command
#[derive(Args)]
pub struct StatsArgs {
    /// Recording directory (e.g. recordings/recording_1761098154)
    pub folder: PathBuf,

    /// Rewrite statistics.json with the recomputed report
    #[arg(long)]
    pub write: bool,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Execute the stats command
pub fn execute(args: StatsArgs) -> Result<()> {
    let loaded = recovery::load_read_only(&args.folder)
        .with_context(|| format!("Failed to load {}", args.folder.display()))?;
    let report = StatisticsReport::from_frames(&loaded.manifest.frame_data);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if loaded.is_recovered() {
            println!("Note: manifest recovered by {}", loaded.tier);
        }
        print_table(&report);
    }

    if args.write {
        let path = args.folder.join(STATISTICS_FILE);
        report
            .write_to(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Statistics written: {}", path.display());
    }
    Ok(())
}

fn print_table(report: &StatisticsReport) {
    let total = report.total_actions();

    println!("=== Actions ({} ticks) ===", total);
    for (code, count) in actions_by_code(report) {
        let action = ActionCode::from_bits_retain(code);
        println!(
            "  {:>3} {:>8} {:>6} {:>5.1}%  {}",
            code,
            action.binary(),
            count,
            percent(count, total),
            action.labels().join("+")
        );
    }

    println!();
    println!("=== Character states ===");
    for (state, &count) in &report.state_statistics {
        println!("  {:<12} {:>6} {:>5.1}%", state, count, percent(count, total));
    }
}

/// Action histogram ordered numerically rather than by string key.
fn actions_by_code(report: &StatisticsReport) -> Vec<(u32, u64)> {
    let mut rows: Vec<(u32, u64)> = report
        .action_statistics
        .iter()
        .filter_map(|(code, &count)| code.parse().ok().map(|code| (code, count)))
        .collect();
    rows.sort_unstable();
    rows
}

fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}
