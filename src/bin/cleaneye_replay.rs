//! cleaneye_replay - rebuild the summary from the event log
//!
//! The log is the source of truth; the snapshot is only a cache. This tool
//! folds the logged events into fresh counters, for all runs and for the last
//! run, and can rewrite the snapshot from the last run.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use cleaneye::storage::write_atomic;
use cleaneye::{replay_last_run, replay_log, DetectorConfig, OutputLayout, SummaryAggregator};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Rebuild the detection summary from the event log")]
struct Args {
    /// Root directory holding logs/ (defaults to the configured output dir).
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Replace the snapshot with the rebuilt summary.
    #[arg(long)]
    write_snapshot: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let layout = match args.output_dir {
        Some(dir) => OutputLayout::new(dir),
        None => DetectorConfig::load()?.output,
    };

    let (all_runs, last_run) = {
        let _stage = ui.stage("Replay event log");
        (replay_log(layout.log_file())?, replay_last_run(layout.log_file())?)
    };

    println!("Log: {}", layout.log_file().display());
    println!("All runs:");
    print_counts(&all_runs);
    if last_run.total() != all_runs.total() {
        println!("Last run:");
        print_counts(&last_run);
    }

    // The snapshot is per run, so only the last run is written back.
    if args.write_snapshot {
        let _stage = ui.stage("Write snapshot");
        match last_run.snapshot() {
            Some(summary) => {
                let json = serde_json::to_vec_pretty(&summary)?;
                layout.ensure_directories()?;
                write_atomic(&layout.summary_file(), &json)?;
                log::info!(
                    "snapshot rewritten from the last run ({} detections): {}",
                    summary.total_detections,
                    layout.summary_file().display()
                );
            }
            None => log::warn!("log is empty; snapshot left untouched"),
        }
    }
    Ok(())
}

fn print_counts(aggregator: &SummaryAggregator) {
    println!("  Total detections: {}", aggregator.total());
    for (label, count) in aggregator.class_counts() {
        println!("    {:<14} {:>6}", label, count);
    }
    println!("  Categories:");
    for (category, count) in aggregator.category_counts() {
        println!("    {:<14} {:>6}", category, count);
    }
}
