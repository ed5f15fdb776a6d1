//! cleaneye_dashboard - show the live detection summary
//!
//! Reads only the snapshot file written by `cleaneye_detect`. An unreadable or
//! half-written snapshot is shown as "no data yet", never as an error.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cleaneye::dashboard::{render_summary, NO_DATA_MESSAGE};
use cleaneye::{DetectorConfig, SummaryReader, SummaryWatcher, WatchUpdate};

#[derive(Parser, Debug)]
#[command(author, version, about = "Show the live CleanEye detection summary")]
struct Args {
    /// Snapshot file (defaults to <output>/logs/live_summary.json).
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,
    /// Poll every N seconds and report new detections until Ctrl-C.
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = DetectorConfig::load()?;
    let snapshot = args
        .snapshot
        .unwrap_or_else(|| cfg.output.summary_file());
    let booth = cfg.location.origin;
    let reader = SummaryReader::new(snapshot);

    let Some(interval) = args.watch else {
        match reader.load() {
            Some(summary) => println!("{}", render_summary(&summary, booth)),
            None => println!("{}", NO_DATA_MESSAGE),
        }
        return Ok(());
    };
    if interval == 0 {
        return Err(anyhow!("--watch interval must be at least 1 second"));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("watching {}", reader.path().display());
    let mut watcher = SummaryWatcher::new(reader);
    let mut announced_empty = false;
    while !stop.load(Ordering::SeqCst) {
        match watcher.poll() {
            WatchUpdate::NoData => {
                if !announced_empty {
                    println!("{}", NO_DATA_MESSAGE);
                    announced_empty = true;
                }
            }
            WatchUpdate::Unchanged => {}
            WatchUpdate::Advanced { new_detections } => {
                println!("\n+{} new detection(s)", new_detections);
                if let Some(summary) = watcher.latest() {
                    println!("{}", render_summary(summary, booth));
                }
            }
            WatchUpdate::Restarted => {
                println!("\nDetector restarted, counts reset");
                if let Some(summary) = watcher.latest() {
                    println!("{}", render_summary(summary, booth));
                }
            }
        }
        std::thread::sleep(Duration::from_secs(interval));
    }
    Ok(())
}
