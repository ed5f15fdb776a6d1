//! Append-only JSONL detection log.
//!
//! The log is the source of truth for a run: one `DetectionEvent` per line,
//! never rewritten or compacted. Each append opens the file, writes the whole
//! line with a single `write_all`, and closes it again, so a concurrent reader
//! sees either the complete line or nothing of it.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::summary::SummaryAggregator;
use crate::DetectionEvent;

#[derive(Clone, Debug)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a newline-terminated JSON line.
    pub fn append(&self, event: &DetectionEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| anyhow!("failed to open event log {}: {}", self.path.display(), e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| anyhow!("failed to append to event log {}: {}", self.path.display(), e))?;
        Ok(())
    }

    /// Read every event in log order. A missing log is an empty log.
    ///
    /// A final line with no trailing newline that does not parse is a write torn
    /// by a crash; it is skipped with a warning. Any other malformed line is an error.
    pub fn read_events(&self) -> Result<Vec<DetectionEvent>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(anyhow!(
                    "failed to read event log {}: {}",
                    self.path.display(),
                    e
                ))
            }
        };
        parse_lines(&raw, &self.path)
    }
}

fn parse_lines(raw: &str, path: &Path) -> Result<Vec<DetectionEvent>> {
    let terminated = raw.ends_with('\n');
    let lines: Vec<&str> = raw.split('\n').collect();
    let last_idx = lines.len().saturating_sub(1);
    let mut events = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DetectionEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) if idx == last_idx && !terminated => {
                log::warn!(
                    "skipping torn final line {} of {}: {}",
                    idx + 1,
                    path.display(),
                    e
                );
            }
            Err(e) => {
                return Err(anyhow!(
                    "malformed event at {}:{}: {}",
                    path.display(),
                    idx + 1,
                    e
                ))
            }
        }
    }
    Ok(events)
}

/// Rebuild run counters by folding the whole log into an empty aggregator.
pub fn replay_log(path: impl AsRef<Path>) -> Result<SummaryAggregator> {
    let log = EventLog::new(path.as_ref());
    let events = log.read_events()?;
    log::info!(
        "replayed {} events from {}",
        events.len(),
        log.path().display()
    );
    Ok(SummaryAggregator::from_events(events))
}

/// Index of the first event of every run in `events`, in log order.
///
/// Events carry no run id, so a run boundary is inferred: a new run starts when
/// the source changes, when `frame_index` goes backwards, or when the same
/// `frame_index` reappears with a different timestamp (all events of one frame
/// share one timestamp).
pub fn run_starts(events: &[DetectionEvent]) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut prev: Option<&DetectionEvent> = None;
    for (idx, event) in events.iter().enumerate() {
        let new_run = match prev {
            None => true,
            Some(p) => {
                p.source != event.source
                    || event.frame_index < p.frame_index
                    || (event.frame_index == p.frame_index && event.timestamp != p.timestamp)
            }
        };
        if new_run {
            starts.push(idx);
        }
        prev = Some(event);
    }
    starts
}

/// Rebuild the counters of the most recent run only.
///
/// This is what the live snapshot holds, so it is the replay to use when
/// rewriting the snapshot from a log that spans several runs.
pub fn replay_last_run(path: impl AsRef<Path>) -> Result<SummaryAggregator> {
    let log = EventLog::new(path.as_ref());
    let events = log.read_events()?;
    let starts = run_starts(&events);
    let start = starts.last().copied().unwrap_or(0);
    log::info!(
        "replaying last of {} run(s): {} of {} events from {}",
        starts.len(),
        events.len() - start,
        events.len(),
        log.path().display()
    );
    Ok(SummaryAggregator::from_events(events.into_iter().skip(start)))
}
