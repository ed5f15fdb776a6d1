use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::config::OutputLayout;
use crate::log::EventLog;
use crate::summary::AggregateSummary;
use crate::DetectionEvent;

/// Durable side of the recorder: the append-only log plus the snapshot file.
pub trait EventStore {
    fn append_event(&mut self, event: &DetectionEvent) -> Result<()>;

    /// Replace the snapshot wholesale. Readers must never observe a partial write.
    fn write_snapshot(&mut self, summary: &AggregateSummary) -> Result<()>;
}

pub struct FileEventStore {
    log: EventLog,
    snapshot_path: PathBuf,
}

impl FileEventStore {
    /// Open the store at the standard output layout, creating directories.
    pub fn open(layout: &OutputLayout) -> Result<Self> {
        layout.ensure_directories()?;
        Ok(Self::new(layout.log_file(), layout.summary_file()))
    }

    pub fn new(log_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            log: EventLog::new(log_path),
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}

impl EventStore for FileEventStore {
    fn append_event(&mut self, event: &DetectionEvent) -> Result<()> {
        self.log.append(event)
    }

    fn write_snapshot(&mut self, summary: &AggregateSummary) -> Result<()> {
        let json = serde_json::to_vec_pretty(summary)?;
        write_atomic(&self.snapshot_path, &json).map_err(|e| {
            anyhow!(
                "failed to write snapshot {}: {}",
                self.snapshot_path.display(),
                e
            )
        })
    }
}

/// Write to a uniquely named sibling temp file, sync, then rename over `path`.
/// The temp file is removed if any step fails.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = temp_sibling(path);
    let result = write_then_rename(&tmp_path, path, data);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_then_rename(tmp_path: &Path, path: &Path, data: &[u8]) -> Result<()> {
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(tmp_path)
            .map_err(|e| anyhow!("failed to create {}: {}", tmp_path.display(), e))?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)
        .map_err(|e| anyhow!("failed to rename onto {}: {}", path.display(), e))?;
    Ok(())
}

/// `.<name>.<pid>.<random>.tmp` next to `path`, so concurrent writers never share it.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(
        ".{}.{}.{:08x}.tmp",
        name,
        std::process::id(),
        rand::random::<u32>()
    ))
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: Vec<DetectionEvent>,
    last_snapshot: Option<AggregateSummary>,
    snapshot_writes: usize,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[DetectionEvent] {
        &self.events
    }

    pub fn last_snapshot(&self) -> Option<&AggregateSummary> {
        self.last_snapshot.as_ref()
    }

    pub fn snapshot_writes(&self) -> usize {
        self.snapshot_writes
    }
}

impl EventStore for InMemoryEventStore {
    fn append_event(&mut self, event: &DetectionEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }

    fn write_snapshot(&mut self, summary: &AggregateSummary) -> Result<()> {
        self.last_snapshot = Some(summary.clone());
        self.snapshot_writes += 1;
        Ok(())
    }
}
