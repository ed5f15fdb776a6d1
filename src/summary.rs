//! Run counters, the snapshot document, and the read side used by dashboards.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DetectionEvent;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct LocationHint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Snapshot document rewritten after every recorded event.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AggregateSummary {
    pub updated_at: DateTime<Utc>,
    pub total_detections: u64,
    pub class_counts: BTreeMap<String, u64>,
    pub category_counts: BTreeMap<String, u64>,
    pub last_event: DetectionEvent,
    pub location_hint: LocationHint,
}

impl AggregateSummary {
    /// `(label, count, percent of total)`, largest count first.
    pub fn class_breakdown(&self) -> Vec<(&str, u64, f64)> {
        breakdown(&self.class_counts, self.total_detections)
    }

    pub fn category_breakdown(&self) -> Vec<(&str, u64, f64)> {
        breakdown(&self.category_counts, self.total_detections)
    }
}

fn breakdown(counts: &BTreeMap<String, u64>, total: u64) -> Vec<(&str, u64, f64)> {
    let mut rows: Vec<(&str, u64, f64)> = counts
        .iter()
        .map(|(label, &count)| {
            let pct = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            (label.as_str(), count, pct)
        })
        .collect();
    // BTreeMap order breaks ties alphabetically; sort is stable.
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    rows
}

/// Cumulative counters for one run. No decrement, no windowing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SummaryAggregator {
    total: u64,
    class_counts: BTreeMap<String, u64>,
    category_counts: BTreeMap<String, u64>,
    last_event: Option<DetectionEvent>,
}

impl SummaryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold events in order into a fresh aggregator.
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = DetectionEvent>,
    {
        let mut agg = Self::new();
        for event in events {
            agg.fold(event);
        }
        agg
    }

    /// Count one event: total, its friendly label and its category each move by one.
    pub fn fold(&mut self, event: DetectionEvent) {
        self.total += 1;
        *self
            .class_counts
            .entry(event.friendly_label.clone())
            .or_insert(0) += 1;
        *self
            .category_counts
            .entry(event.category.clone())
            .or_insert(0) += 1;
        self.last_event = Some(event);
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn class_counts(&self) -> &BTreeMap<String, u64> {
        &self.class_counts
    }

    pub fn category_counts(&self) -> &BTreeMap<String, u64> {
        &self.category_counts
    }

    pub fn last_event(&self) -> Option<&DetectionEvent> {
        self.last_event.as_ref()
    }

    /// Full snapshot document; `None` until the first event.
    pub fn snapshot(&self) -> Option<AggregateSummary> {
        let last = self.last_event.as_ref()?;
        Some(AggregateSummary {
            updated_at: last.timestamp,
            total_detections: self.total,
            class_counts: self.class_counts.clone(),
            category_counts: self.category_counts.clone(),
            last_event: last.clone(),
            location_hint: LocationHint {
                latitude: last.latitude,
                longitude: last.longitude,
            },
        })
    }
}

// -------------------- Read Side --------------------

/// Reads the snapshot written by a detector process.
///
/// The reader never fails: a missing, unreadable or unparsable snapshot (for
/// example one caught mid-write by an uncoordinated writer) reads as "no data yet".
#[derive(Clone, Debug)]
pub struct SummaryReader {
    path: PathBuf,
}

impl SummaryReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<AggregateSummary> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("cannot read snapshot {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(summary) => Some(summary),
            Err(e) => {
                log::debug!("ignoring unparsable snapshot {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchUpdate {
    /// No snapshot has been seen yet.
    NoData,
    /// Nothing new since the previous poll (or the read raced a write).
    Unchanged,
    Advanced { new_detections: u64 },
    /// The snapshot went backwards: a new detector run started.
    Restarted,
}

/// Polls a `SummaryReader` and keeps the last good snapshot.
///
/// Failed reads keep the previous snapshot, so what a watcher shows only moves
/// forward within a run.
pub struct SummaryWatcher {
    reader: SummaryReader,
    last: Option<AggregateSummary>,
}

impl SummaryWatcher {
    pub fn new(reader: SummaryReader) -> Self {
        Self { reader, last: None }
    }

    pub fn latest(&self) -> Option<&AggregateSummary> {
        self.last.as_ref()
    }

    pub fn poll(&mut self) -> WatchUpdate {
        let Some(current) = self.reader.load() else {
            return if self.last.is_some() {
                WatchUpdate::Unchanged
            } else {
                WatchUpdate::NoData
            };
        };

        let update = match &self.last {
            None => WatchUpdate::Advanced {
                new_detections: current.total_detections,
            },
            Some(prev) if current.total_detections > prev.total_detections => {
                WatchUpdate::Advanced {
                    new_detections: current.total_detections - prev.total_detections,
                }
            }
            Some(prev)
                if current.total_detections == prev.total_detections
                    && current.last_event == prev.last_event =>
            {
                return WatchUpdate::Unchanged;
            }
            Some(_) => WatchUpdate::Restarted,
        };
        self.last = Some(current);
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::write_atomic;
    use crate::test_support::event;

    fn three_event_aggregator() -> SummaryAggregator {
        SummaryAggregator::from_events(vec![
            event("garbage", "General", 1),
            event("garbage_bag", "Recyclable", 2),
            event("garbage", "General", 3),
        ])
    }

    #[test]
    fn counts_are_cumulative_and_last_event_wins() {
        let agg = three_event_aggregator();
        assert_eq!(agg.total(), 3);
        assert_eq!(agg.class_counts().get("garbage"), Some(&2));
        assert_eq!(agg.class_counts().get("garbage_bag"), Some(&1));
        assert_eq!(agg.category_counts().get("General"), Some(&2));
        assert_eq!(agg.last_event().unwrap().frame_index, 3);
    }

    #[test]
    fn counts_by_friendly_label_not_raw_label() {
        let mut ev = event("garbage_bag", "Recyclable", 1);
        ev.friendly_label = "Bag".to_string();
        let agg = SummaryAggregator::from_events(vec![ev]);
        assert_eq!(agg.class_counts().get("Bag"), Some(&1));
        assert!(agg.class_counts().get("garbage_bag").is_none());
    }

    #[test]
    fn empty_aggregator_has_no_snapshot() {
        assert!(SummaryAggregator::new().snapshot().is_none());
    }

    #[test]
    fn snapshot_mirrors_last_event() {
        let agg = three_event_aggregator();
        let snap = agg.snapshot().unwrap();
        assert_eq!(snap.total_detections, 3);
        assert_eq!(snap.updated_at, snap.last_event.timestamp);
        assert_eq!(snap.last_event.frame_index, 3);
        assert_eq!(snap.location_hint.latitude, snap.last_event.latitude);
    }

    #[test]
    fn snapshot_json_has_nested_objects() {
        let snap = three_event_aggregator().snapshot().unwrap();
        let value: serde_json::Value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["total_detections"], 3);
        assert_eq!(value["class_counts"]["garbage"], 2);
        assert_eq!(value["last_event"]["friendly_label"], "garbage");
        assert!(value["location_hint"]["latitude"].is_f64());
        assert!(value["updated_at"].is_string());
    }

    #[test]
    fn breakdown_sorted_by_count() {
        let snap = three_event_aggregator().snapshot().unwrap();
        let rows = snap.class_breakdown();
        assert_eq!(rows[0].0, "garbage");
        assert_eq!(rows[0].1, 2);
        assert!((rows[0].2 - 66.666).abs() < 0.01);
        assert_eq!(rows[1].0, "garbage_bag");
    }

    #[test]
    fn reader_returns_none_for_missing_or_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live_summary.json");
        let reader = SummaryReader::new(&path);
        assert!(reader.load().is_none());

        let snap = three_event_aggregator().snapshot().unwrap();
        let json = serde_json::to_vec_pretty(&snap).unwrap();
        fs::write(&path, &json[..json.len() / 2]).unwrap();
        assert!(reader.load().is_none());

        fs::write(&path, b"").unwrap();
        assert!(reader.load().is_none());

        fs::write(&path, &json).unwrap();
        assert_eq!(reader.load(), Some(snap));
    }

    #[test]
    fn watcher_tracks_progress_and_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live_summary.json");
        let mut watcher = SummaryWatcher::new(SummaryReader::new(&path));
        assert_eq!(watcher.poll(), WatchUpdate::NoData);

        let mut agg = SummaryAggregator::new();
        agg.fold(event("garbage", "General", 1));
        write_atomic(&path, &serde_json::to_vec(&agg.snapshot().unwrap()).unwrap()).unwrap();
        assert_eq!(watcher.poll(), WatchUpdate::Advanced { new_detections: 1 });
        assert_eq!(watcher.poll(), WatchUpdate::Unchanged);

        agg.fold(event("trash", "General", 2));
        agg.fold(event("trash", "General", 2));
        write_atomic(&path, &serde_json::to_vec(&agg.snapshot().unwrap()).unwrap()).unwrap();
        assert_eq!(watcher.poll(), WatchUpdate::Advanced { new_detections: 2 });

        // torn read keeps the last good snapshot
        fs::write(&path, b"{\"updated_at\":").unwrap();
        assert_eq!(watcher.poll(), WatchUpdate::Unchanged);
        assert_eq!(watcher.latest().unwrap().total_detections, 3);

        let fresh = SummaryAggregator::from_events(vec![event("c", "Recyclable", 1)]);
        write_atomic(&path, &serde_json::to_vec(&fresh.snapshot().unwrap()).unwrap()).unwrap();
        assert_eq!(watcher.poll(), WatchUpdate::Restarted);
        assert_eq!(watcher.latest().unwrap().total_detections, 1);
    }
}
