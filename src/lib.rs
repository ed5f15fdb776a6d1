//! CleanEye detection recorder
//!
//! This crate turns the output of a pretrained garbage detector into a durable
//! event stream and a live summary that a separate dashboard process can poll.
//!
//! # Architecture
//!
//! The recording path keeps three guarantees:
//!
//! 1. **Log first**: every event is appended to the JSONL log before any counter moves.
//! 2. **No torn snapshots**: the summary file is replaced atomically (temp file + rename).
//! 3. **Replayable**: the counters can always be rebuilt from the log alone.
//!
//! # Module Structure
//!
//! - `detect`: Detector backends (stub, tract/ONNX) behind `DetectorBackend`
//! - `ingest`: Frame sources (single image, frame directory, synthetic)
//! - `adapter`: Inference result → `DetectionEvent` conversion
//! - `recorder`, `storage`, `log`, `summary`: The event log and live summary
//! - `pipeline`: The single-threaded frame loop
//! - `annotate`, `dashboard`: Box overlays and snapshot rendering
//! - `report`: Before/after report for a single image
//! - `config`: Detector configuration and output layout
//! - Core types: DetectionEvent, GeoPoint, SimulatedLocator

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub mod adapter;
pub mod annotate;
pub mod config;
pub mod dashboard;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod labels;
pub mod log;
pub mod pipeline;
pub mod recorder;
pub mod report;
pub mod storage;
pub mod summary;

pub use adapter::FrameAdapter;
pub use config::{DetectorConfig, OutputLayout};
pub use detect::{
    BackendOptions, BackendRegistry, BoundingBox, ClassNames, DetectorBackend, InferenceResult,
    RawDetection, StubBackend,
};
pub use frame::Frame;
pub use ingest::{DirectorySource, FrameSource, ImageSource, SyntheticSource};
pub use labels::{CategoryTable, DEFAULT_CLASS_LABELS, UNKNOWN_CATEGORY};
pub use crate::log::{replay_last_run, replay_log, run_starts, EventLog};
pub use pipeline::{DetectionRun, FrameOutcome, RunOptions, RunStats};
pub use recorder::{DetectionRecorder, SnapshotPolicy};
pub use report::{write_report, DetectionReport, ReportInput, WrittenReport};
pub use storage::{EventStore, FileEventStore, InMemoryEventStore};
pub use summary::{
    AggregateSummary, LocationHint, SummaryAggregator, SummaryReader, SummaryWatcher, WatchUpdate,
};

// -------------------- Simulated Location --------------------

/// Booth reference point used by the location simulation (ADNEC, Abu Dhabi).
pub const BOOTH_COORDINATES: GeoPoint = GeoPoint {
    latitude: 24.4181,
    longitude: 54.4583,
};

/// Half-width of the uniform jitter applied to each coordinate, in degrees.
pub const DEFAULT_JITTER_DEG: f64 = 0.0008;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(anyhow!("latitude {} out of range [-90, 90]", latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(anyhow!("longitude {} out of range [-180, 180]", longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Great-circle distance in metres (haversine).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// Demo-only location source.
///
/// Every point is the origin plus independent uniform jitter on each axis.
/// These are NOT sensor readings; they exist so the dashboard map has something
/// to show. Do not wire real GPS input through this type.
pub struct SimulatedLocator {
    origin: GeoPoint,
    jitter_deg: f64,
    rng: StdRng,
}

impl SimulatedLocator {
    pub fn new(origin: GeoPoint, jitter_deg: f64) -> Self {
        Self {
            origin,
            jitter_deg: jitter_deg.abs(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic locator for tests and reproducible demo runs.
    pub fn seeded(origin: GeoPoint, jitter_deg: f64, seed: u64) -> Self {
        Self {
            origin,
            jitter_deg: jitter_deg.abs(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_point(&mut self) -> GeoPoint {
        let lat_offset = self.jitter();
        let lon_offset = self.jitter();
        GeoPoint {
            latitude: self.origin.latitude + lat_offset,
            longitude: self.origin.longitude + lon_offset,
        }
    }

    fn jitter(&mut self) -> f64 {
        if self.jitter_deg == 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-self.jitter_deg..=self.jitter_deg)
    }
}

impl Default for SimulatedLocator {
    fn default() -> Self {
        Self::new(BOOTH_COORDINATES, DEFAULT_JITTER_DEG)
    }
}

// -------------------- Detection Events --------------------

/// One recognized object in one processed frame.
///
/// Events are written once to the append-only log and never modified.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectionEvent {
    pub timestamp: DateTime<Utc>,
    /// Input stream identifier (`camera:0`, a file path, `stub://...`).
    pub source: String,
    /// Frames processed so far in this run, including the current one.
    pub frame_index: u64,
    pub raw_label: String,
    pub friendly_label: String,
    pub category: String,
    pub confidence: f32, // (0, 1]
    /// Simulated, see `SimulatedLocator`.
    pub latitude: f64,
    pub longitude: f64,
}

impl DetectionEvent {
    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_confidence(self.confidence)?;
        if self.raw_label.trim().is_empty() {
            return Err(anyhow!("raw_label must not be empty"));
        }
        if self.friendly_label.trim().is_empty() {
            return Err(anyhow!("friendly_label must not be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(anyhow!("category must not be empty"));
        }
        GeoPoint::new(self.latitude, self.longitude)?;
        Ok(())
    }
}

/// Confidence scores must lie in (0, 1].
pub fn validate_confidence(confidence: f32) -> Result<()> {
    if confidence.is_finite() && confidence > 0.0 && confidence <= 1.0 {
        Ok(())
    } else {
        Err(anyhow!("confidence {} out of range (0, 1]", confidence))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    pub fn event(label: &str, category: &str, frame_index: u64) -> DetectionEvent {
        DetectionEvent {
            timestamp: Utc
                .with_ymd_and_hms(2025, 11, 3, 9, 30, 0)
                .single()
                .expect("valid timestamp")
                + chrono::Duration::seconds(frame_index as i64),
            source: "stub://booth".to_string(),
            frame_index,
            raw_label: label.to_string(),
            friendly_label: label.to_string(),
            category: category.to_string(),
            confidence: 0.8,
            latitude: BOOTH_COORDINATES.latitude,
            longitude: BOOTH_COORDINATES.longitude,
        }
    }
}
