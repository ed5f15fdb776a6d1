//! Event recorder: log append, counter update, snapshot rewrite.

use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::storage::EventStore;
use crate::summary::{AggregateSummary, SummaryAggregator};
use crate::DetectionEvent;

/// How often the snapshot is rewritten.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// After every event.
    #[default]
    EveryEvent,
    /// Once per frame, after all of the frame's events are logged and counted.
    PerFrame,
}

impl FromStr for SnapshotPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "every_event" | "event" => Ok(Self::EveryEvent),
            "per_frame" | "frame" => Ok(Self::PerFrame),
            other => Err(anyhow!(
                "unknown snapshot policy '{}' (expected every_event or per_frame)",
                other
            )),
        }
    }
}

/// Records detection events for one run.
///
/// Construct one per run and pass it to the frame loop; it owns the only copy
/// of the run's counters. Storage errors are returned as-is and are not
/// retried: a failed append leaves the counters untouched, so the counters
/// never run ahead of the log.
pub struct DetectionRecorder<S: EventStore> {
    store: S,
    aggregator: SummaryAggregator,
    policy: SnapshotPolicy,
}

impl<S: EventStore> DetectionRecorder<S> {
    pub fn new(store: S, policy: SnapshotPolicy) -> Self {
        Self {
            store,
            aggregator: SummaryAggregator::new(),
            policy,
        }
    }

    pub fn policy(&self) -> SnapshotPolicy {
        self.policy
    }

    pub fn aggregator(&self) -> &SummaryAggregator {
        &self.aggregator
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn summary(&self) -> Option<AggregateSummary> {
        self.aggregator.snapshot()
    }

    /// Append, count, then rewrite the snapshot, in that order.
    pub fn record(&mut self, event: DetectionEvent) -> Result<()> {
        self.log_and_count(event)?;
        self.write_snapshot()
    }

    /// Record every event of one frame, in order. Returns the number recorded.
    ///
    /// Under `PerFrame` the snapshot is written once after the last event.
    pub fn record_frame(&mut self, events: Vec<DetectionEvent>) -> Result<usize> {
        let count = events.len();
        match self.policy {
            SnapshotPolicy::EveryEvent => {
                for event in events {
                    self.record(event)?;
                }
            }
            SnapshotPolicy::PerFrame => {
                if count == 0 {
                    return Ok(0);
                }
                for event in events {
                    self.log_and_count(event)?;
                }
                self.write_snapshot()?;
            }
        }
        Ok(count)
    }

    fn log_and_count(&mut self, event: DetectionEvent) -> Result<()> {
        self.store.append_event(&event)?;
        log::debug!(
            "event frame={} label={} category={} conf={:.2}",
            event.frame_index,
            event.friendly_label,
            event.category,
            event.confidence
        );
        self.aggregator.fold(event);
        Ok(())
    }

    fn write_snapshot(&mut self) -> Result<()> {
        let Some(summary) = self.aggregator.snapshot() else {
            return Ok(());
        };
        self.store.write_snapshot(&summary)
    }
}
