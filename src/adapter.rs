//! Inference result → detection events.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use crate::detect::{ClassNames, InferenceResult};
use crate::labels::CategoryTable;
use crate::{validate_confidence, DetectionEvent, SimulatedLocator};

/// Converts one frame's inference output into `DetectionEvent`s.
///
/// One adapter is built per source run; it owns the label tables and the
/// location simulation for that run.
pub struct FrameAdapter {
    source: String,
    table: CategoryTable,
    locator: SimulatedLocator,
}

impl FrameAdapter {
    pub fn new(source: impl Into<String>, table: CategoryTable, locator: SimulatedLocator) -> Self {
        Self {
            source: source.into(),
            table,
            locator,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    /// One event per detection, in detection order.
    ///
    /// A confidence outside (0, 1] is an inference fault and rejects the whole
    /// frame, so a frame is never half-recorded.
    pub fn events_for_frame(
        &mut self,
        frame_index: u64,
        result: &InferenceResult,
        names: &ClassNames,
        at: DateTime<Utc>,
    ) -> Result<Vec<DetectionEvent>> {
        for (idx, det) in result.detections.iter().enumerate() {
            validate_confidence(det.confidence).map_err(|e| {
                anyhow!(
                    "frame {} detection {} (class {}): {}",
                    frame_index,
                    idx,
                    det.class_id,
                    e
                )
            })?;
        }

        let events = result
            .detections
            .iter()
            .map(|det| {
                let raw_label = names.label_for(det.class_id);
                let point = self.locator.next_point();
                DetectionEvent {
                    timestamp: at,
                    source: self.source.clone(),
                    frame_index,
                    friendly_label: self.table.friendly_label(&raw_label).to_string(),
                    category: self.table.category_for(&raw_label).to_string(),
                    raw_label,
                    confidence: det.confidence,
                    latitude: point.latitude,
                    longitude: point.longitude,
                }
            })
            .collect();
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, RawDetection};
    use crate::labels::{DEFAULT_CLASS_LABELS, UNKNOWN_CATEGORY};
    use crate::{BOOTH_COORDINATES, DEFAULT_JITTER_DEG};

    fn adapter() -> FrameAdapter {
        FrameAdapter::new(
            "camera:0",
            CategoryTable::default(),
            SimulatedLocator::seeded(BOOTH_COORDINATES, DEFAULT_JITTER_DEG, 3),
        )
    }

    fn det(class_id: u32, confidence: f32) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox: BoundingBox::new(0.0, 0.0, 5.0, 5.0),
        }
    }

    #[test]
    fn preserves_order_and_maps_labels() {
        let names = ClassNames::from_labels(DEFAULT_CLASS_LABELS);
        let result = InferenceResult::new(vec![det(2, 0.9), det(3, 0.5), det(5, 0.3)]);
        let now = Utc::now();
        let events = adapter()
            .events_for_frame(4, &result, &names, now)
            .expect("events");

        let labels: Vec<_> = events.iter().map(|e| e.raw_label.as_str()).collect();
        assert_eq!(labels, ["garbage", "garbage_bag", "trash"]);
        assert_eq!(events[1].category, "Recyclable");
        assert_eq!(events[1].friendly_label, "garbage_bag");
        assert!(events.iter().all(|e| e.frame_index == 4));
        assert!(events.iter().all(|e| e.timestamp == now));
        assert!(events.iter().all(|e| e.source == "camera:0"));
        assert_eq!(events[2].confidence, 0.3);
    }

    #[test]
    fn unnamed_class_becomes_numeric_label_with_unknown_category() {
        let names = ClassNames::from_labels(["garbage"]);
        let result = InferenceResult::new(vec![det(17, 0.6)]);
        let events = adapter()
            .events_for_frame(1, &result, &names, Utc::now())
            .unwrap();
        assert_eq!(events[0].raw_label, "17");
        assert_eq!(events[0].category, UNKNOWN_CATEGORY);
    }

    #[test]
    fn empty_result_yields_no_events() {
        let names = ClassNames::from_labels(DEFAULT_CLASS_LABELS);
        let events = adapter()
            .events_for_frame(1, &InferenceResult::default(), &names, Utc::now())
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn out_of_range_confidence_rejects_frame() {
        let names = ClassNames::from_labels(DEFAULT_CLASS_LABELS);
        let result = InferenceResult::new(vec![det(2, 0.9), det(2, 1.5)]);
        assert!(adapter()
            .events_for_frame(1, &result, &names, Utc::now())
            .is_err());
    }

    #[test]
    fn events_carry_simulated_location_near_booth() {
        let names = ClassNames::from_labels(DEFAULT_CLASS_LABELS);
        let result = InferenceResult::new(vec![det(2, 0.9)]);
        let events = adapter()
            .events_for_frame(1, &result, &names, Utc::now())
            .unwrap();
        let d = events[0].location().distance_m(&BOOTH_COORDINATES);
        assert!(d < 130.0, "distance {}", d);
        events[0].validate().expect("valid event");
    }
}
