use std::collections::VecDeque;

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, ClassNames, InferenceResult, RawDetection};
use crate::frame::Frame;

/// Stub backend for demos and tests.
///
/// In hashed mode it derives zero to two pseudo-detections from a SHA-256 of the
/// frame pixels, so identical frames always produce identical detections.
/// In scripted mode it replays a fixed sequence of per-frame detections and
/// returns nothing once the script runs out.
pub struct StubBackend {
    names: ClassNames,
    mode: StubMode,
}

enum StubMode {
    Hashed,
    Scripted(VecDeque<Vec<RawDetection>>),
}

impl StubBackend {
    pub fn hashed<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: ClassNames::from_labels(labels),
            mode: StubMode::Hashed,
        }
    }

    pub fn scripted<I, S>(labels: I, script: Vec<Vec<RawDetection>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: ClassNames::from_labels(labels),
            mode: StubMode::Scripted(script.into()),
        }
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<InferenceResult> {
        let detections = match &mut self.mode {
            StubMode::Hashed => hashed_detections(frame, self.names.len()),
            StubMode::Scripted(script) => script.pop_front().unwrap_or_default(),
        };
        Ok(InferenceResult::new(
            detections
                .into_iter()
                .filter(|det| det.confidence >= confidence_threshold)
                .collect(),
        ))
    }
}

fn hashed_detections(frame: &Frame, class_count: usize) -> Vec<RawDetection> {
    let digest: [u8; 32] = Sha256::digest(frame.pixels()).into();
    let count = (digest[0] % 3) as usize;
    let width = frame.width() as f32;
    let height = frame.height() as f32;

    (0..count)
        .map(|i| {
            let b = &digest[1 + i * 6..7 + i * 6];
            let class_id = if class_count == 0 {
                0
            } else {
                (b[0] as usize % class_count) as u32
            };
            // 0.25..=1.0, never zero
            let confidence = 0.25 + (b[1] as f32 / 255.0) * 0.75;
            let x1 = b[2] as f32 / 255.0 * width * 0.6;
            let y1 = b[3] as f32 / 255.0 * height * 0.6;
            let w = (0.1 + b[4] as f32 / 255.0 * 0.3) * width;
            let h = (0.1 + b[5] as f32 / 255.0 * 0.3) * height;
            RawDetection {
                class_id,
                confidence,
                bbox: BoundingBox::new(x1, y1, x1 + w, y1 + h).clamped(frame.width(), frame.height()),
            }
        })
        .collect()
}
