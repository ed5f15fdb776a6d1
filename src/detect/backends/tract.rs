#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, ClassNames, InferenceResult, RawDetection};
use crate::frame::Frame;

const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const MAX_DETECTIONS: usize = 300;

/// Tract-based backend for YOLOv8-style ONNX exports.
///
/// Expects a single `[1, 3, S, S]` float input and a `[1, 4 + classes, anchors]`
/// output whose first four rows are centre-x, centre-y, width, height in input
/// pixels. Frames are resized to `S x S`; boxes are scaled back to frame size.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    names: ClassNames,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, labels: Vec<String>) -> Result<Self> {
        let model_path = model_path.as_ref();
        if input_size == 0 {
            return Err(anyhow!("model input size must be > 0"));
        }
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_size as usize, input_size as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "loaded ONNX model {} ({}x{}, {} classes)",
            model_path.display(),
            input_size,
            input_size,
            labels.len()
        );

        Ok(Self {
            model,
            input_size,
            names: ClassNames::from_labels(labels),
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let size = self.input_size;
        let resized = imageops::resize(frame.image(), size, size, FilterType::Triangle);
        let side = size as usize;
        let pixels = resized.as_raw();
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            let idx = (y * side + x) * 3 + channel;
            pixels[idx] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        confidence_threshold: f32,
        frame: &Frame,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let classes = shape[1] - 4;
        let anchors = shape[2];
        let scale_x = frame.width() as f32 / self.input_size as f32;
        let scale_y = frame.height() as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let (class_id, score) = (0..classes)
                .map(|c| (c, view[[0, 4 + c, a]]))
                .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !score.is_finite() || score < confidence_threshold || score <= 0.0 {
                continue;
            }
            let bbox = BoundingBox::from_center(
                view[[0, 0, a]] * scale_x,
                view[[0, 1, a]] * scale_y,
                view[[0, 2, a]] * scale_x,
                view[[0, 3, a]] * scale_y,
            )
            .clamped(frame.width(), frame.height());
            candidates.push(RawDetection {
                class_id: class_id as u32,
                confidence: score.min(1.0),
                bbox,
            });
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<InferenceResult> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let detections = self.decode(outputs, confidence_threshold, frame)?;
        Ok(InferenceResult::new(detections))
    }
}

/// Greedy per-class NMS, highest confidence first.
fn non_max_suppression(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        if kept.len() >= MAX_DETECTIONS {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32, confidence: f32, x: f32) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox: BoundingBox::new(x, 0.0, x + 10.0, 10.0),
        }
    }

    #[test]
    fn nms_drops_overlapping_same_class() {
        let kept = non_max_suppression(vec![det(0, 0.6, 1.0), det(0, 0.9, 0.0)], 0.45);
        assert_eq!(kept, vec![det(0, 0.9, 0.0)]);
    }

    #[test]
    fn nms_keeps_overlapping_different_class() {
        let kept = non_max_suppression(vec![det(0, 0.6, 1.0), det(1, 0.9, 0.0)], 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].class_id, 1);
    }
}
