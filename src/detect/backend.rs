use anyhow::Result;

use crate::detect::result::{ClassNames, InferenceResult};
use crate::frame::Frame;

/// Detector backend trait.
///
/// # Inference Boundary
///
/// Everything behind this trait is an external collaborator: model loading,
/// pre-processing and the network itself. The recorder only sees the ordered
/// detections and the class-id → label map.
///
/// Implementations must:
/// - Apply `confidence_threshold` themselves (the recorder does no filtering)
/// - Preserve the model's detection order
/// - Return an error rather than a partial result when inference fails
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Class-id → label map published by the loaded model.
    fn class_names(&self) -> &ClassNames;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<InferenceResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
