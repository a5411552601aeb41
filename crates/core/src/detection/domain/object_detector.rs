use crate::shared::detection::DetectionResult;
use crate::shared::frame::Frame;

/// Runs a pretrained detector on one frame at a time.
///
/// Thresholds are mutable so a long-running stream can pick up control
/// changes between frames without reloading the model.
pub trait ObjectDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, Box<dyn std::error::Error>>;

    /// Minimum score a candidate must reach to be kept.
    fn set_confidence(&mut self, confidence: f64);

    /// Upper bound on boxes returned per frame.
    fn set_max_detections(&mut self, max_detections: usize);
}
