use crate::shared::detection::DetectionResult;
use crate::shared::frame::Frame;

/// Draws detection results onto a frame in place.
pub trait FrameAnnotator: Send {
    fn annotate(
        &self,
        frame: &mut Frame,
        result: &DetectionResult,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
