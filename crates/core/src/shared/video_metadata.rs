use std::path::PathBuf;

/// Stream properties reported by a reader when it opens a source.
///
/// Live sources report `total_frames == 0` since their length is unknown.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Metadata for an annotated recording: same frame size, fixed rate.
    pub fn for_recording(&self, fps: f64) -> VideoMetadata {
        VideoMetadata {
            fps,
            total_frames: 0,
            codec: "mpeg4".to_string(),
            source_path: None,
            ..self.clone()
        }
    }
}
