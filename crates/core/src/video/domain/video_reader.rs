use crate::shared::frame::Frame;
use crate::shared::input_source::InputSource;
use crate::shared::video_metadata::VideoMetadata;

/// Reads frames from an image, a video file or a live capture device.
///
/// Implementations handle I/O details (codec, container format, capture
/// backend) while the pipeline works with the abstract `Frame` and
/// `VideoMetadata` types.
pub trait VideoReader: Send {
    /// Opens the capture handle and returns the stream's metadata.
    fn open(&mut self, source: &InputSource) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in decode order.
    ///
    /// The iterator ends when the source is exhausted; a failed read is
    /// yielded as an `Err` item.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases the capture handle. Safe to call more than once.
    fn close(&mut self);
}
