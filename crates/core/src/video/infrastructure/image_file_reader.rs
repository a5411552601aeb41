use std::path::Path;

use image::ImageReader;

use crate::shared::frame::Frame;
use crate::shared::input_source::{InputSource, SourceError};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Serves a still image as a one-frame source (`fps=0`, `total_frames=1`).
///
/// The format is sniffed from the file contents, so an upload saved with
/// the wrong extension still decodes. Alpha and palette images are
/// flattened to RGB.
#[derive(Default)]
pub struct ImageFileReader {
    pending: Option<Frame>,
    opened: bool,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self::default()
    }
}

fn decode(path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
    let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(Frame::from_rgb_image(decoded.into_rgb8(), 0))
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, source: &InputSource) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let InputSource::ImageFile(path) = source else {
            return Err(Box::new(SourceError::Unsupported(source.kind())));
        };
        let frame = decode(path)?;
        let (width, height) = (frame.width(), frame.height());
        log::debug!("Decoded image {}: {width}x{height}", path.display());

        self.pending = Some(frame);
        self.opened = true;
        Ok(VideoMetadata {
            width,
            height,
            fps: 0.0,
            total_frames: 1,
            codec: String::new(),
            source_path: Some(path.clone()),
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        if !self.opened {
            return Box::new(std::iter::once(Err("image source is not open".into())));
        }
        Box::new(self.pending.take().into_iter().map(Ok))
    }

    fn close(&mut self) {
        self.pending = None;
        self.opened = false;
    }
}
