use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::report::ImageReport;
use crate::shared::detection::DetectionResult;
use crate::shared::frame::Frame;
use crate::shared::input_source::InputSource;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

/// Everything the caller needs to show a processed still image.
pub struct ImageOutcome {
    pub original: Frame,
    pub annotated: Frame,
    pub result: DetectionResult,
    pub metadata: VideoMetadata,
    pub report: ImageReport,
    pub saved_to: Option<PathBuf>,
}

/// Single-image pipeline: read → detect → annotate → optionally save.
pub struct DetectImageUseCase {
    reader: Box<dyn VideoReader>,
    detector: Box<dyn ObjectDetector>,
    annotator: Box<dyn FrameAnnotator>,
    image_writer: Box<dyn ImageWriter>,
    logger: Box<dyn PipelineLogger>,
}

impl DetectImageUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        detector: Box<dyn ObjectDetector>,
        annotator: Box<dyn FrameAnnotator>,
        image_writer: Box<dyn ImageWriter>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            detector,
            annotator,
            image_writer,
            logger,
        }
    }

    /// Runs detection on `source` and writes the annotated image to
    /// `save_to` when given.
    pub fn execute(
        &mut self,
        source: &InputSource,
        save_to: Option<&Path>,
    ) -> Result<ImageOutcome, Box<dyn std::error::Error>> {
        let metadata = self.reader.open(source)?;
        let first = self.reader.frames().next();
        self.reader.close();
        let original = first.ok_or("no frame in image")??;

        let result = self.detector.detect(&original)?;
        self.logger.timing("preprocess", result.speed.preprocess_ms);
        self.logger.timing("inference", result.speed.inference_ms);
        self.logger.timing("postprocess", result.speed.postprocess_ms);

        let started = Instant::now();
        let mut annotated = original.clone();
        self.annotator.annotate(&mut annotated, &result)?;
        self.logger
            .timing("annotate", started.elapsed().as_secs_f64() * 1000.0);
        self.logger.metric("objects", result.len() as f64);
        self.logger.progress(1, 1);

        let saved_to = match save_to {
            Some(path) => {
                self.image_writer.write(path, &annotated)?;
                self.logger
                    .info(&format!("Saved annotated image to {}", path.display()));
                Some(path.to_path_buf())
            }
            None => None,
        };

        let report = ImageReport::new(original.width(), original.height(), &result);
        self.logger.summary();

        Ok(ImageOutcome {
            original,
            annotated,
            result,
            metadata,
            report,
            saved_to,
        })
    }
}
