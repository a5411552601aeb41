use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::report::FrameReport;
use crate::pipeline::run_control::RunControl;
use crate::pipeline::snapshot::SnapshotPolicy;
use crate::shared::constants::RECORDING_FPS;
use crate::shared::detection::DetectionResult;
use crate::shared::frame::Frame;
use crate::shared::input_source::InputSource;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

/// One processed frame, handed to the caller as soon as it is ready.
pub struct FrameEvent {
    /// 0-based for live sources, 1-based decode position for video files.
    pub number: usize,
    pub annotated: Frame,
    pub result: DetectionResult,
    pub report: FrameReport,
    /// The caller should keep this frame as a snapshot.
    pub snapshot: bool,
}

/// Why a stream stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEnd {
    /// A video file ran out of frames.
    Exhausted,
    /// A live source stopped delivering frames; carries the user warning.
    ReadFailed(String),
    /// Cancelled, frame limit reached, or the callback asked to stop.
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub frames: usize,
    pub end: StreamEnd,
    pub metadata: VideoMetadata,
    pub recording: Option<PathBuf>,
}

/// Frame loop for video files, webcams and IP cameras:
/// read → detect → annotate → record → report.
pub struct DetectStreamUseCase {
    reader: Box<dyn VideoReader>,
    detector: Box<dyn ObjectDetector>,
    annotator: Box<dyn FrameAnnotator>,
    recorder: Option<(Box<dyn VideoWriter>, PathBuf)>,
    logger: Box<dyn PipelineLogger>,
    control: Arc<RunControl>,
    max_frames: Option<usize>,
}

impl DetectStreamUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        detector: Box<dyn ObjectDetector>,
        annotator: Box<dyn FrameAnnotator>,
        logger: Box<dyn PipelineLogger>,
        control: Arc<RunControl>,
    ) -> Self {
        Self {
            reader,
            detector,
            annotator,
            recorder: None,
            logger,
            control,
            max_frames: None,
        }
    }

    /// Records every annotated frame to `path`.
    pub fn with_recording(mut self, writer: Box<dyn VideoWriter>, path: PathBuf) -> Self {
        self.recorder = Some((writer, path));
        self
    }

    /// Stops after `max_frames` processed frames.
    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Processes `source` until it ends, fails, or is stopped.
    ///
    /// `on_frame` sees every processed frame and returns `false` to stop.
    /// The reader and any recording are closed on every exit path.
    pub fn execute(
        &mut self,
        source: &InputSource,
        mut on_frame: impl FnMut(FrameEvent) -> bool,
    ) -> Result<StreamOutcome, Box<dyn std::error::Error>> {
        let metadata = self.reader.open(source)?;
        log::info!(
            "Opened {} {source}: {}x{} @ {:.1} fps",
            source.kind(),
            metadata.width,
            metadata.height,
            metadata.fps
        );

        let recording = match self.open_recording(&metadata) {
            Ok(path) => path,
            Err(e) => {
                self.reader.close();
                return Err(e);
            }
        };

        let result = self.run(source, &metadata, &mut on_frame);
        self.reader.close();
        let closed = match self.recorder.as_mut() {
            Some((writer, _)) if recording.is_some() => writer.close(),
            _ => Ok(()),
        };
        self.logger.summary();

        let (frames, end) = result?;
        closed?;
        if let Some(path) = &recording {
            self.logger
                .info(&format!("Saved annotated video to {}", path.display()));
        }
        Ok(StreamOutcome {
            frames,
            end,
            metadata,
            recording,
        })
    }

    fn open_recording(
        &mut self,
        metadata: &VideoMetadata,
    ) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
        let Some((writer, path)) = self.recorder.as_mut() else {
            return Ok(None);
        };
        writer.open(path, &metadata.for_recording(RECORDING_FPS))?;
        Ok(Some(path.clone()))
    }

    fn run(
        &mut self,
        source: &InputSource,
        metadata: &VideoMetadata,
        on_frame: &mut dyn FnMut(FrameEvent) -> bool,
    ) -> Result<(usize, StreamEnd), Box<dyn std::error::Error>> {
        let live = source.is_live();
        let read_warning = source
            .read_failure_warning()
            .unwrap_or("Failed to read from the source.");
        let mut snapshots = SnapshotPolicy::new(Instant::now());
        let mut processed = 0;
        let mut frames = self.reader.frames();

        let end = loop {
            if self.control.is_cancelled() {
                break StreamEnd::Stopped;
            }
            if self.max_frames.is_some_and(|max| processed >= max) {
                break StreamEnd::Stopped;
            }

            let mut frame = match frames.next() {
                Some(Ok(frame)) => frame,
                Some(Err(e)) if live => {
                    log::warn!("Read from {source} failed: {e}");
                    break StreamEnd::ReadFailed(read_warning.to_string());
                }
                Some(Err(e)) => return Err(e),
                None if live => break StreamEnd::ReadFailed(read_warning.to_string()),
                None => break StreamEnd::Exhausted,
            };

            self.detector.set_confidence(self.control.confidence());
            self.detector
                .set_max_detections(self.control.max_detections());
            let result = self.detector.detect(&frame)?;
            self.logger.timing("preprocess", result.speed.preprocess_ms);
            self.logger.timing("inference", result.speed.inference_ms);
            self.logger.timing("postprocess", result.speed.postprocess_ms);

            let started = Instant::now();
            self.annotator.annotate(&mut frame, &result)?;
            self.logger
                .timing("annotate", started.elapsed().as_secs_f64() * 1000.0);
            self.logger.metric("objects", result.len() as f64);

            if let Some((writer, _)) = self.recorder.as_mut() {
                writer.write(&frame)?;
            }

            processed += 1;
            self.logger.progress(processed, metadata.total_frames);

            let (number, report) = if live {
                let report =
                    FrameReport::live(frame.index(), frame.width(), frame.height(), &result);
                (frame.index(), report)
            } else {
                let number = frame.index() + 1;
                (number, FrameReport::video(number, &result))
            };
            log::debug!("{report}");

            let event = FrameEvent {
                number,
                snapshot: snapshots.should_capture(&self.control, Instant::now()),
                annotated: frame,
                result,
                report,
            };
            if !on_frame(event) {
                break StreamEnd::Stopped;
            }
        };

        Ok((processed, end))
    }
}
