use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use iced::widget::image::Handle;

use lookout_core::annotation::infrastructure::box_annotator::BoxAnnotator;
use lookout_core::detection::infrastructure::onnx_yolo_detector::{
    DetectorOptions, OnnxYoloDetector,
};
use lookout_core::pipeline::detect_image_use_case::DetectImageUseCase;
use lookout_core::pipeline::detect_stream_use_case::{
    DetectStreamUseCase, FrameEvent, StreamEnd, StreamOutcome,
};
use lookout_core::pipeline::pipeline_logger::NullPipelineLogger;
use lookout_core::pipeline::run_control::RunControl;
use lookout_core::shared::frame::Frame;
use lookout_core::shared::input_source::InputSource;
use lookout_core::shared::settings::DetectionSettings;
use lookout_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use lookout_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use lookout_core::video::infrastructure::image_file_reader::ImageFileReader;
use lookout_core::video::infrastructure::image_file_writer::{encode_jpeg, ImageFileWriter};

use super::model_cache::ModelCache;

/// Frames the UI has not drained yet. The worker blocks beyond this, which
/// keeps a slow UI from queueing up stale frames.
const FRAME_BACKLOG: usize = 8;

/// Messages sent from the worker thread to the UI.
pub enum WorkerMessage {
    DownloadProgress(u64, u64),
    /// The model is loaded and the source is being read.
    Started,
    ImageReady(Box<ImageView>),
    Frame(Box<FrameView>),
    Finished(StreamSummary),
    Error(String),
}

pub struct ImageView {
    pub original: Handle,
    pub annotated: Handle,
    pub report: Vec<String>,
    /// Annotated JPEG offered for download when saving is on.
    pub jpeg: Option<Vec<u8>>,
}

pub struct FrameView {
    pub frame: Handle,
    pub report: String,
    pub snapshot: bool,
}

impl From<FrameEvent> for FrameView {
    fn from(event: FrameEvent) -> Self {
        Self {
            frame: to_handle(&event.annotated),
            report: event.report.to_string(),
            snapshot: event.snapshot,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamSummary {
    pub frames: usize,
    pub warning: Option<String>,
    /// Finished recording, present only when at least one frame was written.
    pub recording: Option<PathBuf>,
}

impl From<StreamOutcome> for StreamSummary {
    fn from(outcome: StreamOutcome) -> Self {
        let warning = match outcome.end {
            StreamEnd::ReadFailed(warning) => Some(warning),
            StreamEnd::Exhausted | StreamEnd::Stopped => None,
        };
        Self {
            frames: outcome.frames,
            warning,
            recording: outcome.recording.filter(|_| outcome.frames > 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Image(PathBuf),
    Stream(InputSource),
}

pub struct JobParams {
    pub job: Job,
    pub settings: DetectionSettings,
    /// Where a stream job records its annotated frames.
    pub recording: Option<PathBuf>,
    pub model_cache: Arc<ModelCache>,
}

/// Runs `params.job` on a background thread. Progress and results arrive
/// on the returned channel; `control` stops the run and adjusts it live.
pub fn spawn(params: JobParams, control: Arc<RunControl>) -> Receiver<WorkerMessage> {
    let (tx, rx) = crossbeam_channel::bounded::<WorkerMessage>(FRAME_BACKLOG);

    thread::spawn(move || {
        if let Err(e) = run_job(&tx, &control, params) {
            if control.is_cancelled() {
                let _ = tx.send(WorkerMessage::Finished(StreamSummary {
                    frames: 0,
                    warning: None,
                    recording: None,
                }));
            } else {
                log::error!("Detection failed: {e}");
                let _ = tx.send(WorkerMessage::Error(e.to_string()));
            }
        }
    });

    rx
}

fn run_job(
    tx: &Sender<WorkerMessage>,
    control: &Arc<RunControl>,
    params: JobParams,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = &params.settings;
    let tx_progress = tx.clone();
    let session = params.model_cache.session(
        settings.device,
        &|downloaded, total| {
            let _ = tx_progress.try_send(WorkerMessage::DownloadProgress(downloaded, total));
        },
        &|| control.is_cancelled(),
    )?;
    let detector = OnnxYoloDetector::from_shared_session(session, DetectorOptions::from(settings))?;
    let annotator = BoxAnnotator::with_system_font();
    let _ = tx.send(WorkerMessage::Started);

    match params.job {
        Job::Image(path) => {
            let mut use_case = DetectImageUseCase::new(
                Box::new(ImageFileReader::new()),
                Box::new(detector),
                Box::new(annotator),
                Box::new(ImageFileWriter::new()),
                Box::new(NullPipelineLogger),
            );
            let outcome = use_case.execute(&InputSource::from_path(path)?, None)?;
            let jpeg = if settings.save_result {
                Some(encode_jpeg(&outcome.annotated)?)
            } else {
                None
            };
            let view = ImageView {
                original: to_handle(&outcome.original),
                annotated: to_handle(&outcome.annotated),
                report: outcome.report.lines(),
                jpeg,
            };
            let _ = tx.send(WorkerMessage::ImageReady(Box::new(view)));
        }
        Job::Stream(source) => {
            let mut use_case = DetectStreamUseCase::new(
                Box::new(FfmpegReader::new()),
                Box::new(detector),
                Box::new(annotator),
                Box::new(NullPipelineLogger),
                control.clone(),
            );
            if let Some(path) = params.recording {
                use_case = use_case.with_recording(Box::new(FfmpegWriter::new()), path);
            }
            // A closed channel means the UI moved on.
            let outcome = use_case.execute(&source, |event| {
                tx.send(WorkerMessage::Frame(Box::new(FrameView::from(event))))
                    .is_ok()
            })?;
            let _ = tx.send(WorkerMessage::Finished(StreamSummary::from(outcome)));
        }
    }
    Ok(())
}

fn to_handle(frame: &Frame) -> Handle {
    Handle::from_rgba(frame.width(), frame.height(), frame.to_rgba())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_core::shared::video_metadata::VideoMetadata;

    fn outcome(frames: usize, end: StreamEnd, recording: Option<&str>) -> StreamOutcome {
        StreamOutcome {
            frames,
            end,
            metadata: VideoMetadata {
                width: 640,
                height: 480,
                fps: 30.0,
                total_frames: 0,
                codec: "rawvideo".into(),
                source_path: None,
            },
            recording: recording.map(PathBuf::from),
        }
    }

    #[test]
    fn test_summary_carries_read_failure_warning() {
        let summary = StreamSummary::from(outcome(
            12,
            StreamEnd::ReadFailed("Failed to read from the webcam.".into()),
            Some("rec.mp4"),
        ));
        assert_eq!(summary.frames, 12);
        assert_eq!(summary.warning.as_deref(), Some("Failed to read from the webcam."));
        assert_eq!(summary.recording, Some(PathBuf::from("rec.mp4")));
    }

    #[test]
    fn test_summary_drops_empty_recording() {
        let summary = StreamSummary::from(outcome(0, StreamEnd::Stopped, Some("rec.mp4")));
        assert!(summary.recording.is_none());
        assert!(summary.warning.is_none());
    }

    #[test]
    fn test_finished_video_has_no_warning() {
        let summary = StreamSummary::from(outcome(300, StreamEnd::Exhausted, None));
        assert_eq!(
            summary,
            StreamSummary {
                frames: 300,
                warning: None,
                recording: None,
            }
        );
    }
}
