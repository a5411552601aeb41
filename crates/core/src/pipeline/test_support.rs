//! Recording stubs for the pipeline use case tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::detection::{BoundingBox, Detection, DetectionResult, Speed};
use crate::shared::frame::Frame;
use crate::shared::input_source::InputSource;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

pub fn frame(index: usize, w: u32, h: u32) -> Frame {
    Frame::new(vec![0; (w * h * 3) as usize], w, h, index)
}

pub fn metadata(w: u32, h: u32, total_frames: usize) -> VideoMetadata {
    VideoMetadata {
        width: w,
        height: h,
        fps: 30.0,
        total_frames,
        codec: "h264".into(),
        source_path: None,
    }
}

pub enum Item {
    Frame(Frame),
    Fail(&'static str),
}

pub struct StubReader {
    items: VecDeque<Item>,
    metadata: VideoMetadata,
    pub opened: Arc<Mutex<Option<InputSource>>>,
    pub closed: Arc<Mutex<bool>>,
    fail_open: bool,
}

impl StubReader {
    pub fn new(items: Vec<Item>, metadata: VideoMetadata) -> Self {
        Self {
            items: items.into(),
            metadata,
            opened: Arc::new(Mutex::new(None)),
            closed: Arc::new(Mutex::new(false)),
            fail_open: false,
        }
    }

    pub fn frames(count: usize, w: u32, h: u32) -> Self {
        let items = (0..count).map(|i| Item::Frame(frame(i, w, h))).collect();
        Self::new(items, metadata(w, h, count))
    }

    pub fn failing_open() -> Self {
        let mut reader = Self::new(Vec::new(), metadata(0, 0, 0));
        reader.fail_open = true;
        reader
    }
}

impl VideoReader for StubReader {
    fn open(&mut self, source: &InputSource) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        if self.fail_open {
            return Err("cannot open source".into());
        }
        *self.opened.lock().unwrap() = Some(source.clone());
        Ok(self.metadata.clone())
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        Box::new(std::iter::from_fn(move || {
            self.items.pop_front().map(|item| match item {
                Item::Frame(frame) => Ok(frame),
                Item::Fail(msg) => Err(msg.into()),
            })
        }))
    }

    fn close(&mut self) {
        *self.closed.lock().unwrap() = true;
    }
}

/// Returns one detection per entry in `labels` and records the thresholds
/// in effect for each call.
pub struct StubDetector {
    labels: Vec<&'static str>,
    confidence: f64,
    max_detections: usize,
    pub calls: Arc<Mutex<Vec<(f64, usize)>>>,
}

impl StubDetector {
    pub fn new(labels: &[&'static str]) -> Self {
        Self {
            labels: labels.to_vec(),
            confidence: 0.0,
            max_detections: usize::MAX,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ObjectDetector for StubDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<DetectionResult, Box<dyn std::error::Error>> {
        self.calls
            .lock()
            .unwrap()
            .push((self.confidence, self.max_detections));
        let detections = self
            .labels
            .iter()
            .take(self.max_detections)
            .enumerate()
            .map(|(i, label)| Detection {
                bbox: BoundingBox::new(1.0, 1.0, 4.0, 4.0),
                class_id: i,
                label: label.to_string(),
                confidence: 0.9,
            })
            .collect();
        Ok(DetectionResult {
            detections,
            speed: Speed {
                preprocess_ms: 1.0,
                inference_ms: 10.0,
                postprocess_ms: 0.5,
            },
        })
    }

    fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence;
    }

    fn set_max_detections(&mut self, max_detections: usize) {
        self.max_detections = max_detections;
    }
}

/// Marks the first pixel of every annotated frame.
pub struct StubAnnotator;

pub const MARK: u8 = 255;

impl FrameAnnotator for StubAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        result: &DetectionResult,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !result.is_empty() {
            frame.data_mut()[0] = MARK;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct StubVideoWriter {
    pub opened: Arc<Mutex<Option<(PathBuf, VideoMetadata)>>>,
    pub written: Arc<Mutex<Vec<usize>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl VideoWriter for StubVideoWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        *self.opened.lock().unwrap() = Some((path.to_path_buf(), metadata.clone()));
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        self.written.lock().unwrap().push(frame.index());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

#[derive(Default)]
pub struct StubImageWriter {
    pub written: Arc<Mutex<Vec<(PathBuf, Frame)>>>,
}

impl ImageWriter for StubImageWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        self.written
            .lock()
            .unwrap()
            .push((path.to_path_buf(), frame.clone()));
        Ok(())
    }
}
