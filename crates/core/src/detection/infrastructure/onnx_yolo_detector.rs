//! YOLOv8 object detector using ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference, per-class score decoding and
//! NMS, reporting the wall-clock time of each stage.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::detection::domain::box_filter::{filter_detections, NMS_IOU_THRESHOLD};
use crate::detection::domain::class_names::ClassNames;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::detection::{BoundingBox, Detection, DetectionResult, Speed};
use crate::shared::frame::Frame;
use crate::shared::settings::{DetectionSettings, Device};

use super::execution_provider::execution_providers;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Letterbox padding value, YOLO convention.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// A loaded session shared between detectors.
///
/// `Session::run` needs `&mut`, so concurrent detectors serialise on the lock.
pub type SharedSession = Arc<Mutex<ort::session::Session>>;

/// Thresholds applied after inference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorOptions {
    pub confidence: f64,
    pub max_detections: usize,
}

impl From<&DetectionSettings> for DetectorOptions {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            confidence: settings.confidence,
            max_detections: settings.max_detections,
        }
    }
}

/// Build an ONNX Runtime session for `device`.
pub fn load_session(
    model_path: &Path,
    device: Device,
) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    log::info!("Loading model {} on {device}", model_path.display());
    let session = ort::session::Session::builder()?
        .with_execution_providers(execution_providers(device))?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// YOLO object detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: SharedSession,
    class_names: ClassNames,
    input_size: u32,
    confidence: f64,
    max_detections: usize,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model on `device` and prepare for inference.
    pub fn new(
        model_path: &Path,
        device: Device,
        options: DetectorOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = Arc::new(Mutex::new(load_session(model_path, device)?));
        Self::from_shared_session(session, options)
    }

    /// Wrap an already-loaded session, e.g. one kept alive for the process.
    ///
    /// The input resolution is read from the model's input shape (expecting
    /// NCHW), falling back to 640 if the shape is dynamic or unreadable.
    pub fn from_shared_session(
        session: SharedSession,
        options: DetectorOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (input_size, class_names) = {
            let guard = session
                .lock()
                .map_err(|_| "detector session lock poisoned")?;
            (read_input_size(&guard), read_class_names(&guard))
        };
        log::debug!(
            "Detector input {input_size}x{input_size}, {} classes",
            class_names.len()
        );

        Ok(Self {
            session,
            class_names,
            input_size,
            confidence: options.confidence,
            max_detections: options.max_detections,
        })
    }

    pub fn class_names(&self) -> &ClassNames {
        &self.class_names
    }
}

fn read_input_size(session: &ort::session::Session) -> u32 {
    session
        .inputs()
        .first()
        .and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                // [N, C, H, W], H == W for YOLO exports
                if shape.len() >= 4 && shape[2] > 0 {
                    Some(shape[2] as u32)
                } else {
                    None
                }
            } else {
                None
            }
        })
        .unwrap_or(DEFAULT_INPUT_SIZE)
}

fn read_class_names(session: &ort::session::Session) -> ClassNames {
    let from_metadata = session
        .metadata()
        .ok()
        .and_then(|meta| meta.custom("names").ok().flatten())
        .and_then(|raw| ClassNames::from_metadata(&raw));
    if let Some(names) = from_metadata {
        return names;
    }

    // [1, 4 + nc, N]
    let num_classes = session.outputs().first().and_then(|output| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = output.dtype() {
            if shape.len() == 3 && shape[1] > 4 {
                Some(shape[1] as usize - 4)
            } else {
                None
            }
        } else {
            None
        }
    });
    match num_classes {
        Some(nc) => ClassNames::for_class_count(nc),
        None => ClassNames::coco(),
    }
}

impl ObjectDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, Box<dyn std::error::Error>> {
        // 1. Preprocess: letterbox + normalize → NCHW float32
        let started = Instant::now();
        let (input_tensor, letterbox) = letterbox(frame, self.input_size);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let preprocess_ms = elapsed_ms(started);

        // 2. Inference
        let started = Instant::now();
        let output = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| "detector session lock poisoned")?;
            let outputs = session.run(ort::inputs![input_value])?;
            if outputs.len() == 0 {
                return Err("YOLO model produced no outputs".into());
            }
            outputs[0]
                .try_extract_array::<f32>()?
                .as_standard_layout()
                .into_owned()
        };
        let inference_ms = elapsed_ms(started);

        // 3. Decode, NMS, cap
        let started = Instant::now();
        let data = output.as_slice().ok_or("Cannot get tensor slice")?;
        let candidates = decode_predictions(
            data,
            output.shape(),
            self.confidence as f32,
            &letterbox,
            frame,
            &self.class_names,
        )?;
        let detections = filter_detections(candidates, NMS_IOU_THRESHOLD, self.max_detections);
        let postprocess_ms = elapsed_ms(started);

        Ok(DetectionResult {
            detections,
            speed: Speed {
                preprocess_ms,
                inference_ms,
                postprocess_ms,
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

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Geometry of a letterboxed frame inside the model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        (
            ((x as f64 - self.pad_x as f64) / self.scale) as f32,
            ((y as f64 - self.pad_y as f64) / self.scale) as f32,
        )
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );

    let src = frame.as_ndarray(); // [H, W, C] u8
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Turn raw YOLOv8 predictions into frame-space candidates above `confidence`.
///
/// Accepts `[1, 4 + nc, N]` (the usual export) or the transposed
/// `[1, N, 4 + nc]`. Each row is `[cx, cy, w, h, score_0, .., score_nc]`.
fn decode_predictions(
    data: &[f32],
    shape: &[usize],
    confidence: f32,
    letterbox: &Letterbox,
    frame: &Frame,
    class_names: &ClassNames,
) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats <= 4 {
        return Err(format!("YOLO output has no class scores: {shape:?}").into());
    }
    if data.len() < num_dets * num_feats {
        return Err("YOLO output is shorter than its shape".into());
    }

    let at = |det: usize, feat: usize| {
        if transposed {
            data[feat * num_dets + det]
        } else {
            data[det * num_feats + feat]
        }
    };

    let mut candidates = Vec::new();
    for i in 0..num_dets {
        let (class_id, score) = (4..num_feats)
            .map(|f| (f - 4, at(i, f)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        // A NaN score or threshold compares as None and is rejected.
        if !matches!(
            score.partial_cmp(&confidence),
            Some(Ordering::Greater | Ordering::Equal)
        ) {
            continue;
        }

        let (cx, cy, w, h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));
        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        let bbox = BoundingBox::new(x1, y1, x2, y2).clamp_to(frame.width(), frame.height());
        if bbox.area() <= 0.0 {
            continue;
        }

        candidates.push(Detection {
            bbox,
            class_id,
            label: class_names.label(class_id),
            confidence: score,
        });
    }
    Ok(candidates)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn gray_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(
            vec![value; (width * height * 3) as usize],
            width,
            height,
            0,
        )
    }

    /// Build a `[1, 4 + nc, N]` tensor from rows of `[cx, cy, w, h, scores..]`,
    /// padded with empty rows so that `N > 4 + nc` like a real export.
    fn transposed_output(rows: &[Vec<f32>]) -> (Vec<f32>, Vec<usize>) {
        let num_feats = rows[0].len();
        let num_dets = rows.len().max(num_feats + 1);
        let mut data = vec![0.0; num_feats * num_dets];
        for (i, row) in rows.iter().enumerate() {
            for (f, v) in row.iter().enumerate() {
                data[f * num_dets + i] = *v;
            }
        }
        (data, vec![1, num_feats, num_dets])
    }

    fn identity_letterbox() -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        }
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → scale 3.2, 640x320 content, 160px bars top and bottom
        let frame = gray_frame(200, 100, 128);
        let (tensor, lb) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2, epsilon = 0.01);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 160);
    }

    #[test]
    fn test_letterbox_square_frame() {
        let frame = gray_frame(100, 100, 128);
        let (tensor, lb) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 6.4, epsilon = 0.01);
        assert_eq!((lb.pad_x, lb.pad_y), (0, 0));
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = gray_frame(100, 50, 255);
        let (tensor, lb) = letterbox(&frame, 640);

        assert!(lb.pad_y > 0);
        let y = lb.pad_y as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, 1]], 1.0, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], PAD_VALUE, epsilon = 0.01);
    }

    #[test]
    fn test_letterbox_maps_back_to_frame() {
        let lb = Letterbox {
            scale: 2.0,
            pad_x: 0,
            pad_y: 40,
        };
        let (x, y) = lb.to_frame(100.0, 140.0);
        assert_relative_eq!(x, 50.0);
        assert_relative_eq!(y, 50.0);
    }

    #[test]
    fn test_decode_picks_best_class_and_filters_confidence() {
        let (data, shape) = transposed_output(&[
            vec![50.0, 50.0, 20.0, 20.0, 0.1, 0.9, 0.2],
            vec![150.0, 150.0, 20.0, 20.0, 0.3, 0.1, 0.2],
        ]);
        let frame = gray_frame(640, 640, 0);
        let names = ClassNames::new(vec!["pistol".into(), "knife".into(), "rifle".into()]);

        let dets =
            decode_predictions(&data, &shape, 0.4, &identity_letterbox(), &frame, &names).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert_eq!(dets[0].label, "knife");
        assert_relative_eq!(dets[0].confidence, 0.9);
        assert_eq!(dets[0].bbox, BoundingBox::new(40.0, 40.0, 60.0, 60.0));
    }

    #[test]
    fn test_decode_keeps_score_equal_to_threshold() {
        let (data, shape) = transposed_output(&[vec![50.0, 50.0, 20.0, 20.0, 0.5]]);
        let frame = gray_frame(640, 640, 0);
        let dets = decode_predictions(
            &data,
            &shape,
            0.5,
            &identity_letterbox(),
            &frame,
            &ClassNames::for_class_count(1),
        )
        .unwrap();
        assert_eq!(dets.len(), 1);
    }

    #[test]
    fn test_decode_drops_nan_scores() {
        let (data, shape) = transposed_output(&[
            vec![50.0, 50.0, 20.0, 20.0, f32::NAN, f32::NAN],
            vec![150.0, 150.0, 20.0, 20.0, f32::NAN, 0.9],
        ]);
        let frame = gray_frame(640, 640, 0);
        let dets = decode_predictions(
            &data,
            &shape,
            0.5,
            &identity_letterbox(),
            &frame,
            &ClassNames::for_class_count(2),
        )
        .unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert_relative_eq!(dets[0].confidence, 0.9);
    }

    #[test]
    fn test_decode_nan_threshold_keeps_nothing() {
        let (data, shape) = transposed_output(&[vec![50.0, 50.0, 20.0, 20.0, 0.9]]);
        let frame = gray_frame(640, 640, 0);
        let dets = decode_predictions(
            &data,
            &shape,
            f32::NAN,
            &identity_letterbox(),
            &frame,
            &ClassNames::for_class_count(1),
        )
        .unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn test_decode_row_major_layout() {
        // [1, N, 4 + nc] with N > features
        let rows: Vec<Vec<f32>> = (0..8)
            .map(|i| vec![10.0 + i as f32 * 30.0, 20.0, 10.0, 10.0, 0.8])
            .collect();
        let data: Vec<f32> = rows.concat();
        let frame = gray_frame(640, 640, 0);

        let dets = decode_predictions(
            &data,
            &[1, 8, 5],
            0.4,
            &identity_letterbox(),
            &frame,
            &ClassNames::for_class_count(1),
        )
        .unwrap();
        assert_eq!(dets.len(), 8);
        assert_relative_eq!(dets[1].bbox.x1, 35.0);
    }

    #[test]
    fn test_decode_clamps_to_frame_and_drops_empty_boxes() {
        let (data, shape) = transposed_output(&[
            vec![5.0, 5.0, 40.0, 40.0, 0.9],
            vec![700.0, 700.0, 20.0, 20.0, 0.9],
        ]);
        let frame = gray_frame(320, 240, 0);

        let dets = decode_predictions(
            &data,
            &shape,
            0.4,
            &identity_letterbox(),
            &frame,
            &ClassNames::for_class_count(1),
        )
        .unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(0.0, 0.0, 25.0, 25.0));
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let frame = gray_frame(10, 10, 0);
        let names = ClassNames::coco();
        let lb = identity_letterbox();
        assert!(decode_predictions(&[0.0; 4], &[1, 4], 0.4, &lb, &frame, &names).is_err());
        assert!(decode_predictions(&[0.0; 8], &[1, 4, 2], 0.4, &lb, &frame, &names).is_err());
    }

    #[test]
    fn test_options_from_settings() {
        let settings = DetectionSettings {
            confidence: 0.6,
            max_detections: 12,
            ..Default::default()
        };
        assert_eq!(
            DetectorOptions::from(&settings),
            DetectorOptions {
                confidence: 0.6,
                max_detections: 12
            }
        );
    }
}
