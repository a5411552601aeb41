use std::fmt;

use crate::shared::detection::{DetectionResult, Speed};

fn speed_line(speed: &Speed) -> String {
    format!(
        "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess",
        speed.preprocess_ms, speed.inference_ms, speed.postprocess_ms
    )
}

/// Text summary shown under an annotated still image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageReport {
    pub width: u32,
    pub height: u32,
    pub labels: Vec<String>,
    pub speed: Speed,
}

impl ImageReport {
    pub fn new(width: u32, height: u32, result: &DetectionResult) -> Self {
        Self {
            width,
            height,
            labels: result.labels().into_iter().map(str::to_string).collect(),
            speed: result.speed,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Image Details: {}x{}", self.height, self.width),
            format!("Objects Detected: {}", self.labels.len()),
            format!("Classes: {}", self.labels.join(", ")),
            speed_line(&self.speed),
        ]
    }
}

impl fmt::Display for ImageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

/// One line of per-frame detail for a running stream.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameReport {
    /// Webcam and IP camera frames, numbered from 0.
    Live {
        number: usize,
        width: u32,
        height: u32,
        labels: Vec<String>,
        speed: Speed,
    },
    /// Uploaded video frames, numbered by decode position from 1.
    Video { number: usize, labels: Vec<String> },
}

impl FrameReport {
    pub fn live(number: usize, width: u32, height: u32, result: &DetectionResult) -> Self {
        FrameReport::Live {
            number,
            width,
            height,
            labels: owned_labels(result),
            speed: result.speed,
        }
    }

    pub fn video(number: usize, result: &DetectionResult) -> Self {
        FrameReport::Video {
            number,
            labels: owned_labels(result),
        }
    }
}

fn owned_labels(result: &DetectionResult) -> Vec<String> {
    result.labels().into_iter().map(str::to_string).collect()
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameReport::Live {
                number,
                width,
                height,
                labels,
                speed,
            } => {
                let detected = if labels.is_empty() {
                    "No detections".to_string()
                } else {
                    labels.join(", ")
                };
                write!(
                    f,
                    "Frame {number}: {height}x{width}, (Objects: {}, {detected}), {}",
                    labels.len(),
                    speed_line(speed)
                )
            }
            FrameReport::Video { number, labels } => write!(
                f,
                "Frame: {number}, Objects: {}, Classes: {}",
                labels.len(),
                labels.join(", ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::detection::{BoundingBox, Detection};

    fn result(labels: &[&str]) -> DetectionResult {
        DetectionResult {
            detections: labels
                .iter()
                .enumerate()
                .map(|(i, label)| Detection {
                    bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                    class_id: i,
                    label: label.to_string(),
                    confidence: 0.9,
                })
                .collect(),
            speed: Speed {
                preprocess_ms: 1.25,
                inference_ms: 23.04,
                postprocess_ms: 0.96,
            },
        }
    }

    #[test]
    fn test_image_report_lines() {
        let report = ImageReport::new(640, 480, &result(&["pistol", "knife"]));
        assert_eq!(
            report.lines(),
            vec![
                "Image Details: 480x640",
                "Objects Detected: 2",
                "Classes: pistol, knife",
                "Speed: 1.2ms preprocess, 23.0ms inference, 1.0ms postprocess",
            ]
        );
    }

    #[test]
    fn test_image_report_without_detections() {
        let report = ImageReport::new(100, 50, &result(&[]));
        let text = report.to_string();
        assert!(text.contains("Objects Detected: 0"));
        assert!(text.contains("Classes: \n"));
    }

    #[test]
    fn test_live_frame_report() {
        let report = FrameReport::live(7, 1280, 720, &result(&["person", "knife"]));
        assert_eq!(
            report.to_string(),
            "Frame 7: 720x1280, (Objects: 2, person, knife), \
             Speed: 1.2ms preprocess, 23.0ms inference, 1.0ms postprocess"
        );
    }

    #[test]
    fn test_live_frame_report_without_detections() {
        let report = FrameReport::live(0, 640, 480, &result(&[]));
        assert!(report
            .to_string()
            .starts_with("Frame 0: 480x640, (Objects: 0, No detections), Speed:"));
    }

    #[test]
    fn test_video_frame_report() {
        let report = FrameReport::video(12, &result(&["rifle"]));
        assert_eq!(report.to_string(), "Frame: 12, Objects: 1, Classes: rifle");
    }

    #[test]
    fn test_video_frame_report_without_detections() {
        let report = FrameReport::video(3, &result(&[]));
        assert_eq!(report.to_string(), "Frame: 3, Objects: 0, Classes: ");
    }
}
