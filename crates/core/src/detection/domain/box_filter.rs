use std::cmp::Ordering;

use crate::shared::detection::Detection;

/// IoU above which a lower-scoring box of the same class is suppressed.
/// Matches the Ultralytics predict default.
pub const NMS_IOU_THRESHOLD: f32 = 0.7;

/// Greedy per-class NMS followed by a cap on the number of boxes.
///
/// Output is sorted by confidence, highest first. Boxes of different classes
/// never suppress each other.
pub fn filter_detections(
    mut candidates: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if keep.len() >= max_detections {
            break;
        }
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..candidates.len() {
            if suppressed[j] || candidates[j].class_id != candidates[i].class_id {
                continue;
            }
            if candidates[i].bbox.iou(&candidates[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
        keep.push(candidates[i].clone());
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::detection::BoundingBox;

    fn det(class_id: usize, confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            class_id,
            label: format!("class{class_id}"),
            confidence,
        }
    }

    #[test]
    fn test_suppresses_overlapping_same_class() {
        let kept = filter_detections(
            vec![
                det(0, 0.8, 5.0, 5.0, 105.0, 105.0),
                det(0, 0.9, 0.0, 0.0, 100.0, 100.0),
            ],
            NMS_IOU_THRESHOLD,
            10,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_keeps_moderately_overlapping_same_class() {
        let a = det(0, 0.9, 0.0, 0.0, 100.0, 100.0);
        let b = det(0, 0.8, 30.0, 0.0, 130.0, 100.0);
        let iou = a.bbox.iou(&b.bbox);
        assert!(iou > 0.5 && iou < NMS_IOU_THRESHOLD, "iou was {iou}");

        let kept = filter_detections(vec![a, b], NMS_IOU_THRESHOLD, 10);

        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_keeps_overlapping_different_classes() {
        let kept = filter_detections(
            vec![
                det(0, 0.9, 0.0, 0.0, 100.0, 100.0),
                det(1, 0.8, 5.0, 5.0, 105.0, 105.0),
            ],
            NMS_IOU_THRESHOLD,
            10,
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_keeps_non_overlapping() {
        let kept = filter_detections(
            vec![
                det(0, 0.9, 0.0, 0.0, 50.0, 50.0),
                det(0, 0.8, 200.0, 200.0, 250.0, 250.0),
            ],
            NMS_IOU_THRESHOLD,
            10,
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_truncates_to_max_in_confidence_order() {
        let candidates = (0..6)
            .map(|i| {
                let x = i as f32 * 100.0;
                det(0, 0.3 + i as f32 * 0.1, x, 0.0, x + 50.0, 50.0)
            })
            .collect();
        let kept = filter_detections(candidates, NMS_IOU_THRESHOLD, 3);
        let confidences: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(kept.len(), 3);
        assert!(confidences.windows(2).all(|w| w[0] >= w[1]));
        assert!((confidences[0] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_suppressed_boxes_do_not_count_toward_max() {
        let kept = filter_detections(
            vec![
                det(0, 0.9, 0.0, 0.0, 100.0, 100.0),
                det(0, 0.85, 2.0, 2.0, 102.0, 102.0),
                det(0, 0.5, 300.0, 300.0, 350.0, 350.0),
            ],
            NMS_IOU_THRESHOLD,
            2,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].confidence, 0.5);
    }

    #[test]
    fn test_empty_input() {
        assert!(filter_detections(Vec::new(), NMS_IOU_THRESHOLD, 5).is_empty());
    }
}
