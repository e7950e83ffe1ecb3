use ndarray::ArrayViewD;

use super::TransformParams;
use crate::error::{DetectorError, Result};
use crate::result::Candidate;

/// Upper bound on detections returned for one image.
pub const MAX_DETECTIONS: usize = 300;

/// Number of box coordinates preceding the class scores in a YOLO head.
const YOLO_BOX_COORDS: usize = 4;

#[derive(Debug, Clone)]
pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32, iou_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            max_detections: MAX_DETECTIONS,
        }
    }

    /// Decode a YOLO head of shape `[1, 4 + classes, anchors]`.
    ///
    /// Boxes are `cx, cy, w, h` in network input pixels. Candidates above the
    /// confidence threshold go through class-aware NMS.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn parse_yolo(
        &self,
        output: &ArrayViewD<f32>,
        transform: &TransformParams,
    ) -> Result<Vec<Candidate>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= YOLO_BOX_COORDS {
            return Err(DetectorError::Inference(format!(
                "Unexpected YOLO output shape {:?}, expected [1, 4 + classes, anchors]",
                shape
            )));
        }

        let num_channels = shape[1];
        let num_anchors = shape[2];
        let mut candidates = Vec::new();

        for a in 0..num_anchors {
            let mut max_score = f32::NEG_INFINITY;
            let mut class_idx = 0usize;
            for c in YOLO_BOX_COORDS..num_channels {
                let score = output[[0, c, a]];
                if score > max_score {
                    max_score = score;
                    class_idx = c - YOLO_BOX_COORDS;
                }
            }

            if max_score < self.confidence_threshold {
                continue;
            }

            let xyxy = cxcywh_to_xyxy(
                output[[0, 0, a]],
                output[[0, 1, a]],
                output[[0, 2, a]],
                output[[0, 3, a]],
            );

            candidates.push(Candidate {
                class_id: class_idx as i64,
                confidence: max_score,
                bbox: transform.to_original(xyxy),
            });
        }

        let kept = non_max_suppression(candidates, self.iou_threshold, self.max_detections);
        tracing::debug!(detections = kept.len(), "Decoded YOLO output");
        Ok(kept)
    }

    /// Decode RF-DETR heads: `dets [1, queries, 4]` normalised cxcywh and
    /// `logits [1, queries, classes]`.
    ///
    /// Index 0 is background. Other indices are reported unchanged as the
    /// class id, which for COCO-trained heads is the COCO category id.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn parse_detr(
        &self,
        dets: &ArrayViewD<f32>,
        logits: &ArrayViewD<f32>,
        transform: &TransformParams,
    ) -> Result<Vec<Candidate>> {
        let (d, l) = (dets.shape(), logits.shape());
        if d.len() != 3 || l.len() != 3 || d[2] != 4 || d[1] != l[1] || l[2] < 2 {
            return Err(DetectorError::Inference(format!(
                "Unexpected DETR output shapes dets={:?} logits={:?}",
                d, l
            )));
        }

        let num_queries = d[1];
        let num_classes = l[2];
        let mut candidates = Vec::new();

        for i in 0..num_queries {
            let mut max_logit = f32::NEG_INFINITY;
            let mut class_idx = 1usize;
            for c in 1..num_classes {
                let logit = logits[[0, i, c]];
                if logit > max_logit {
                    max_logit = logit;
                    class_idx = c;
                }
            }

            let confidence = sigmoid(max_logit);
            if confidence < self.confidence_threshold {
                continue;
            }

            let [x1, y1, x2, y2] = cxcywh_to_xyxy(
                dets[[0, i, 0]],
                dets[[0, i, 1]],
                dets[[0, i, 2]],
                dets[[0, i, 3]],
            );

            let input_xyxy = [
                x1 * transform.input_width as f32,
                y1 * transform.input_height as f32,
                x2 * transform.input_width as f32,
                y2 * transform.input_height as f32,
            ];

            candidates.push(Candidate {
                class_id: class_idx as i64,
                confidence,
                bbox: transform.to_original(input_xyxy),
            });
        }

        sort_by_confidence(&mut candidates);
        candidates.truncate(self.max_detections);
        tracing::debug!(detections = candidates.len(), "Decoded DETR output");
        Ok(candidates)
    }
}

/// Greedy class-aware NMS; output is sorted by confidence, highest first.
pub fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    sort_by_confidence(&mut candidates);

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

fn sort_by_confidence(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

/// Intersection over union of two `xyxy` boxes.
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - intersection;

    if union > 0.0 { intersection / union } else { 0.0 }
}

/// Sigmoid activation function
#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> [f32; 4] {
    [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
}
