/// YOLO-pose face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, confidence filtering and NMS.
/// Boxes and keypoints are mapped back to source-frame pixels.
use std::path::Path;

use crate::detection::domain::detection::NUM_KEYPOINTS;
use crate::detection::domain::face_detector::{FaceCandidate, FaceDetector};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::execution_provider::build_session;

/// Fallback input resolution when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

/// 5 landmarks × (x, y, conf).
const NUM_KEYPOINT_VALUES: usize = NUM_KEYPOINTS * 3;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Loads the model; the input size comes from its NCHW input shape.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceCandidate>, Box<dyn std::error::Error>> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let letterbox = Letterbox {
            scale,
            pad_x: pad_x as f64,
            pad_y: pad_y as f64,
        };

        let mut candidates = parse_output(data, &shape, self.confidence, &letterbox);
        Ok(nms(&mut candidates, NMS_IOU_THRESH))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // 114 gray padding, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

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

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

struct Letterbox {
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

impl Letterbox {
    fn unmap(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Decodes rows of `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`.
///
/// The output is either `[1, features, detections]` or
/// `[1, detections, features]`; the smaller axis is taken as features.
fn parse_output(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    letterbox: &Letterbox,
) -> Vec<FaceCandidate> {
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 {
        return Vec::new();
    }

    let value = |det: usize, feat: usize| -> f64 {
        let idx = if transposed {
            feat * num_dets + det
        } else {
            det * num_feats + feat
        };
        data[idx] as f64
    };

    let mut candidates = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }

        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let (x1, y1) = letterbox.unmap(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.unmap(cx + w / 2.0, cy + h / 2.0);

        let mut keypoints = [(0.0f64, 0.0f64); NUM_KEYPOINTS];
        if num_feats >= 5 + NUM_KEYPOINT_VALUES {
            for (k, point) in keypoints.iter_mut().enumerate() {
                let base = 5 + k * 3;
                if value(i, base + 2) >= KEYPOINT_CONF_THRESH {
                    *point = letterbox.unmap(value(i, base), value(i, base + 1));
                }
            }
        }

        candidates.push(FaceCandidate {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            score: conf,
            keypoints,
        });
    }
    candidates
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [FaceCandidate], iou_thresh: f64) -> Vec<FaceCandidate> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && dets[i].bbox.iou(&dets[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> FaceCandidate {
        FaceCandidate {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            score,
            keypoints: [(0.0, 0.0); NUM_KEYPOINTS],
        }
    }

    fn identity() -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        }
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // scale = min(640/200, 640/100) = 3.2 → 640x320, pad_y = 160
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert!((scale - 3.2).abs() < 0.01);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 0);
        let (tensor, _, pad_x, pad_y) = letterbox(&frame, 640);

        let y = pad_y as usize + 1;
        let x = pad_x as usize + 1;
        assert!((tensor[[0, 0, y, x]] - 1.0).abs() < 0.01);
        assert!((tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 0.01);
    }

    /// Pads `rows` with zero-confidence rows so detections outnumber features.
    fn padded(rows: &[Vec<f32>]) -> (Vec<Vec<f32>>, usize) {
        let feats = rows[0].len();
        let mut rows = rows.to_vec();
        while rows.len() <= feats {
            rows.push(vec![0.0; feats]);
        }
        (rows, feats)
    }

    fn row_major(rows: &[Vec<f32>]) -> (Vec<f32>, Vec<usize>) {
        let (rows, feats) = padded(rows);
        let shape = vec![1, rows.len(), feats];
        (rows.concat(), shape)
    }

    fn feature_major(rows: &[Vec<f32>]) -> (Vec<f32>, Vec<usize>) {
        let (rows, feats) = padded(rows);
        let data = (0..feats)
            .flat_map(|f| rows.iter().map(move |r| r[f]))
            .collect();
        (data, vec![1, feats, rows.len()])
    }

    #[test]
    fn test_parse_row_major_output() {
        let (data, shape) = row_major(&[
            vec![50.0, 50.0, 20.0, 40.0, 0.9],
            vec![10.0, 10.0, 4.0, 4.0, 0.1],
        ]);
        let dets = parse_output(&data, &shape, 0.5, &identity());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(40.0, 30.0, 60.0, 70.0));
        assert!((dets[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_parse_feature_major_output_maps_through_letterbox() {
        // scale 2 with a 10px horizontal pad
        let (data, shape) = feature_major(&[vec![30.0, 20.0, 20.0, 20.0, 0.8]]);
        let lb = Letterbox {
            scale: 2.0,
            pad_x: 10.0,
            pad_y: 0.0,
        };
        let dets = parse_output(&data, &shape, 0.5, &lb);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(5.0, 5.0, 15.0, 15.0));
    }

    #[test]
    fn test_parse_keypoints_respect_confidence() {
        let mut row = vec![50.0f32, 50.0, 20.0, 20.0, 0.9];
        for k in 0..NUM_KEYPOINTS {
            let conf = if k == 2 { 0.1 } else { 0.9 };
            row.extend_from_slice(&[k as f32 + 40.0, 45.0, conf]);
        }
        let (data, shape) = feature_major(&[row]);
        let dets = parse_output(&data, &shape, 0.5, &identity());
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].keypoints[0], (40.0, 45.0));
        assert_eq!(dets[0].keypoints[2], (0.0, 0.0));
        assert_eq!(dets[0].keypoints[4], (44.0, 45.0));
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let mut dets = vec![
            candidate(0.0, 0.0, 100.0, 100.0, 0.9),
            candidate(5.0, 5.0, 105.0, 105.0, 0.8),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_nms_keeps_non_overlapping() {
        let mut dets = vec![
            candidate(0.0, 0.0, 50.0, 50.0, 0.9),
            candidate(200.0, 200.0, 250.0, 250.0, 0.8),
        ];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_nms_higher_confidence_wins() {
        let mut dets = vec![
            candidate(0.0, 0.0, 100.0, 100.0, 0.5),
            candidate(2.0, 2.0, 102.0, 102.0, 0.9),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_nms_empty_input() {
        assert!(nms(&mut [], 0.3).is_empty());
    }
}
