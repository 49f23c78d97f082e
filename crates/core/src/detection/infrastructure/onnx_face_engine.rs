use std::path::Path;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::detection::domain::face_engine::FaceEngine;
use crate::shared::frame::Frame;

use super::arcface_embedder::ArcFaceEmbedder;
use super::onnx_yolo_detector::OnnxYoloDetector;

/// Detector plus embedder: locates faces, crops a square around each and
/// embeds the crop.
///
/// Faces whose crop falls entirely outside the frame are dropped.
pub struct OnnxFaceEngine {
    detector: Box<dyn FaceDetector>,
    embedder: Box<dyn FaceEmbedder>,
}

impl OnnxFaceEngine {
    pub fn new(detector: Box<dyn FaceDetector>, embedder: Box<dyn FaceEmbedder>) -> Self {
        Self { detector, embedder }
    }

    /// YOLO-pose detector and ArcFace embedder loaded from model files.
    pub fn from_models(
        detector_path: &Path,
        embedding_path: &Path,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let detector = OnnxYoloDetector::new(detector_path, confidence)?;
        let embedder = ArcFaceEmbedder::new(embedding_path)?;
        Ok(Self::new(Box::new(detector), Box::new(embedder)))
    }
}

impl FaceEngine for OnnxFaceEngine {
    fn extract(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let candidates = self.detector.detect(frame)?;
        let mut detections = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(crop) = frame.square_crop(&candidate.bbox) else {
                log::debug!("Dropping off-frame face at {:?}", candidate.bbox);
                continue;
            };
            let embedding = self.embedder.embed(&crop)?;
            detections.push(Detection {
                bbox: candidate.bbox,
                score: candidate.score,
                embedding,
                keypoints: candidate.keypoints,
            });
        }
        Ok(detections)
    }
}
