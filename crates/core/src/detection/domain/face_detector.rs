use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::detection::NUM_KEYPOINTS;

/// A located face before it has been embedded.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceCandidate {
    pub bbox: BoundingBox,
    pub score: f64,
    pub keypoints: [(f64, f64); NUM_KEYPOINTS],
}

/// Domain interface for face localization.
///
/// Implementations may reuse buffers across frames, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceCandidate>, Box<dyn std::error::Error>>;
}
