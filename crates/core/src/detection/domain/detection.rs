use crate::shared::bounding_box::BoundingBox;

/// Number of facial keypoints reported per face.
pub const NUM_KEYPOINTS: usize = 5;

/// One face found by the face engine in a single frame.
///
/// Lives only for the frame being processed: it is either folded into a
/// track or turned into a frame-level store record.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Detector confidence in `[0, 1]`.
    pub score: f64,
    /// Identity embedding, L2-normalized.
    pub embedding: Vec<f32>,
    /// Eyes, nose tip, mouth corners; `(0, 0)` marks an invisible point.
    pub keypoints: [(f64, f64); NUM_KEYPOINTS],
}
