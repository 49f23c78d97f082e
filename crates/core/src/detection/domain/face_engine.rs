use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for the face analysis engine.
///
/// Returns every face in the frame with its embedding, in the engine's own
/// order. An empty list is a normal result. Implementations may hold
/// inference sessions that need exclusive access, hence `&mut self`.
pub trait FaceEngine: Send {
    fn extract(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
