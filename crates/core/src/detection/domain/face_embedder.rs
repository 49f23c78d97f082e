use crate::shared::frame::Frame;

/// Maps a face crop to an L2-normalized identity embedding.
pub trait FaceEmbedder: Send {
    fn embed(&self, crop: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
