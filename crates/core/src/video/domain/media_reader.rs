use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::media_metadata::MediaMetadata;

/// Reads decoded RGB frames from a video or still-image source.
///
/// Frames are produced lazily in decode order; an image is a one-frame
/// stream with `fps = 0`.
pub trait MediaReader: Send {
    fn open(&mut self, path: &Path) -> Result<MediaMetadata, Box<dyn std::error::Error>>;

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases decoder resources. Safe to call more than once.
    fn close(&mut self);
}
