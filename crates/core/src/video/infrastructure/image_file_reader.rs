use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::media_metadata::MediaMetadata;
use crate::video::domain::media_reader::MediaReader;

/// Adapts a single image file to the [`MediaReader`] interface.
///
/// The image is a one-frame stream with `fps = 0` and `total_frames = 1`,
/// decoded with the `image` crate at `open`.
pub struct ImageFileReader {
    frame: Option<Frame>,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self { frame: None }
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<MediaMetadata, Box<dyn std::error::Error>> {
        let image = image::open(path)?.to_rgb8();
        let frame = Frame::from_rgb_image(image, 0);
        let metadata = MediaMetadata {
            width: frame.width(),
            height: frame.height(),
            fps: 0.0,
            total_frames: 1,
            source_path: Some(path.to_path_buf()),
            rotation: 0,
        };
        self.frame = Some(frame);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.frame.take() {
            Some(frame) => Box::new(std::iter::once(Ok(frame))),
            None => Box::new(std::iter::once(Err("ImageFileReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
