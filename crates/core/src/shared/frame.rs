use ndarray::{s, ArrayView3};

use super::bounding_box::BoundingBox;

/// A decoded video frame or still image: tightly packed RGB bytes, row-major.
///
/// `index` is the position in the source stream (0 for still images). Pixel
/// format conversion happens in the readers; everything downstream treats the
/// buffer as opaque RGB.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

pub const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Turns the frame clockwise by 90, 180 or 270 degrees. Any other angle
    /// returns it unchanged.
    pub fn rotated(self, degrees: i32) -> Frame {
        if !matches!(degrees, 90 | 180 | 270) {
            return self;
        }
        let view = self.as_ndarray();
        let turned = match degrees {
            90 => view.permuted_axes([1, 0, 2]).slice_move(s![.., ..;-1, ..]),
            180 => view.slice_move(s![..;-1, ..;-1, ..]),
            _ => view.permuted_axes([1, 0, 2]).slice_move(s![..;-1, .., ..]),
        };
        let (height, width) = (turned.shape()[0] as u32, turned.shape()[1] as u32);
        Frame::new(turned.iter().copied().collect(), width, height, self.index)
    }

    /// Square crop centered on `bbox`, clamped to the frame.
    ///
    /// Returns `None` when the clamped crop is empty (box fully off-frame).
    pub fn square_crop(&self, bbox: &BoundingBox) -> Option<Frame> {
        let (cx, cy) = bbox.center();
        let half = bbox.width().max(bbox.height()) / 2.0;

        let x1 = (cx - half).max(0.0) as usize;
        let y1 = (cy - half).max(0.0) as usize;
        let x2 = ((cx + half).min(self.width as f64)).max(0.0) as usize;
        let y2 = ((cy + half).min(self.height as f64)).max(0.0) as usize;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let src = self.as_ndarray();
        let mut data = Vec::with_capacity((x2 - x1) * (y2 - y1) * CHANNELS);
        for row in y1..y2 {
            for col in x1..x2 {
                for c in 0..CHANNELS {
                    data.push(src[[row, col, c]]);
                }
            }
        }
        Some(Frame::new(
            data,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
            self.index,
        ))
    }
}
