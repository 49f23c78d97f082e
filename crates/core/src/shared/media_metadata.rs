use std::path::{Path, PathBuf};

use super::constants::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

/// Source properties reported by a media reader.
///
/// Still images are represented as a single-frame stream with `fps = 0`.
/// `width` and `height` describe frames as the reader yields them, after any
/// `rotation` has been applied.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
    /// Clockwise degrees (0, 90, 180 or 270) the reader turns each frame to
    /// display it upright.
    pub rotation: i32,
}

impl MediaMetadata {
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }

    /// Millisecond timestamp of a frame index, truncated like the decoder clock.
    pub fn timestamp_ms(&self, frame_index: usize) -> i64 {
        if self.fps > 0.0 {
            (frame_index as f64 / self.fps * 1000.0) as i64
        } else {
            0
        }
    }

    /// Base file name of the source, or `"unknown"` when the reader had no path.
    pub fn file_name(&self) -> String {
        self.source_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// True when `name` ends in one of the known video extensions (case-insensitive).
pub fn is_video_name(name: &str) -> bool {
    extension_of(name)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// How a source file is ingested, decided by its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// `None` for files that are neither a known video nor image type.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = extension_of(&path.file_name()?.to_string_lossy())?;
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }
}

pub(crate) fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_lowercase())
}
