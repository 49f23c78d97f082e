use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::REPORT_DECIMALS;
use crate::shared::embedding::round_to;
use crate::shared::media_metadata::MediaMetadata;
use crate::tracking::domain::track::TrackSummary;

/// How a file was ingested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Frame,
    Track,
    Image,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub file_name: String,
    pub mode: RunMode,
    /// `[width, height]`
    pub resolution: [u32; 2],
    pub fps: f64,
    /// Seconds.
    pub duration: f64,
    pub processed_faces: usize,
}

impl ReportMeta {
    pub fn new(metadata: &MediaMetadata, mode: RunMode, processed_faces: usize) -> Self {
        Self {
            file_name: metadata.file_name(),
            mode,
            resolution: [metadata.width, metadata.height],
            fps: round_to(metadata.fps, 3),
            duration: round_to(metadata.duration_secs(), 2),
            processed_faces,
        }
    }

    /// Replaces the source's base name, e.g. with its path inside a scanned
    /// directory.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

/// One stored detection in a frame-level run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameDetection {
    pub id: String,
    pub frame_id: usize,
    pub timestamp_ms: i64,
    pub score: f64,
    pub bbox: BoundingBox,
}

/// One face found in a still image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageFace {
    pub face_id: usize,
    pub score: f64,
    pub bbox: BoundingBox,
}

impl ImageFace {
    pub fn new(face_id: usize, score: f64, bbox: &BoundingBox) -> Self {
        Self {
            face_id,
            score: round_to(score, REPORT_DECIMALS),
            bbox: bbox.rounded(REPORT_DECIMALS),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportBody {
    Tracks {
        tracks: Vec<TrackSummary>,
    },
    Detections {
        detections: Vec<FrameDetection>,
        /// Records in the collection once this run was flushed.
        total_faces: usize,
    },
    Faces {
        faces: Vec<ImageFace>,
    },
}

/// Per-file summary written next to the other reports of a project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub meta: ReportMeta,
    #[serde(flatten)]
    pub body: ReportBody,
}

impl RunReport {
    /// Writes `<dir>/<file_name>.report.json`, creating directories as
    /// needed. A `file_name` with `/` separators lands in subdirectories.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(format!("{}.report.json", self.meta.file_name));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn metadata() -> MediaMetadata {
        MediaMetadata {
            width: 640,
            height: 480,
            fps: 29.97003,
            total_frames: 100,
            source_path: Some(PathBuf::from("/in/clip.mp4")),
            rotation: 0,
        }
    }

    #[test]
    fn test_meta_rounds_fps_and_duration() {
        let meta = ReportMeta::new(&metadata(), RunMode::Track, 7);
        assert_eq!(meta.file_name, "clip.mp4");
        assert_eq!(meta.resolution, [640, 480]);
        assert_eq!(meta.fps, 29.97);
        assert_eq!(meta.duration, 3.34);
        assert_eq!(meta.processed_faces, 7);
    }

    #[test]
    fn test_track_report_json_shape() {
        let report = RunReport {
            meta: ReportMeta::new(&metadata(), RunMode::Track, 1),
            body: ReportBody::Tracks {
                tracks: vec![TrackSummary {
                    track_id: 0,
                    time_range_ms: [0, 200],
                    duration_ms: 200,
                    best_score: 0.9,
                    best_frame: 5,
                    bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
                }],
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["meta"]["mode"], "track");
        assert_eq!(json["tracks"][0]["time_range_ms"][1], 200);
        assert_eq!(json["tracks"][0]["bbox"][2], 3.0);
        assert!(json.get("detections").is_none());
    }

    #[test]
    fn test_frame_report_has_total_faces() {
        let report = RunReport {
            meta: ReportMeta::new(&metadata(), RunMode::Frame, 0),
            body: ReportBody::Detections {
                detections: vec![],
                total_faces: 12,
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total_faces"], 12);
        assert_eq!(json["detections"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_image_face_rounds() {
        let face = ImageFace::new(0, 0.912345, &BoundingBox::new(1.00004, 2.0, 3.0, 4.0));
        assert_eq!(face.score, 0.9123);
        assert_eq!(face.bbox.x1, 1.0);
    }

    #[test]
    fn test_write_to_creates_directory() {
        let dir = TempDir::new().unwrap();
        let report = RunReport {
            meta: ReportMeta::new(&metadata(), RunMode::Image, 0),
            body: ReportBody::Faces { faces: vec![] },
        };
        let path = report.write_to(&dir.path().join("proj")).unwrap();
        assert!(path.ends_with("proj/clip.mp4.report.json"));

        let back: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["meta"]["file_name"], "clip.mp4");
        assert!(back["faces"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_nested_file_name_writes_into_subdirectory() {
        let dir = TempDir::new().unwrap();
        let report = RunReport {
            meta: ReportMeta::new(&metadata(), RunMode::Image, 0).with_file_name("day1/clip.mp4"),
            body: ReportBody::Faces { faces: vec![] },
        };
        let path = report.write_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("day1/clip.mp4.report.json"));
        assert!(path.exists());
    }
}
