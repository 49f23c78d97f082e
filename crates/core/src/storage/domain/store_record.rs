use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::detection::Detection;
use crate::shared::bounding_box::BoundingBox;
use crate::tracking::domain::track::TrackSummary;

pub const KEY_VIDEO_NAME: &str = "video_name";
pub const KEY_DATA_LEVEL: &str = "data_level";
pub const KEY_FRAME_ID: &str = "frame_id";
pub const KEY_TIMESTAMP_MS: &str = "timestamp_ms";
pub const KEY_START_TIME_MS: &str = "start_time_ms";
pub const KEY_END_TIME_MS: &str = "end_time_ms";
pub const KEY_DURATION: &str = "duration";
pub const KEY_SCORE: &str = "score";
pub const KEY_BEST_SCORE: &str = "best_score";
pub const KEY_TRACK_ID: &str = "track_id";
pub const BBOX_KEYS: [&str; 4] = ["bbox_x1", "bbox_y1", "bbox_x2", "bbox_y2"];

/// Granularity of a stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLevel {
    /// One record per detection in a sampled frame.
    Frame,
    /// One record per identity track, summarizing its best appearance.
    Track,
}

impl DataLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataLevel::Frame => "frame",
            DataLevel::Track => "track",
        }
    }
}

impl fmt::Display for DataLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar metadata value. The store keeps metadata flat; nested values are
/// not representable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Str(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Str(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum MetadataError {
    #[error("missing metadata field '{0}'")]
    Missing(&'static str),
    #[error("metadata field '{0}' is not numeric")]
    NotNumeric(&'static str),
}

/// Flat key → scalar mapping attached to every stored embedding.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<MetadataValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            MetadataValue::Int(v) => Some(*v),
            MetadataValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            MetadataValue::Int(v) => Some(*v as f64),
            MetadataValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn data_level(&self) -> Option<DataLevel> {
        match self.get_str(KEY_DATA_LEVEL)? {
            "frame" => Some(DataLevel::Frame),
            "track" => Some(DataLevel::Track),
            _ => None,
        }
    }

    /// Decodes the box from its four numeric fields.
    pub fn bbox(&self) -> Result<BoundingBox, MetadataError> {
        let mut coords = [0.0f64; 4];
        for (slot, key) in coords.iter_mut().zip(BBOX_KEYS) {
            let value = self.0.get(key).ok_or(MetadataError::Missing(key))?;
            *slot = match value {
                MetadataValue::Int(v) => *v as f64,
                MetadataValue::Float(v) if v.is_finite() => *v,
                _ => return Err(MetadataError::NotNumeric(key)),
            };
        }
        Ok(BoundingBox::from(coords))
    }

    pub fn set_bbox(&mut self, bbox: &BoundingBox) {
        for (key, value) in BBOX_KEYS.iter().zip(bbox.to_array()) {
            self.insert(key, value);
        }
    }

    /// Metadata for a single detection in a sampled frame.
    pub fn frame_level(
        video_name: &str,
        frame_id: usize,
        timestamp_ms: i64,
        detection: &Detection,
    ) -> Self {
        let mut meta = Metadata::new()
            .with(KEY_VIDEO_NAME, video_name)
            .with(KEY_DATA_LEVEL, DataLevel::Frame.as_str())
            .with(KEY_FRAME_ID, frame_id as i64)
            .with(KEY_TIMESTAMP_MS, timestamp_ms)
            .with(KEY_SCORE, detection.score);
        meta.set_bbox(&detection.bbox);
        meta
    }

    /// Metadata summarizing one identity track.
    pub fn track_level(video_name: &str, track: &TrackSummary) -> Self {
        let mut meta = Metadata::new()
            .with(KEY_VIDEO_NAME, video_name)
            .with(KEY_DATA_LEVEL, DataLevel::Track.as_str())
            .with(KEY_TRACK_ID, track.track_id as i64)
            .with(KEY_FRAME_ID, track.best_frame as i64)
            .with(KEY_START_TIME_MS, track.time_range_ms[0])
            .with(KEY_END_TIME_MS, track.time_range_ms[1])
            .with(KEY_DURATION, track.duration_ms)
            .with(KEY_SCORE, track.best_score)
            .with(KEY_BEST_SCORE, track.best_score);
        meta.set_bbox(&track.bbox);
        meta
    }
}

/// One persisted entry: id, embedding, and its flat metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

impl StoreRecord {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            embedding,
            metadata,
        }
    }
}

/// `"{file}_{frame}_{face}"`, unique per detection within a collection.
pub fn frame_record_id(video_name: &str, frame_id: usize, face_index: usize) -> String {
    format!("{video_name}_{frame_id}_{face_index}")
}

/// `"{file}_track_{id}"`, unique per track within a collection.
pub fn track_record_id(video_name: &str, track_id: usize) -> String {
    format!("{video_name}_track_{track_id}")
}
