use serde::{Deserialize, Serialize};

use crate::detection::domain::detection::Detection;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::REPORT_DECIMALS;
use crate::shared::embedding::round_to;

/// One identity's temporal span and best-observed appearance.
///
/// The `best_*` fields always describe the same detection: the highest-scoring
/// one ever assigned to this track.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub start_frame: usize,
    pub end_frame: usize,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub best_score: f64,
    pub best_embedding: Vec<f32>,
    pub best_bbox: BoundingBox,
    pub best_frame: usize,
    /// Consecutive sampled frames without a match.
    pub miss_count: u32,
}

impl Track {
    pub(crate) fn seed(detection: &Detection, frame_id: usize, timestamp_ms: i64) -> Self {
        Self {
            start_frame: frame_id,
            end_frame: frame_id,
            start_time_ms: timestamp_ms,
            end_time_ms: timestamp_ms,
            best_score: detection.score,
            best_embedding: detection.embedding.clone(),
            best_bbox: detection.bbox,
            best_frame: frame_id,
            miss_count: 0,
        }
    }

    /// Extends the span to this frame and swaps in the detection if it scores higher.
    pub(crate) fn absorb(&mut self, detection: &Detection, frame_id: usize, timestamp_ms: i64) {
        self.end_frame = frame_id;
        self.end_time_ms = timestamp_ms;
        self.miss_count = 0;
        if detection.score > self.best_score {
            self.best_score = detection.score;
            self.best_embedding.clone_from(&detection.embedding);
            self.best_bbox = detection.bbox;
            self.best_frame = frame_id;
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_time_ms - self.start_time_ms
    }

    pub fn summary(&self, track_id: usize) -> TrackSummary {
        TrackSummary {
            track_id,
            time_range_ms: [self.start_time_ms, self.end_time_ms],
            duration_ms: self.duration_ms(),
            best_score: round_to(self.best_score, REPORT_DECIMALS),
            best_frame: self.best_frame,
            bbox: self.best_bbox.rounded(REPORT_DECIMALS),
        }
    }
}

/// Serialized view of a track as it appears in run reports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub track_id: usize,
    pub time_range_ms: [i64; 2],
    pub duration_ms: i64,
    pub best_score: f64,
    pub best_frame: usize,
    pub bbox: BoundingBox,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(score: f64, embedding: Vec<f32>, x: f64) -> Detection {
        Detection {
            bbox: BoundingBox::new(x, 0.0, x + 10.0, 10.0),
            score,
            embedding,
            keypoints: [(0.0, 0.0); 5],
        }
    }

    #[test]
    fn test_seed_copies_detection() {
        let track = Track::seed(&det(0.8, vec![1.0, 0.0], 5.0), 10, 400);
        assert_eq!((track.start_frame, track.end_frame), (10, 10));
        assert_eq!((track.start_time_ms, track.end_time_ms), (400, 400));
        assert_eq!(track.best_frame, 10);
        assert_eq!(track.best_score, 0.8);
        assert_eq!(track.miss_count, 0);
    }

    #[test]
    fn test_absorb_higher_score_replaces_best() {
        let mut track = Track::seed(&det(0.6, vec![1.0, 0.0], 0.0), 0, 0);
        track.miss_count = 2;
        track.absorb(&det(0.9, vec![0.0, 1.0], 50.0), 5, 200);
        assert_eq!(track.end_frame, 5);
        assert_eq!(track.end_time_ms, 200);
        assert_eq!(track.miss_count, 0);
        assert_eq!(track.best_score, 0.9);
        assert_eq!(track.best_embedding, vec![0.0, 1.0]);
        assert_eq!(track.best_bbox.x1, 50.0);
        assert_eq!(track.best_frame, 5);
    }

    #[test]
    fn test_absorb_lower_score_keeps_best() {
        let mut track = Track::seed(&det(0.9, vec![1.0, 0.0], 0.0), 0, 0);
        track.absorb(&det(0.5, vec![0.0, 1.0], 50.0), 5, 200);
        assert_eq!(track.end_frame, 5);
        assert_eq!(track.best_score, 0.9);
        assert_eq!(track.best_embedding, vec![1.0, 0.0]);
        assert_eq!(track.best_frame, 0);
    }

    #[test]
    fn test_absorb_equal_score_keeps_first() {
        let mut track = Track::seed(&det(0.7, vec![1.0, 0.0], 0.0), 0, 0);
        track.absorb(&det(0.7, vec![0.0, 1.0], 50.0), 3, 100);
        assert_eq!(track.best_frame, 0);
    }

    #[test]
    fn test_summary_rounds_and_computes_duration() {
        let mut track = Track::seed(&det(0.876543, vec![1.0], 1.234567), 2, 100);
        track.absorb(&det(0.1, vec![1.0], 0.0), 8, 350);
        let s = track.summary(4);
        assert_eq!(s.track_id, 4);
        assert_eq!(s.time_range_ms, [100, 350]);
        assert_eq!(s.duration_ms, 250);
        assert_eq!(s.best_score, 0.8765);
        assert_eq!(s.best_frame, 2);
        assert_eq!(s.bbox.x1, 1.2346);
    }
}
