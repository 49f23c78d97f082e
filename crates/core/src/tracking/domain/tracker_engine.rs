/// Online greedy identity tracker keyed on embedding similarity.
///
/// Each detection independently picks the active track whose best embedding
/// is most similar to its own. Above the threshold it joins that track,
/// otherwise it starts a new one. Tracks that go unmatched for more than
/// `miss_tolerance` consecutive sampled frames are finalized and never revived.
///
/// There is no motion model: association is purely by appearance, so a person
/// who leaves and returns within the tolerance keeps their track.
use crate::detection::domain::detection::Detection;
use crate::shared::embedding::cosine_similarity;

use super::track::{Track, TrackSummary};

pub struct TrackerEngine {
    active: Vec<Track>,
    finalized: Vec<Track>,
    similarity_threshold: f64,
    miss_tolerance: u32,
}

impl TrackerEngine {
    pub fn new(similarity_threshold: f64, miss_tolerance: u32) -> Self {
        Self {
            active: Vec::new(),
            finalized: Vec::new(),
            similarity_threshold,
            miss_tolerance,
        }
    }

    /// Folds one sampled frame's detections into the track sets.
    ///
    /// Assignments are decided against the tracks as they stood when the call
    /// began. A track already claimed by an earlier detection in this frame is
    /// still a candidate for later ones, so a duplicated face can update the
    /// same track twice.
    pub fn update(&mut self, detections: &[Detection], frame_id: usize, timestamp_ms: i64) {
        let assignments: Vec<Option<usize>> =
            detections.iter().map(|d| self.best_match(d)).collect();

        let mut matched = vec![false; self.active.len()];
        for (detection, assignment) in detections.iter().zip(assignments) {
            match assignment {
                Some(idx) => {
                    self.active[idx].absorb(detection, frame_id, timestamp_ms);
                    matched[idx] = true;
                }
                None => self
                    .active
                    .push(Track::seed(detection, frame_id, timestamp_ms)),
            }
        }
        // Tracks seeded this frame were not matched, so they age too.
        matched.resize(self.active.len(), false);

        self.age_unmatched(&matched);
    }

    /// Index of the most similar active track, if it clears the threshold.
    fn best_match(&self, detection: &Detection) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, track) in self.active.iter().enumerate() {
            let sim = cosine_similarity(&detection.embedding, &track.best_embedding);
            if best.map_or(true, |(_, best_sim)| sim > best_sim) {
                best = Some((idx, sim));
            }
        }
        best.filter(|(_, sim)| *sim > self.similarity_threshold)
            .map(|(idx, _)| idx)
    }

    /// Walks the active list from the back, so tracks finalized in the same
    /// frame land in `finalized` in descending index order.
    fn age_unmatched(&mut self, matched: &[bool]) {
        for idx in (0..self.active.len()).rev() {
            if matched[idx] {
                continue;
            }
            self.active[idx].miss_count += 1;
            if self.active[idx].miss_count > self.miss_tolerance {
                let track = self.active.remove(idx);
                log::debug!(
                    "Finalizing track spanning frames {}-{}",
                    track.start_frame,
                    track.end_frame
                );
                self.finalized.push(track);
            }
        }
    }

    pub fn active(&self) -> &[Track] {
        &self.active
    }

    pub fn finalized(&self) -> &[Track] {
        &self.finalized
    }

    /// All tracks in report order: finalized first, then still-active.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.finalized.iter().chain(self.active.iter())
    }

    pub fn len(&self) -> usize {
        self.finalized.len() + self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialized summaries indexed in report order. Does not mutate state.
    pub fn get_results(&self) -> Vec<TrackSummary> {
        self.tracks()
            .enumerate()
            .map(|(idx, track)| track.summary(idx))
            .collect()
    }
}
