use crate::shared::constants::REPORT_DECIMALS;
use crate::shared::embedding::round_to;
use crate::shared::media_metadata::is_video_name;
use crate::storage::domain::store_record::{
    Metadata, KEY_BEST_SCORE, KEY_DURATION, KEY_END_TIME_MS, KEY_FRAME_ID, KEY_SCORE,
    KEY_START_TIME_MS, KEY_TIMESTAMP_MS, KEY_VIDEO_NAME,
};
use crate::storage::domain::vector_store::StoreHit;

use super::search_result::{SearchResult, SourceKind, TimeInfo};

/// Maps an L2 distance onto (0, 1]; strictly decreasing in distance.
pub fn distance_to_score(distance: f64) -> f64 {
    round_to(1.0 / (1.0 + distance), REPORT_DECIMALS)
}

/// Converts ranked store hits into search results, dropping those scoring
/// below `score_threshold`. Store order is kept.
pub fn normalize(hits: Vec<StoreHit>, score_threshold: f64) -> Vec<SearchResult> {
    hits.into_iter()
        .filter_map(|hit| {
            let score = distance_to_score(hit.distance);
            if score < score_threshold {
                return None;
            }
            to_result(hit, score)
        })
        .collect()
}

fn to_result(hit: StoreHit, score: f64) -> Option<SearchResult> {
    let meta = &hit.metadata;
    let bbox = match meta.bbox() {
        Ok(bbox) => bbox,
        Err(e) => {
            log::warn!("Skipping record {}: {e}", hit.id);
            return None;
        }
    };

    let file_name = meta.get_str(KEY_VIDEO_NAME).unwrap_or("unknown").to_string();
    let is_video = is_video_name(&file_name);

    Some(SearchResult {
        score,
        distance: hit.distance,
        source_type: if is_video {
            SourceKind::Video
        } else {
            SourceKind::Image
        },
        time_info: time_info(meta, is_video),
        score_in_db: meta.get_f64(KEY_BEST_SCORE).or_else(|| meta.get_f64(KEY_SCORE)),
        data_level: meta.data_level(),
        frame_id: meta.get_i64(KEY_FRAME_ID),
        bbox,
        file_name,
        id: hit.id,
    })
}

fn time_info(meta: &Metadata, is_video: bool) -> TimeInfo {
    if let Some(start) = meta.get_i64(KEY_START_TIME_MS) {
        let end = meta.get_i64(KEY_END_TIME_MS).unwrap_or(start);
        let duration = meta.get_i64(KEY_DURATION).unwrap_or(end - start);
        TimeInfo::range(start, end, duration)
    } else if is_video {
        TimeInfo::point(meta.get_i64(KEY_TIMESTAMP_MS).unwrap_or(0))
    } else {
        TimeInfo::still()
    }
}
