use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;
use crate::storage::domain::store_record::DataLevel;
use crate::storage::domain::vector_store::StoreFilter;

/// Which records a search should consider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelFilter {
    /// Both frame- and track-level records.
    #[default]
    Auto,
    Frame,
    Track,
}

impl LevelFilter {
    pub fn to_filter(self) -> StoreFilter {
        match self {
            LevelFilter::Auto => StoreFilter::NoFilter,
            LevelFilter::Frame => StoreFilter::ByDataLevel(DataLevel::Frame),
            LevelFilter::Track => StoreFilter::ByDataLevel(DataLevel::Track),
        }
    }
}

impl std::str::FromStr for LevelFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(LevelFilter::Auto),
            "frame" => Ok(LevelFilter::Frame),
            "track" => Ok(LevelFilter::Track),
            other => Err(format!("unknown level '{other}' (expected auto, frame or track)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Image,
    Video,
}

/// When in the source the match appears.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TimeInfo {
    /// A track's span.
    Range {
        start_ms: i64,
        end_ms: i64,
        duration_ms: i64,
        display: String,
    },
    /// A single video frame.
    Point { timestamp_ms: i64, display: String },
    Static { display: String },
}

impl TimeInfo {
    pub fn range(start_ms: i64, end_ms: i64, duration_ms: i64) -> Self {
        TimeInfo::Range {
            start_ms,
            end_ms,
            duration_ms,
            display: format!("{start_ms}ms ~ {end_ms}ms"),
        }
    }

    pub fn point(timestamp_ms: i64) -> Self {
        TimeInfo::Point {
            timestamp_ms,
            display: format!("{timestamp_ms} ms"),
        }
    }

    pub fn still() -> Self {
        TimeInfo::Static {
            display: "Static Image".to_string(),
        }
    }

    pub fn display(&self) -> &str {
        match self {
            TimeInfo::Range { display, .. }
            | TimeInfo::Point { display, .. }
            | TimeInfo::Static { display } => display,
        }
    }
}

/// A store hit reshaped for people reading search output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    /// `1 / (1 + distance)`, four decimals.
    pub score: f64,
    pub distance: f64,
    pub file_name: String,
    pub source_type: SourceKind,
    pub time_info: TimeInfo,
    /// Detection confidence recorded at ingest.
    pub score_in_db: Option<f64>,
    pub data_level: Option<DataLevel>,
    pub frame_id: Option<i64>,
    pub bbox: BoundingBox,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LevelFilter::Auto, StoreFilter::NoFilter)]
    #[case(LevelFilter::Frame, StoreFilter::ByDataLevel(DataLevel::Frame))]
    #[case(LevelFilter::Track, StoreFilter::ByDataLevel(DataLevel::Track))]
    fn test_level_to_filter(#[case] level: LevelFilter, #[case] expected: StoreFilter) {
        assert_eq!(level.to_filter(), expected);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("TRACK".parse::<LevelFilter>(), Ok(LevelFilter::Track));
        assert!("scene".parse::<LevelFilter>().is_err());
    }

    #[test]
    fn test_time_info_displays() {
        assert_eq!(TimeInfo::range(100, 900, 800).display(), "100ms ~ 900ms");
        assert_eq!(TimeInfo::point(1234).display(), "1234 ms");
        assert_eq!(TimeInfo::still().display(), "Static Image");
    }

    #[test]
    fn test_time_info_json_is_tagged_by_mode() {
        let json = serde_json::to_value(TimeInfo::point(40)).unwrap();
        assert_eq!(json["mode"], "point");
        assert_eq!(json["timestamp_ms"], 40);
        let json = serde_json::to_value(TimeInfo::still()).unwrap();
        assert_eq!(json["mode"], "static");
    }
}
