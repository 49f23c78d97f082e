//! Run configuration loaded from a JSON file.
//!
//! Every section has defaults, so a config file only needs the fields it
//! changes. Loading or validation failures are fatal: callers must check the
//! config before building engines or opening stores.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::domain::search_result::LevelFilter;
use crate::shared::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_MISS_TOLERANCE, DEFAULT_PROJECT, DEFAULT_SCORE_THRESHOLD,
    DEFAULT_SEARCH_LIMIT, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_STRIDE, EMBEDDING_MODEL_NAME,
    EMBEDDING_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use crate::shared::model_resolver::ModelSpec;
use crate::storage::domain::store_record::DataLevel;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub project: ProjectConfig,
    pub video: VideoConfig,
    pub run_mode: RunModeConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub detector_name: String,
    pub detector_url: String,
    pub embedding_name: String,
    pub embedding_url: String,
    /// Directory checked for pre-packaged models before downloading.
    pub model_dir: Option<PathBuf>,
    pub confidence: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_name: YOLO_MODEL_NAME.to_string(),
            detector_url: YOLO_MODEL_URL.to_string(),
            embedding_name: EMBEDDING_MODEL_NAME.to_string(),
            embedding_url: EMBEDDING_MODEL_URL.to_string(),
            model_dir: None,
            confidence: 0.5,
        }
    }
}

impl ModelConfig {
    pub fn detector(&self) -> ModelSpec {
        ModelSpec::new(&self.detector_name, &self.detector_url)
    }

    pub fn embedding(&self) -> ModelSpec {
        ModelSpec::new(&self.embedding_name, &self.embedding_url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub output_root: PathBuf,
    pub vector_db_path: PathBuf,
    pub default_project: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("output"),
            vector_db_path: PathBuf::from("store/vector_db"),
            default_project: DEFAULT_PROJECT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub stride: usize,
    pub similarity_threshold: f64,
    pub miss_tolerance: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            stride: DEFAULT_STRIDE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            miss_tolerance: DEFAULT_MISS_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunModeConfig {
    /// `frame` stores every detection; `track` stores one record per identity.
    pub save_mode: DataLevel,
}

impl Default for RunModeConfig {
    fn default() -> Self {
        Self {
            save_mode: DataLevel::Track,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub batch_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub limit: usize,
    pub level: LevelFilter,
    pub score_threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            level: LevelFilter::Auto,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

impl Config {
    /// Reads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Config = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.video.similarity_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(invalid(
                "video.similarity_threshold",
                format!("must be in (0, 1), got {threshold}"),
            ));
        }
        if self.video.stride == 0 {
            return Err(invalid("video.stride", "must be at least 1".to_string()));
        }
        if self.storage.batch_size == 0 {
            return Err(invalid("storage.batch_size", "must be at least 1".to_string()));
        }
        if self.search.limit == 0 {
            return Err(invalid("search.limit", "must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.search.score_threshold) {
            return Err(invalid(
                "search.score_threshold",
                format!("must be in [0, 1], got {}", self.search.score_threshold),
            ));
        }
        if !(0.0..=1.0).contains(&self.model.confidence) {
            return Err(invalid(
                "model.confidence",
                format!("must be in [0, 1], got {}", self.model.confidence),
            ));
        }
        if self.project.default_project.trim().is_empty() {
            return Err(invalid("project.default_project", "must not be empty".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
