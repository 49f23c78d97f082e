use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::SearchConfig;
use crate::detection::domain::face_engine::FaceEngine;
use crate::shared::frame::Frame;
use crate::storage::domain::vector_store::{StoreError, StoreFilter, StoreProvider};

use super::domain::search_normalizer::normalize;
use super::domain::search_result::{LevelFilter, SearchResult};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("invalid search request: {0}")]
    InvalidRequest(String),
    #[error("failed to decode query image: {0}")]
    Image(#[from] image::ImageError),
    #[error("face engine failed: {0}")]
    Engine(#[source] Box<dyn std::error::Error>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Query image, resolved to pixels once at the boundary.
#[derive(Clone, Debug)]
pub enum ImageInput {
    Path(PathBuf),
    Decoded(Frame),
}

impl ImageInput {
    /// Decodes an in-memory encoded image (JPEG, PNG, ...).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let image = image::load_from_memory(bytes)?;
        Ok(ImageInput::Decoded(Frame::from_rgb_image(image.to_rgb8(), 0)))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        ImageInput::Path(path.as_ref().to_path_buf())
    }

    fn load(&self) -> Result<Frame, image::ImageError> {
        match self {
            ImageInput::Path(path) => {
                let image = image::open(path)?;
                Ok(Frame::from_rgb_image(image.to_rgb8(), 0))
            }
            ImageInput::Decoded(frame) => Ok(frame.clone()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SearchRequest {
    pub image: ImageInput,
    pub limit: usize,
    pub level: LevelFilter,
    pub score_threshold: f64,
    /// Collection to search; the service default when `None`.
    pub project: Option<String>,
    /// Restrict hits to one source file name.
    pub source: Option<String>,
}

impl SearchRequest {
    pub fn new(image: ImageInput, config: &SearchConfig) -> Self {
        Self {
            image,
            limit: config.limit,
            level: config.level,
            score_threshold: config.score_threshold,
            project: None,
            source: None,
        }
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.limit == 0 {
            return Err(SearchError::InvalidRequest("limit must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(SearchError::InvalidRequest(format!(
                "score threshold must be in [0, 1], got {}",
                self.score_threshold
            )));
        }
        if self.source.is_some() && self.level != LevelFilter::Auto {
            return Err(SearchError::InvalidRequest(
                "a source restriction cannot be combined with a level filter".into(),
            ));
        }
        Ok(())
    }

    fn filter(&self) -> StoreFilter {
        match &self.source {
            Some(name) => StoreFilter::ByVideoName(name.clone()),
            None => self.level.to_filter(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Success,
    NoFace,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResponse {
    pub status: SearchStatus,
    pub count: usize,
    pub results: Vec<SearchResult>,
}

impl SearchResponse {
    fn no_face() -> Self {
        Self {
            status: SearchStatus::NoFace,
            count: 0,
            results: Vec::new(),
        }
    }
}

/// Answers "where else does this face appear?" against a project collection.
///
/// Built once per process and shared by reference; it is not internally
/// synchronized.
pub struct SearchService {
    engine: Box<dyn FaceEngine>,
    provider: Box<dyn StoreProvider>,
    default_project: String,
}

impl SearchService {
    pub fn new(
        engine: Box<dyn FaceEngine>,
        provider: Box<dyn StoreProvider>,
        default_project: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            provider,
            default_project: default_project.into(),
        }
    }

    /// Embeds the first face in the query image and ranks stored matches.
    pub fn search(&mut self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        request.validate()?;

        let frame = request.image.load()?;
        let detections = self.engine.extract(&frame).map_err(SearchError::Engine)?;
        let Some(query) = detections.first() else {
            log::info!("No face found in query image");
            return Ok(SearchResponse::no_face());
        };

        let project = request.project.as_deref().unwrap_or(&self.default_project);
        let store = self.provider.open(project)?;
        let hits = store.search(&query.embedding, request.limit, &request.filter())?;
        let raw = hits.len();
        let results = normalize(hits, request.score_threshold);
        log::debug!(
            "Search in '{project}': {raw} hits, {} above threshold",
            results.len()
        );

        Ok(SearchResponse {
            status: SearchStatus::Success,
            count: results.len(),
            results,
        })
    }

    pub fn count(&self, project: Option<&str>) -> Result<usize, SearchError> {
        let project = project.unwrap_or(&self.default_project);
        Ok(self.provider.open(project)?.count())
    }
}
