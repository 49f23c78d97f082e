use std::path::PathBuf;

use thiserror::Error;

use super::store_record::{DataLevel, Metadata, StoreRecord, KEY_VIDEO_NAME};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("failed to read store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt store {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid collection name '{0}'")]
    InvalidCollection(String),
}

/// Restriction applied to candidate records before ranking.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum StoreFilter {
    #[default]
    NoFilter,
    ByDataLevel(DataLevel),
    ByVideoName(String),
}

impl StoreFilter {
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            StoreFilter::NoFilter => true,
            StoreFilter::ByDataLevel(level) => metadata.data_level() == Some(*level),
            StoreFilter::ByVideoName(name) => metadata.get_str(KEY_VIDEO_NAME) == Some(name),
        }
    }
}

/// One ranked search hit.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreHit {
    pub id: String,
    /// Euclidean distance to the query; smaller is closer.
    pub distance: f64,
    pub metadata: Metadata,
}

/// A single named collection of embeddings with flat metadata.
///
/// Distances are always L2. Adding a record whose id already exists replaces
/// the earlier one.
pub trait VectorStore: Send {
    /// Persists a batch. Returns only once the batch is durable.
    fn add(&mut self, records: Vec<StoreRecord>) -> Result<(), StoreError>;

    /// Up to `limit` hits passing `filter`, closest first.
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: &StoreFilter,
    ) -> Result<Vec<StoreHit>, StoreError>;

    fn count(&self) -> usize;

    fn name(&self) -> &str;
}

/// Opens collections by project name.
pub trait StoreProvider: Send {
    fn open(&self, collection: &str) -> Result<Box<dyn VectorStore>, StoreError>;
}
