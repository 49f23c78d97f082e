//! Exact brute-force vector store persisted as one JSON file per collection.
//!
//! Every search scans all records, so results are exact. On disk a collection
//! is a snapshot (`<name>.json`) plus a journal (`<name>.log`, one JSON record
//! per line). `add` appends the batch to the journal; once the journal holds
//! more records than the snapshot, both are folded into a new snapshot
//! written through a temp file and rename. Ingest I/O stays linear in the
//! number of records written.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::embedding::l2_distance;
use crate::storage::domain::store_record::StoreRecord;
use crate::storage::domain::vector_store::{
    StoreError, StoreFilter, StoreHit, StoreProvider, VectorStore,
};

#[derive(Serialize, Deserialize)]
struct CollectionFile {
    name: String,
    dimension: Option<usize>,
    records: Vec<StoreRecord>,
}

pub struct FlatFileStore {
    name: String,
    /// `None` keeps the collection in memory only.
    path: Option<PathBuf>,
    dimension: Option<usize>,
    records: Vec<StoreRecord>,
    positions: HashMap<String, usize>,
    /// Records in the snapshot as of the last compaction.
    snapshot_len: usize,
    /// Records appended to the journal since then.
    journal_len: usize,
}

impl FlatFileStore {
    /// Loads the collection at `path` and replays its journal, or starts an
    /// empty one if neither exists.
    ///
    /// A journal whose last line was cut short by a crash is truncated back
    /// to its last complete record.
    pub fn open(path: &Path, name: &str) -> Result<Self, StoreError> {
        let mut store = Self::in_memory(name);
        store.path = Some(path.to_path_buf());

        if path.exists() {
            let json = fs::read_to_string(path).map_err(|e| StoreError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
            let file: CollectionFile =
                serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            store.dimension = file.dimension;
            store.records = file.records;
            store.snapshot_len = store.records.len();
            store.reindex();
        }

        let journal = journal_path(path);
        if journal.exists() {
            store.replay(&journal)?;
        }

        log::debug!(
            "Opened collection '{}' with {} records ({} journaled)",
            name,
            store.records.len(),
            store.journal_len
        );
        Ok(store)
    }

    pub fn in_memory(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            dimension: None,
            records: Vec::new(),
            positions: HashMap::new(),
            snapshot_len: 0,
            journal_len: 0,
        }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn records(&self) -> &[StoreRecord] {
        &self.records
    }

    fn reindex(&mut self) {
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
    }

    fn upsert(&mut self, record: StoreRecord) {
        match self.positions.get(&record.id) {
            Some(&i) => self.records[i] = record,
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn replay(&mut self, journal: &Path) -> Result<(), StoreError> {
        let text = fs::read_to_string(journal).map_err(|e| StoreError::Read {
            path: journal.to_path_buf(),
            source: e,
        })?;

        let mut complete = 0;
        for line in text.split_inclusive('\n') {
            if !line.ends_with('\n') {
                log::warn!(
                    "Dropping incomplete record at the end of {}",
                    journal.display()
                );
                truncate(journal, complete as u64).map_err(|e| StoreError::Write {
                    path: journal.to_path_buf(),
                    source: e,
                })?;
                break;
            }
            complete += line.len();
            if line.trim().is_empty() {
                continue;
            }
            let record: StoreRecord =
                serde_json::from_str(line).map_err(|e| StoreError::Corrupt {
                    path: journal.to_path_buf(),
                    source: e,
                })?;
            self.dimension.get_or_insert(record.embedding.len());
            self.upsert(record);
            self.journal_len += 1;
        }
        Ok(())
    }

    fn check_dimension(&self, expected: Option<usize>, actual: usize) -> Result<(), StoreError> {
        match expected {
            Some(expected) if expected != actual => Err(StoreError::Dimension { expected, actual }),
            _ => Ok(()),
        }
    }

    fn append(&self, path: &Path, batch: &[StoreRecord]) -> Result<(), StoreError> {
        let journal = journal_path(path);
        let mut lines = Vec::new();
        for record in batch {
            serde_json::to_writer(&mut lines, record).map_err(|e| StoreError::Corrupt {
                path: journal.clone(),
                source: e,
            })?;
            lines.push(b'\n');
        }
        append_synced(&journal, &lines).map_err(|e| StoreError::Write {
            path: journal,
            source: e,
        })
    }

    /// Folds the journal into a fresh snapshot, then drops the journal.
    fn compact(&mut self, path: &Path) -> Result<(), StoreError> {
        let file = CollectionFile {
            name: self.name.clone(),
            dimension: self.dimension,
            records: self.records.clone(),
        };
        let json = serde_json::to_vec(&file).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            source: e,
        })?;
        write_atomic(path, &json).map_err(|e| StoreError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

        let journal = journal_path(path);
        if journal.exists() {
            fs::remove_file(&journal).map_err(|e| StoreError::Write {
                path: journal,
                source: e,
            })?;
        }
        log::debug!(
            "Compacted collection '{}' to {} records",
            self.name,
            self.records.len()
        );
        self.snapshot_len = self.records.len();
        self.journal_len = 0;
        Ok(())
    }
}

impl VectorStore for FlatFileStore {
    fn add(&mut self, batch: Vec<StoreRecord>) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut dimension = self.dimension;
        for record in &batch {
            self.check_dimension(dimension, record.embedding.len())?;
            dimension.get_or_insert(record.embedding.len());
        }

        if let Some(path) = &self.path {
            self.append(path, &batch)?;
        }
        self.journal_len += batch.len();
        self.dimension = dimension;
        for record in batch {
            self.upsert(record);
        }

        // The batch is already durable in the journal; a failed compaction is
        // retried on the next add.
        if self.journal_len > self.snapshot_len {
            if let Some(path) = self.path.clone() {
                if let Err(e) = self.compact(&path) {
                    log::warn!("Compaction of '{}' failed: {e}", self.name);
                }
            }
        }
        Ok(())
    }

    fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: &StoreFilter,
    ) -> Result<Vec<StoreHit>, StoreError> {
        self.check_dimension(self.dimension, query.len())?;

        let mut scored: Vec<(f64, &StoreRecord)> = self
            .records
            .iter()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| (l2_distance(query, &r.embedding), r))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(distance, r)| StoreHit {
                id: r.id.clone(),
                distance,
                metadata: r.metadata.clone(),
            })
            .collect())
    }

    fn count(&self) -> usize {
        self.records.len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn journal_path(path: &Path) -> PathBuf {
    path.with_extension("log")
}

fn append_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(data)?;
    file.sync_data()
}

fn truncate(path: &Path, len: u64) -> std::io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)
}

/// Opens collections as `<root>/<name>.json` plus `<root>/<name>.log`.
pub struct FlatFileStoreProvider {
    root: PathBuf,
}

impl FlatFileStoreProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl StoreProvider for FlatFileStoreProvider {
    fn open(&self, collection: &str) -> Result<Box<dyn VectorStore>, StoreError> {
        validate_collection_name(collection)?;
        let path = self.root.join(format!("{collection}.json"));
        Ok(Box::new(FlatFileStore::open(&path, collection)?))
    }
}

fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::domain::store_record::{DataLevel, Metadata};
    use approx::assert_relative_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn record(id: &str, embedding: Vec<f32>, level: &str, video: &str) -> StoreRecord {
        StoreRecord::new(
            id,
            embedding,
            Metadata::new()
                .with("data_level", level)
                .with("video_name", video),
        )
    }

    fn seeded() -> FlatFileStore {
        let mut store = FlatFileStore::in_memory("test");
        store
            .add(vec![
                record("far", vec![0.0, 1.0], "frame", "a.mp4"),
                record("near", vec![1.0, 0.0], "track", "a.mp4"),
                record("mid", vec![0.6, 0.8], "frame", "b.jpg"),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_search_ranks_by_ascending_distance() {
        let hits = seeded().search(&[1.0, 0.0], 10, &StoreFilter::NoFilter).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert_relative_eq!(hits[0].distance, 0.0);
        assert_relative_eq!(hits[2].distance, 2f64.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_search_respects_limit() {
        let hits = seeded().search(&[1.0, 0.0], 2, &StoreFilter::NoFilter).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[rstest]
    #[case(StoreFilter::ByDataLevel(DataLevel::Frame), vec!["mid", "far"])]
    #[case(StoreFilter::ByDataLevel(DataLevel::Track), vec!["near"])]
    #[case(StoreFilter::ByVideoName("b.jpg".into()), vec!["mid"])]
    fn test_search_applies_filter(#[case] filter: StoreFilter, #[case] expected: Vec<&str>) {
        let hits = seeded().search(&[1.0, 0.0], 10, &filter).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_empty_store_returns_no_hits() {
        let store = FlatFileStore::in_memory("empty");
        assert!(store.search(&[1.0], 5, &StoreFilter::NoFilter).unwrap().is_empty());
    }

    #[test]
    fn test_id_collision_overwrites() {
        let mut store = seeded();
        store
            .add(vec![record("far", vec![1.0, 0.0], "frame", "c.mp4")])
            .unwrap();
        assert_eq!(store.count(), 3);
        let hits = store.search(&[1.0, 0.0], 1, &StoreFilter::ByVideoName("c.mp4".into())).unwrap();
        assert_eq!(hits[0].id, "far");
    }

    #[test]
    fn test_dimension_mismatch_rejected_without_partial_write() {
        let mut store = seeded();
        let result = store.add(vec![
            record("ok", vec![1.0, 0.0], "frame", "a.mp4"),
            record("bad", vec![1.0, 0.0, 0.0], "frame", "a.mp4"),
        ]);
        assert!(matches!(
            result,
            Err(StoreError::Dimension { expected: 2, actual: 3 })
        ));
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn test_query_dimension_mismatch_is_error() {
        assert!(seeded().search(&[1.0], 1, &StoreFilter::NoFilter).is_err());
    }

    #[test]
    fn test_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db").join("proj.json");
        {
            let mut store = FlatFileStore::open(&path, "proj").unwrap();
            store.add(vec![record("x", vec![1.0, 0.0], "track", "a.mp4")]).unwrap();
        }
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let store = FlatFileStore::open(&path, "proj").unwrap();
        assert_eq!(store.count(), 1);
        assert_eq!(store.dimension(), Some(2));
        assert_eq!(store.records()[0].metadata.data_level(), Some(DataLevel::Track));
    }

    fn snapshot_ids(path: &Path) -> Vec<String> {
        let file: CollectionFile =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        file.records.into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_small_batch_is_appended_without_rewriting_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proj.json");
        let mut store = FlatFileStore::open(&path, "proj").unwrap();
        store
            .add(vec![
                record("a", vec![1.0, 0.0], "frame", "a.mp4"),
                record("b", vec![0.0, 1.0], "frame", "a.mp4"),
            ])
            .unwrap();
        let snapshot = fs::read(&path).unwrap();

        store.add(vec![record("c", vec![0.6, 0.8], "frame", "b.mp4")]).unwrap();

        assert_eq!(fs::read(&path).unwrap(), snapshot);
        let journal = fs::read_to_string(journal_path(&path)).unwrap();
        assert_eq!(journal.lines().count(), 1);
        assert_eq!(FlatFileStore::open(&path, "proj").unwrap().count(), 3);
    }

    #[test]
    fn test_journal_is_compacted_once_larger_than_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proj.json");
        let mut store = FlatFileStore::open(&path, "proj").unwrap();
        store.add(vec![record("a", vec![1.0, 0.0], "frame", "a.mp4")]).unwrap();
        assert_eq!(snapshot_ids(&path), vec!["a"]);

        store.add(vec![record("b", vec![0.0, 1.0], "frame", "a.mp4")]).unwrap();
        assert!(journal_path(&path).exists());

        store.add(vec![record("c", vec![0.6, 0.8], "frame", "a.mp4")]).unwrap();
        assert!(!journal_path(&path).exists());
        assert_eq!(snapshot_ids(&path), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_journal_overwrite_wins_on_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proj.json");
        {
            let mut store = FlatFileStore::open(&path, "proj").unwrap();
            store
                .add(vec![
                    record("a", vec![1.0, 0.0], "frame", "old.mp4"),
                    record("b", vec![0.0, 1.0], "frame", "old.mp4"),
                ])
                .unwrap();
            store.add(vec![record("a", vec![1.0, 0.0], "frame", "new.mp4")]).unwrap();
        }

        let store = FlatFileStore::open(&path, "proj").unwrap();
        assert_eq!(store.count(), 2);
        assert_eq!(store.records()[0].metadata.get_str("video_name"), Some("new.mp4"));
    }

    #[test]
    fn test_incomplete_journal_tail_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proj.json");
        {
            let mut store = FlatFileStore::open(&path, "proj").unwrap();
            store
                .add(vec![
                    record("a", vec![1.0, 0.0], "frame", "a.mp4"),
                    record("b", vec![0.0, 1.0], "frame", "a.mp4"),
                ])
                .unwrap();
            store.add(vec![record("c", vec![0.6, 0.8], "frame", "a.mp4")]).unwrap();
        }
        let mut journal = OpenOptions::new().append(true).open(journal_path(&path)).unwrap();
        journal.write_all(b"{\"id\":\"d\",\"embe").unwrap();
        drop(journal);

        let mut store = FlatFileStore::open(&path, "proj").unwrap();
        assert_eq!(store.count(), 3);
        store.add(vec![record("e", vec![1.0, 0.0], "frame", "a.mp4")]).unwrap();
        assert_eq!(FlatFileStore::open(&path, "proj").unwrap().count(), 4);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FlatFileStore::open(&path, "bad"),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_provider_isolates_collections() {
        let dir = TempDir::new().unwrap();
        let provider = FlatFileStoreProvider::new(dir.path());
        let mut a = provider.open("alpha").unwrap();
        a.add(vec![record("x", vec![1.0], "frame", "a.mp4")]).unwrap();

        assert_eq!(provider.open("alpha").unwrap().count(), 1);
        assert_eq!(provider.open("beta").unwrap().count(), 0);
        assert_eq!(a.name(), "alpha");
    }

    #[rstest]
    #[case("")]
    #[case("../escape")]
    #[case(".hidden")]
    #[case("a/b")]
    fn test_provider_rejects_bad_names(#[case] name: &str) {
        let dir = TempDir::new().unwrap();
        let provider = FlatFileStoreProvider::new(dir.path());
        assert!(matches!(
            provider.open(name),
            Err(StoreError::InvalidCollection(_))
        ));
    }
}
