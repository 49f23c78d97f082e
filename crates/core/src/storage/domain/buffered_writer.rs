use super::store_record::{Metadata, StoreRecord};
use super::vector_store::{StoreError, VectorStore};

/// Batches record writes to a [`VectorStore`].
///
/// Records accumulate until `batch_size` is reached, then go out in a single
/// `add` call. Callers must [`flush`](Self::flush) at the end of a run or the
/// tail of the buffer is lost.
pub struct BufferedWriter {
    store: Box<dyn VectorStore>,
    buffer: Vec<StoreRecord>,
    batch_size: usize,
}

impl BufferedWriter {
    pub fn new(store: Box<dyn VectorStore>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            buffer: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    pub fn add(
        &mut self,
        id: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Result<(), StoreError> {
        self.buffer.push(StoreRecord::new(id, embedding, metadata));
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes everything pending. The buffer is kept on failure.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        let len = batch.len();
        match self.store.add(batch.clone()) {
            Ok(()) => {
                log::debug!("Flushed {len} records to '{}'", self.store.name());
                Ok(())
            }
            Err(e) => {
                self.buffer = batch;
                Err(e)
            }
        }
    }

    /// Records already persisted in the store; excludes the buffer.
    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn into_inner(self) -> Box<dyn VectorStore> {
        if !self.buffer.is_empty() {
            log::warn!(
                "Dropping {} unflushed records for '{}'",
                self.buffer.len(),
                self.store.name()
            );
        }
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::domain::vector_store::{StoreFilter, StoreHit};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    #[derive(Default)]
    struct RecordingStore {
        writes: Arc<Mutex<Vec<Vec<String>>>>,
        fail: bool,
    }

    impl VectorStore for RecordingStore {
        fn add(&mut self, records: Vec<StoreRecord>) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Write {
                    path: PathBuf::from("stub"),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.writes
                .lock()
                .unwrap()
                .push(records.into_iter().map(|r| r.id).collect());
            Ok(())
        }

        fn search(
            &self,
            _query: &[f32],
            _limit: usize,
            _filter: &StoreFilter,
        ) -> Result<Vec<StoreHit>, StoreError> {
            Ok(Vec::new())
        }

        fn count(&self) -> usize {
            self.writes.lock().unwrap().iter().map(Vec::len).sum()
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn writer(batch_size: usize) -> (BufferedWriter, Arc<Mutex<Vec<Vec<String>>>>) {
        let store = RecordingStore::default();
        let writes = store.writes.clone();
        (BufferedWriter::new(Box::new(store), batch_size), writes)
    }

    // --- Tests ---

    #[test]
    fn test_flushes_exactly_at_threshold() {
        let (mut w, writes) = writer(3);
        w.add("a", vec![1.0], Metadata::new()).unwrap();
        w.add("b", vec![1.0], Metadata::new()).unwrap();
        assert!(writes.lock().unwrap().is_empty());
        w.add("c", vec![1.0], Metadata::new()).unwrap();
        assert_eq!(*writes.lock().unwrap(), vec![vec!["a", "b", "c"]]);
        assert_eq!(w.pending(), 0);
    }

    #[test]
    fn test_five_adds_with_batch_two_makes_three_writes() {
        let (mut w, writes) = writer(2);
        for id in ["r0", "r1", "r2", "r3", "r4"] {
            w.add(id, vec![0.0], Metadata::new()).unwrap();
        }
        w.flush().unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[2], vec!["r4"]);
        assert_eq!(writes.iter().map(Vec::len).sum::<usize>(), 5);
        assert_eq!(w.count(), 5);
    }

    #[test]
    fn test_empty_flush_does_not_write() {
        let (mut w, writes) = writer(2);
        w.flush().unwrap();
        w.add("a", vec![0.0], Metadata::new()).unwrap();
        w.add("b", vec![0.0], Metadata::new()).unwrap();
        w.flush().unwrap();
        assert_eq!(writes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_flush_propagates_and_keeps_buffer() {
        let store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let mut w = BufferedWriter::new(Box::new(store), 10);
        w.add("a", vec![0.0], Metadata::new()).unwrap();
        assert!(w.flush().is_err());
        assert_eq!(w.pending(), 1);
    }

    #[test]
    fn test_failed_auto_flush_surfaces_from_add() {
        let store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let mut w = BufferedWriter::new(Box::new(store), 1);
        assert!(w.add("a", vec![0.0], Metadata::new()).is_err());
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let (w, _) = writer(0);
        assert_eq!(w.batch_size(), 1);
    }
}
