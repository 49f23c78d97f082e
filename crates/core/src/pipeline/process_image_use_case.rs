use std::path::Path;

use crate::detection::domain::face_engine::FaceEngine;
use crate::storage::domain::buffered_writer::BufferedWriter;
use crate::storage::domain::store_record::{frame_record_id, Metadata};
use crate::video::domain::media_reader::MediaReader;

use super::run_report::{ImageFace, ReportBody, ReportMeta, RunMode, RunReport};

/// Ingests one still image. Every face becomes a frame-level record at
/// frame 0, timestamp 0.
pub struct ProcessImageUseCase<'a> {
    reader: Box<dyn MediaReader>,
    engine: &'a mut dyn FaceEngine,
    writer: &'a mut BufferedWriter,
    source_name: Option<String>,
}

impl<'a> ProcessImageUseCase<'a> {
    pub fn new(
        reader: Box<dyn MediaReader>,
        engine: &'a mut dyn FaceEngine,
        writer: &'a mut BufferedWriter,
    ) -> Self {
        Self {
            reader,
            engine,
            writer,
            source_name: None,
        }
    }

    /// Name used for record ids, `video_name` metadata and the report,
    /// instead of the file's base name.
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn execute(&mut self, input: &Path) -> Result<RunReport, Box<dyn std::error::Error>> {
        let metadata = self.reader.open(input)?;
        let frame = self
            .reader
            .frames()
            .next()
            .ok_or("Image reader produced no frame")?;
        self.reader.close();
        let frame = frame?;

        let file_name = self
            .source_name
            .clone()
            .unwrap_or_else(|| metadata.file_name());
        let detections = self.engine.extract(&frame)?;
        let processed_faces = detections.len();

        let mut faces = Vec::with_capacity(detections.len());
        for (face_index, detection) in detections.into_iter().enumerate() {
            faces.push(ImageFace::new(face_index, detection.score, &detection.bbox));
            let meta = Metadata::frame_level(&file_name, 0, 0, &detection);
            self.writer
                .add(frame_record_id(&file_name, 0, face_index), detection.embedding, meta)?;
        }
        self.writer.flush()?;
        log::info!("{file_name}: {processed_faces} faces");

        Ok(RunReport {
            meta: ReportMeta::new(&metadata, RunMode::Image, processed_faces)
                .with_file_name(file_name),
            body: ReportBody::Faces { faces },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::Detection;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::frame::Frame;
    use crate::shared::media_metadata::MediaMetadata;
    use crate::storage::domain::store_record::DataLevel;
    use crate::storage::domain::vector_store::{StoreFilter, VectorStore};
    use crate::storage::infrastructure::flat_file_store::FlatFileStore;
    use std::path::PathBuf;

    struct StubReader {
        frame: Option<Frame>,
    }

    impl MediaReader for StubReader {
        fn open(&mut self, path: &Path) -> Result<MediaMetadata, Box<dyn std::error::Error>> {
            Ok(MediaMetadata {
                width: 8,
                height: 6,
                fps: 0.0,
                total_frames: 1,
                source_path: Some(path.to_path_buf()),
                rotation: 0,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(self.frame.take().into_iter().map(Ok))
        }

        fn close(&mut self) {}
    }

    struct StubEngine {
        faces: Vec<Detection>,
    }

    impl FaceEngine for StubEngine {
        fn extract(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            Ok(self.faces.clone())
        }
    }

    fn reader() -> Box<dyn MediaReader> {
        Box::new(StubReader {
            frame: Some(Frame::new(vec![0; 8 * 6 * 3], 8, 6, 0)),
        })
    }

    fn face(score: f64, embedding: Vec<f32>) -> Detection {
        Detection {
            bbox: BoundingBox::new(0.5, 0.5, 4.123456, 5.0),
            score,
            embedding,
            keypoints: [(0.0, 0.0); 5],
        }
    }

    #[test]
    fn test_stores_each_face_at_frame_zero() {
        let mut engine = StubEngine {
            faces: vec![face(0.95, vec![1.0, 0.0]), face(0.6, vec![0.0, 1.0])],
        };
        let mut writer = BufferedWriter::new(Box::new(FlatFileStore::in_memory("t")), 50);

        let report = ProcessImageUseCase::new(reader(), &mut engine, &mut writer)
            .execute(&PathBuf::from("/photos/group.jpg"))
            .unwrap();

        assert_eq!(report.meta.mode, RunMode::Image);
        assert_eq!(report.meta.resolution, [8, 6]);
        assert_eq!(report.meta.fps, 0.0);
        assert_eq!(report.meta.processed_faces, 2);
        let ReportBody::Faces { faces } = report.body else {
            panic!("expected faces");
        };
        assert_eq!(faces[1].face_id, 1);
        assert_eq!(faces[0].bbox.x2, 4.1235);

        let store = writer.into_inner();
        assert_eq!(store.count(), 2);
        let hits = store.search(&[0.0, 1.0], 1, &StoreFilter::NoFilter).unwrap();
        assert_eq!(hits[0].id, "group.jpg_0_1");
        assert_eq!(hits[0].metadata.data_level(), Some(DataLevel::Frame));
        assert_eq!(hits[0].metadata.get_i64("timestamp_ms"), Some(0));
    }

    #[test]
    fn test_no_faces_is_not_an_error() {
        let mut engine = StubEngine { faces: vec![] };
        let mut writer = BufferedWriter::new(Box::new(FlatFileStore::in_memory("t")), 50);
        let report = ProcessImageUseCase::new(reader(), &mut engine, &mut writer)
            .execute(&PathBuf::from("empty.png"))
            .unwrap();
        assert_eq!(report.meta.processed_faces, 0);
        assert_eq!(writer.count(), 0);
    }

    #[test]
    fn test_reader_without_frame_fails() {
        let mut engine = StubEngine { faces: vec![] };
        let mut writer = BufferedWriter::new(Box::new(FlatFileStore::in_memory("t")), 50);
        let result = ProcessImageUseCase::new(
            Box::new(StubReader { frame: None }),
            &mut engine,
            &mut writer,
        )
        .execute(&PathBuf::from("missing.png"));
        assert!(result.is_err());
    }
}
