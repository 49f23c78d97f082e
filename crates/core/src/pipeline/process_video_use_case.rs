use std::path::Path;
use std::time::Instant;

use crate::config::Config;
use crate::detection::domain::face_engine::FaceEngine;
use crate::shared::constants::REPORT_DECIMALS;
use crate::shared::embedding::round_to;
use crate::shared::media_metadata::MediaMetadata;
use crate::storage::domain::buffered_writer::BufferedWriter;
use crate::storage::domain::store_record::{
    frame_record_id, track_record_id, DataLevel, Metadata,
};
use crate::tracking::domain::tracker_engine::TrackerEngine;
use crate::video::domain::media_reader::MediaReader;

use super::pipeline_logger::PipelineLogger;
use super::run_report::{FrameDetection, ReportBody, ReportMeta, RunMode, RunReport};

/// Returns `false` to abandon the run. Arguments: `(frames_read, total_frames)`.
pub type ProgressCallback = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Knobs shared by every ingest run.
#[derive(Clone, Debug, PartialEq)]
pub struct IngestSettings {
    pub stride: usize,
    pub similarity_threshold: f64,
    pub miss_tolerance: u32,
    pub save_mode: DataLevel,
    pub batch_size: usize,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stride: config.video.stride,
            similarity_threshold: config.video.similarity_threshold,
            miss_tolerance: config.video.miss_tolerance,
            save_mode: config.run_mode.save_mode,
            batch_size: config.storage.batch_size,
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Ingests one video: samples every `stride`-th frame, extracts faces and
/// either stores each detection (frame mode) or folds them into tracks and
/// stores one record per track when the stream ends (track mode).
///
/// The writer is flushed before the report is built, so `total_faces` in a
/// frame-mode report counts everything persisted in the collection.
pub struct ProcessVideoUseCase<'a> {
    reader: Box<dyn MediaReader>,
    engine: &'a mut dyn FaceEngine,
    writer: &'a mut BufferedWriter,
    settings: IngestSettings,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<ProgressCallback>,
    source_name: Option<String>,
}

impl<'a> ProcessVideoUseCase<'a> {
    pub fn new(
        reader: Box<dyn MediaReader>,
        engine: &'a mut dyn FaceEngine,
        writer: &'a mut BufferedWriter,
        settings: IngestSettings,
        logger: Box<dyn PipelineLogger>,
        on_progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            reader,
            engine,
            writer,
            settings,
            logger,
            on_progress,
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
        let result = self.run(&metadata);
        self.reader.close();
        let report = result?;
        self.logger.summary();
        Ok(report)
    }

    fn run(&mut self, metadata: &MediaMetadata) -> Result<RunReport, Box<dyn std::error::Error>> {
        let video_name = self
            .source_name
            .clone()
            .unwrap_or_else(|| metadata.file_name());
        let stride = self.settings.stride.max(1);
        let mode = self.settings.save_mode;
        let total = metadata.total_frames;
        self.logger.info(&format!(
            "Ingesting {video_name} in {} mode (stride {stride})",
            mode.as_str()
        ));

        let mut tracker =
            TrackerEngine::new(self.settings.similarity_threshold, self.settings.miss_tolerance);
        let mut detections = Vec::new();
        let mut processed_faces = 0;

        for (read, frame) in self.reader.frames().enumerate() {
            let frame = frame?;
            let frames_read = read + 1;
            self.logger.progress(frames_read, total);

            if frame.index() % stride == 0 {
                let frame_id = frame.index();
                let timestamp_ms = metadata.timestamp_ms(frame_id);

                let start = Instant::now();
                let faces = self.engine.extract(&frame)?;
                self.logger
                    .timing("extract", start.elapsed().as_secs_f64() * 1000.0);
                self.logger.metric("faces", faces.len() as f64);
                processed_faces += faces.len();

                match mode {
                    DataLevel::Frame => {
                        let start = Instant::now();
                        for (face_index, face) in faces.into_iter().enumerate() {
                            let id = frame_record_id(&video_name, frame_id, face_index);
                            let meta = Metadata::frame_level(&video_name, frame_id, timestamp_ms, &face);
                            detections.push(FrameDetection {
                                id: id.clone(),
                                frame_id,
                                timestamp_ms,
                                score: round_to(face.score, REPORT_DECIMALS),
                                bbox: face.bbox.rounded(REPORT_DECIMALS),
                            });
                            self.writer.add(id, face.embedding, meta)?;
                        }
                        self.logger
                            .timing("store", start.elapsed().as_secs_f64() * 1000.0);
                    }
                    DataLevel::Track => tracker.update(&faces, frame_id, timestamp_ms),
                }
            }

            if let Some(callback) = &self.on_progress {
                if !callback(frames_read, total) {
                    return Err("Cancelled".into());
                }
            }
        }

        let body = match mode {
            DataLevel::Frame => {
                self.writer.flush()?;
                ReportBody::Detections {
                    detections,
                    total_faces: self.writer.count(),
                }
            }
            DataLevel::Track => {
                let summaries = tracker.get_results();
                for (track, summary) in tracker.tracks().zip(&summaries) {
                    self.writer.add(
                        track_record_id(&video_name, summary.track_id),
                        track.best_embedding.clone(),
                        Metadata::track_level(&video_name, summary),
                    )?;
                }
                self.writer.flush()?;
                log::info!("{video_name}: {} tracks from {processed_faces} faces", summaries.len());
                ReportBody::Tracks { tracks: summaries }
            }
        };

        let run_mode = match mode {
            DataLevel::Frame => RunMode::Frame,
            DataLevel::Track => RunMode::Track,
        };
        Ok(RunReport {
            meta: ReportMeta::new(metadata, run_mode, processed_faces).with_file_name(video_name),
            body,
        })
    }
}
