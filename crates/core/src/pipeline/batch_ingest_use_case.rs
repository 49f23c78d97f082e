use std::fs;
use std::path::{Path, PathBuf};

use crate::detection::domain::face_engine::FaceEngine;
use crate::shared::media_metadata::MediaKind;
use crate::storage::domain::buffered_writer::BufferedWriter;
use crate::storage::domain::vector_store::StoreProvider;
use crate::video::domain::media_reader::MediaReader;

use super::pipeline_logger::PipelineLogger;
use super::process_image_use_case::ProcessImageUseCase;
use super::process_video_use_case::{IngestSettings, ProcessVideoUseCase};
use super::run_report::RunReport;

pub type ReaderFactory = Box<dyn Fn(MediaKind) -> Box<dyn MediaReader> + Send>;
pub type LoggerFactory = Box<dyn Fn() -> Box<dyn PipelineLogger> + Send>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Report files written, in task order.
    pub reports: Vec<PathBuf>,
}

/// Collects the media files under `input`.
///
/// A file is returned as-is whatever its extension. A directory is walked
/// recursively and only known video and image extensions are kept, sorted by
/// path.
pub fn scan(input: &Path) -> std::io::Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut tasks = Vec::new();
    walk(input, &mut tasks)?;
    Ok(tasks)
}

/// Name a task is stored and reported under: its path below `input` with `/`
/// separators, so same-named files in different subdirectories stay apart.
/// A single-file input keeps its base name.
pub fn source_name(input: &Path, path: &Path) -> String {
    match path.strip_prefix(input) {
        Ok(relative) if !relative.as_os_str().is_empty() => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        _ => path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned(),
    }
}

fn walk(dir: &Path, tasks: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            walk(&path, tasks)?;
        } else if MediaKind::from_path(&path).is_some() {
            tasks.push(path);
        }
    }
    Ok(())
}

/// Runs the per-file ingest over a file or directory, one engine for the
/// whole batch.
///
/// A file that fails (unreadable media, engine or store error) is logged and
/// counted; the batch moves on to the next one. Reports land in
/// `<output_root>/<project>/`.
pub struct BatchIngestUseCase {
    engine: Box<dyn FaceEngine>,
    provider: Box<dyn StoreProvider>,
    settings: IngestSettings,
    output_root: PathBuf,
    reader_factory: ReaderFactory,
    logger_factory: LoggerFactory,
}

impl BatchIngestUseCase {
    pub fn new(
        engine: Box<dyn FaceEngine>,
        provider: Box<dyn StoreProvider>,
        settings: IngestSettings,
        output_root: PathBuf,
        reader_factory: ReaderFactory,
        logger_factory: LoggerFactory,
    ) -> Self {
        Self {
            engine,
            provider,
            settings,
            output_root,
            reader_factory,
            logger_factory,
        }
    }

    pub fn execute(
        &mut self,
        input: &Path,
        project: &str,
    ) -> Result<BatchSummary, Box<dyn std::error::Error>> {
        if !input.exists() {
            return Err(format!("Input path does not exist: {}", input.display()).into());
        }
        // Rejects bad collection names before any file is touched.
        self.provider.open(project)?;

        let tasks = scan(input)?;
        log::info!(
            "Found {} file(s) to ingest into project '{project}'",
            tasks.len()
        );

        let out_dir = self.output_root.join(project);
        let mut summary = BatchSummary {
            total: tasks.len(),
            ..Default::default()
        };

        for (i, path) in tasks.iter().enumerate() {
            let name = source_name(input, path);
            log::info!("[{}/{}] {name}", i + 1, tasks.len());

            let written = self
                .process(path, &name, project)
                .and_then(|report| Ok(report.write_to(&out_dir)?));
            match written {
                Ok(report_path) => {
                    log::info!("Report: {}", report_path.display());
                    summary.succeeded += 1;
                    summary.reports.push(report_path);
                }
                Err(e) => {
                    log::error!("Failed to ingest {}: {e}", path.display());
                    summary.failed += 1;
                }
            }
        }

        log::info!(
            "Ingest finished: {}/{} succeeded",
            summary.succeeded,
            summary.total
        );
        Ok(summary)
    }

    fn process(
        &mut self,
        path: &Path,
        name: &str,
        project: &str,
    ) -> Result<RunReport, Box<dyn std::error::Error>> {
        let kind = MediaKind::from_path(path)
            .ok_or_else(|| format!("Unsupported file type: {}", path.display()))?;
        let reader = (self.reader_factory)(kind);
        let mut writer = BufferedWriter::new(self.provider.open(project)?, self.settings.batch_size);

        match kind {
            MediaKind::Video => ProcessVideoUseCase::new(
                reader,
                self.engine.as_mut(),
                &mut writer,
                self.settings.clone(),
                (self.logger_factory)(),
                None,
            )
            .with_source_name(name)
            .execute(path),
            MediaKind::Image => ProcessImageUseCase::new(reader, self.engine.as_mut(), &mut writer)
                .with_source_name(name)
                .execute(path),
        }
    }
}
