use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use facetrace_core::config::Config;
use facetrace_core::detection::domain::face_engine::FaceEngine;
use facetrace_core::detection::infrastructure::onnx_face_engine::OnnxFaceEngine;
use facetrace_core::pipeline::batch_ingest_use_case::BatchIngestUseCase;
use facetrace_core::pipeline::pipeline_logger::{PipelineLogger, StdoutPipelineLogger};
use facetrace_core::pipeline::process_video_use_case::IngestSettings;
use facetrace_core::search::domain::search_result::LevelFilter;
use facetrace_core::search::search_service::{ImageInput, SearchRequest, SearchService};
use facetrace_core::shared::media_metadata::MediaKind;
use facetrace_core::shared::model_resolver::{self, ModelSpec};
use facetrace_core::storage::domain::store_record::DataLevel;
use facetrace_core::storage::domain::vector_store::StoreProvider;
use facetrace_core::storage::infrastructure::flat_file_store::FlatFileStoreProvider;
use facetrace_core::video::domain::media_reader::MediaReader;
use facetrace_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use facetrace_core::video::infrastructure::image_file_reader::ImageFileReader;

/// Face track ingestion and similarity search for videos and images.
#[derive(Parser)]
#[command(name = "facetrace")]
struct Cli {
    /// JSON config file.
    #[arg(long, short, global = true, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect, deduplicate and store faces from a file or directory.
    Ingest {
        /// Video or image file, or a directory scanned recursively.
        input: PathBuf,

        /// Collection to store into (defaults to project.default_project).
        #[arg(long, short)]
        project: Option<String>,

        /// Store every detection (frame) or one record per track (track).
        #[arg(long, value_parser = ["frame", "track"])]
        mode: Option<String>,

        /// Process every Nth frame.
        #[arg(long)]
        stride: Option<usize>,
    },
    /// Find stored appearances of the first face in an image.
    Search {
        /// Query image.
        image: PathBuf,

        #[arg(long, short)]
        project: Option<String>,

        /// Maximum hits fetched from the store.
        #[arg(long)]
        limit: Option<usize>,

        /// Record level to search: auto, frame or track.
        #[arg(long)]
        level: Option<LevelFilter>,

        /// Minimum similarity score (0.0-1.0).
        #[arg(long)]
        threshold: Option<f64>,

        /// Only match records from this source (its path below the ingested directory).
        #[arg(long)]
        source: Option<String>,
    },
    /// Print the number of records in a collection.
    Count {
        #[arg(long, short)]
        project: Option<String>,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Loading validates, so a bad file fails every subcommand up front.
    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Command::Ingest {
            input,
            project,
            mode,
            stride,
        } => {
            if let Some(mode) = mode {
                config.run_mode.save_mode = parse_mode(&mode)?;
            }
            if let Some(stride) = stride {
                config.video.stride = stride;
            }
            config.validate()?;
            let project = project.unwrap_or_else(|| config.project.default_project.clone());
            run_ingest(&config, &input, &project)
        }
        Command::Search {
            image,
            project,
            limit,
            level,
            threshold,
            source,
        } => {
            let mut request = SearchRequest::new(ImageInput::from_path(&image), &config.search);
            request.project = project;
            request.source = source;
            if let Some(limit) = limit {
                request.limit = limit;
            }
            if let Some(level) = level {
                request.level = level;
            }
            if let Some(threshold) = threshold {
                request.score_threshold = threshold;
            }
            run_search(&config, &request)
        }
        Command::Count { project } => {
            let provider = FlatFileStoreProvider::new(&config.project.vector_db_path);
            let project = project.unwrap_or_else(|| config.project.default_project.clone());
            let count = provider.open(&project)?.count();
            println!("{count}");
            Ok(())
        }
    }
}

fn run_ingest(
    config: &Config,
    input: &Path,
    project: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input not found: {}", input.display()).into());
    }
    let engine = build_engine(config)?;
    let mut use_case = BatchIngestUseCase::new(
        engine,
        Box::new(FlatFileStoreProvider::new(&config.project.vector_db_path)),
        IngestSettings::from_config(config),
        config.project.output_root.clone(),
        Box::new(open_reader),
        Box::new(|| -> Box<dyn PipelineLogger> { Box::new(StdoutPipelineLogger::default()) }),
    );

    let summary = use_case.execute(input, project)?;
    eprintln!(
        "Done: {}/{} files ingested into '{project}'",
        summary.succeeded, summary.total
    );
    Ok(())
}

fn run_search(config: &Config, request: &SearchRequest) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine(config)?;
    let mut service = SearchService::new(
        engine,
        Box::new(FlatFileStoreProvider::new(&config.project.vector_db_path)),
        config.project.default_project.clone(),
    );
    let response = service.search(request)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn build_engine(config: &Config) -> Result<Box<dyn FaceEngine>, Box<dyn std::error::Error>> {
    let detector_path = resolve_model(config, &config.model.detector())?;
    let embedding_path = resolve_model(config, &config.model.embedding())?;
    let engine =
        OnnxFaceEngine::from_models(&detector_path, &embedding_path, config.model.confidence)?;
    Ok(Box::new(engine))
}

fn resolve_model(config: &Config, spec: &ModelSpec) -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {}", spec.name);
    let path = model_resolver::resolve(
        spec,
        config.model.model_dir.as_deref(),
        Some(Box::new(download_progress)),
    )?;
    Ok(path)
}

fn open_reader(kind: MediaKind) -> Box<dyn MediaReader> {
    match kind {
        MediaKind::Image => Box::new(ImageFileReader::new()),
        MediaKind::Video => Box::new(FfmpegReader::new()),
    }
}

fn parse_mode(mode: &str) -> Result<DataLevel, Box<dyn std::error::Error>> {
    match mode {
        "frame" => Ok(DataLevel::Frame),
        "track" => Ok(DataLevel::Track),
        other => Err(format!("Mode must be 'frame' or 'track', got '{other}'").into()),
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
