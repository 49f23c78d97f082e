pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Pending records held by a buffered writer before an automatic flush.
pub const DEFAULT_BATCH_SIZE: usize = 50;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.65;
pub const DEFAULT_MISS_TOLERANCE: u32 = 3;
pub const DEFAULT_STRIDE: usize = 5;

pub const DEFAULT_SEARCH_LIMIT: usize = 5;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.6;

pub const DEFAULT_PROJECT: &str = "default_project";

/// Decimal places used for every reported score and coordinate.
pub const REPORT_DECIMALS: u32 = 4;
