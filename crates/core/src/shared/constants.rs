pub const MODEL_FILE_NAME: &str = "best.onnx";

/// Directory searched for bundled weights, relative to the working directory.
pub const BUNDLED_MODEL_DIR: &str = "weights";

pub const MODEL_PATH_ENV: &str = "LOOKOUT_MODEL";
pub const MODEL_URL_ENV: &str = "LOOKOUT_MODEL_URL";

pub const DEFAULT_CONFIDENCE: f64 = 0.4;
pub const DEFAULT_MAX_DETECTIONS: usize = 5;
pub const MIN_MAX_DETECTIONS: usize = 1;
pub const MAX_MAX_DETECTIONS: usize = 20;

/// Selectable compute devices: CPU or one of the first three CUDA devices.
pub const DEVICE_CHOICES: &[&str] = &["cpu", "0", "1", "2"];
pub const MAX_CUDA_DEVICE: u32 = 2;

/// Annotated recordings are always encoded at this rate, whatever the source.
pub const RECORDING_FPS: f64 = 20.0;

pub const DEFAULT_IMAGE_OUTPUT: &str = "result_image.jpg";
pub const DEFAULT_VIDEO_OUTPUT: &str = "result.mp4";

pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 5;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

pub const STREAM_SCHEMES: &[&str] = &["rtsp", "rtsps", "rtmp", "http", "https"];
