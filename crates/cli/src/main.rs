use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use lookout_core::annotation::infrastructure::box_annotator::BoxAnnotator;
use lookout_core::detection::domain::object_detector::ObjectDetector;
use lookout_core::detection::infrastructure::model_resolver::{self, ModelLocations};
use lookout_core::detection::infrastructure::onnx_yolo_detector::{
    DetectorOptions, OnnxYoloDetector,
};
use lookout_core::pipeline::detect_image_use_case::DetectImageUseCase;
use lookout_core::pipeline::detect_stream_use_case::{DetectStreamUseCase, StreamEnd};
use lookout_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use lookout_core::pipeline::run_control::RunControl;
use lookout_core::shared::constants::{
    DEFAULT_CONFIDENCE, DEFAULT_IMAGE_OUTPUT, DEFAULT_MAX_DETECTIONS,
    DEFAULT_SNAPSHOT_INTERVAL_SECS, DEFAULT_VIDEO_OUTPUT, VIDEO_EXTENSIONS,
};
use lookout_core::shared::input_source::InputSource;
use lookout_core::shared::settings::{DetectionSettings, Device};
use lookout_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use lookout_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use lookout_core::video::infrastructure::image_file_reader::ImageFileReader;
use lookout_core::video::infrastructure::image_file_writer::ImageFileWriter;
use lookout_core::video::infrastructure::staged_upload::StagedUpload;

/// Object detection on images, videos, webcams and IP cameras.
#[derive(Parser, Debug)]
#[command(name = "lookout", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    detection: DetectionArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect objects in a single image and print the report.
    Image {
        /// Image file (jpg, jpeg, png, bmp, webp).
        input: PathBuf,
    },
    /// Detect objects in every frame of a video file.
    Video {
        /// Video file (mp4, avi, mov), or `-` to read from stdin.
        input: String,

        /// Container extension of the video arriving on stdin.
        #[arg(long, default_value = "mp4")]
        format: String,
    },
    /// Run on a local webcam until it fails or Ctrl-C is pressed.
    Webcam {
        /// Capture device index.
        #[arg(long, default_value_t = 0)]
        index: u32,

        /// Stop after this many frames.
        #[arg(long)]
        max_frames: Option<usize>,
    },
    /// Run on an IP camera stream (rtsp://, http://, ...).
    Stream {
        url: String,

        /// Stop after this many frames.
        #[arg(long)]
        max_frames: Option<usize>,
    },
}

#[derive(Args, Debug)]
struct DetectionArgs {
    /// Minimum confidence threshold (0.0-1.0).
    #[arg(long, global = true, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Maximum boxes to draw per frame (1-20).
    #[arg(long = "max-det", global = true, default_value_t = DEFAULT_MAX_DETECTIONS)]
    max_detections: usize,

    /// Compute device: cpu, 0, 1 or 2.
    #[arg(long, global = true, default_value = "cpu")]
    device: Device,

    /// Save the annotated image or video.
    #[arg(long, global = true)]
    save: bool,

    /// Where to save (implies --save). Defaults to result_image.jpg or result.mp4.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// ONNX weights to use instead of the search path.
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Download URL for the weights when none are found locally.
    #[arg(long = "model-url", global = true)]
    model_url: Option<String>,

    /// TrueType font for box labels.
    #[arg(long, global = true)]
    font: Option<PathBuf>,
}

impl DetectionArgs {
    fn settings(&self) -> Result<DetectionSettings, Box<dyn std::error::Error>> {
        let settings = DetectionSettings {
            confidence: self.confidence,
            max_detections: self.max_detections,
            device: self.device,
            save_result: self.save || self.output.is_some(),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn output_or(&self, default: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(default))
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = cli.detection.settings()?;

    match &cli.command {
        Command::Image { input } => run_image(&cli.detection, &settings, input),
        Command::Video { input, format } => {
            if input == "-" {
                let staged = stage_stdin(format)?;
                run_video(&cli.detection, &settings, staged.path())
            } else {
                run_video(&cli.detection, &settings, Path::new(input))
            }
        }
        Command::Webcam { index, max_frames } => run_stream(
            &cli.detection,
            &settings,
            InputSource::Webcam(*index),
            *max_frames,
        ),
        Command::Stream { url, max_frames } => run_stream(
            &cli.detection,
            &settings,
            InputSource::ip_camera(url)?,
            *max_frames,
        ),
    }
}

fn run_image(
    args: &DetectionArgs,
    settings: &DetectionSettings,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = InputSource::from_path(input)?;
    if !matches!(source, InputSource::ImageFile(_)) {
        return Err(format!("{} is not an image file", input.display()).into());
    }

    let save_to = settings
        .save_result
        .then(|| args.output_or(DEFAULT_IMAGE_OUTPUT));

    let mut use_case = DetectImageUseCase::new(
        Box::new(ImageFileReader::new()),
        build_detector(args, settings)?,
        Box::new(BoxAnnotator::with_font(args.font.as_deref())?),
        Box::new(ImageFileWriter::new()),
        Box::new(StdoutPipelineLogger::default()),
    );
    let outcome = use_case.execute(&source, save_to.as_deref())?;

    println!("{}", outcome.report);
    if let Some(path) = outcome.saved_to {
        log::info!("Annotated image written to {}", path.display());
    }
    Ok(())
}

fn run_video(
    args: &DetectionArgs,
    settings: &DetectionSettings,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = InputSource::from_path(input)?;
    if !matches!(source, InputSource::VideoFile(_)) {
        return Err(format!("{} is not a video file", input.display()).into());
    }
    run_stream(args, settings, source, None)
}

fn run_stream(
    args: &DetectionArgs,
    settings: &DetectionSettings,
    source: InputSource,
    max_frames: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let control = Arc::new(RunControl::new(
        settings,
        false,
        Duration::from_secs(DEFAULT_SNAPSHOT_INTERVAL_SECS),
    ));
    let handler_control = control.clone();
    ctrlc::set_handler(move || {
        log::info!("Stopping...");
        handler_control.cancel();
    })?;

    let mut use_case = DetectStreamUseCase::new(
        Box::new(FfmpegReader::new()),
        build_detector(args, settings)?,
        Box::new(BoxAnnotator::with_font(args.font.as_deref())?),
        Box::new(StdoutPipelineLogger::default()),
        control,
    )
    .with_max_frames(max_frames);
    if settings.save_result {
        use_case = use_case.with_recording(
            Box::new(FfmpegWriter::new()),
            args.output_or(DEFAULT_VIDEO_OUTPUT),
        );
    }

    let outcome = use_case.execute(&source, |event| {
        println!("{}", event.report);
        true
    })?;

    match outcome.end {
        StreamEnd::ReadFailed(warning) => eprintln!("Warning: {warning}"),
        StreamEnd::Exhausted | StreamEnd::Stopped => {}
    }
    log::info!("Processed {} frames from {source}", outcome.frames);
    if let Some(path) = outcome.recording {
        log::info!("Annotated video written to {}", path.display());
    }
    Ok(())
}

fn stage_stdin(format: &str) -> Result<StagedUpload, Box<dyn std::error::Error>> {
    let format = format.trim_start_matches('.').to_lowercase();
    if !VIDEO_EXTENSIONS.contains(&format.as_str()) {
        return Err(format!(
            "unsupported video format '{format}', expected one of: {}",
            VIDEO_EXTENSIONS.join(", ")
        )
        .into());
    }
    StagedUpload::from_reader(std::io::stdin().lock(), &format)
}

fn build_detector(
    args: &DetectionArgs,
    settings: &DetectionSettings,
) -> Result<Box<dyn ObjectDetector>, Box<dyn std::error::Error>> {
    let locations = ModelLocations::from_env(args.model.clone(), args.model_url.clone());
    let model_path = model_resolver::resolve(&locations, Some(Box::new(download_progress)))?;
    let detector = OnnxYoloDetector::new(
        &model_path,
        settings.device,
        DetectorOptions::from(settings),
    )?;
    log::info!(
        "Loaded {} ({} classes) on {}",
        model_path.display(),
        detector.class_names().len(),
        settings.device
    );
    Ok(Box::new(detector))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("lookout").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["image", "street.jpg"]).unwrap();
        let settings = cli.detection.settings().unwrap();
        assert_eq!(settings.confidence, 0.4);
        assert_eq!(settings.max_detections, 5);
        assert_eq!(settings.device, Device::Cpu);
        assert!(!settings.save_result);
    }

    #[test]
    fn test_flags_after_subcommand() {
        let cli = parse(&[
            "video", "clip.mp4", "--confidence", "0.6", "--max-det", "12", "--device", "1",
            "--save",
        ])
        .unwrap();
        let settings = cli.detection.settings().unwrap();
        assert_eq!(settings.confidence, 0.6);
        assert_eq!(settings.max_detections, 12);
        assert_eq!(settings.device, Device::Cuda(1));
        assert!(settings.save_result);
        assert_eq!(
            cli.detection.output_or(DEFAULT_VIDEO_OUTPUT),
            PathBuf::from("result.mp4")
        );
    }

    #[test]
    fn test_output_implies_save() {
        let cli = parse(&["image", "a.png", "--output", "out/annotated.png"]).unwrap();
        assert!(cli.detection.settings().unwrap().save_result);
        assert_eq!(
            cli.detection.output_or(DEFAULT_IMAGE_OUTPUT),
            PathBuf::from("out/annotated.png")
        );
    }

    #[test]
    fn test_out_of_range_settings_rejected() {
        let cli = parse(&["image", "a.png", "--max-det", "21"]).unwrap();
        assert!(cli.detection.settings().is_err());
        let cli = parse(&["image", "a.png", "--confidence", "1.5"]).unwrap();
        assert!(cli.detection.settings().is_err());
    }

    #[test]
    fn test_unknown_device_rejected_by_parser() {
        assert!(parse(&["image", "a.png", "--device", "gpu"]).is_err());
    }

    #[test]
    fn test_webcam_options() {
        let cli = parse(&["webcam", "--index", "2", "--max-frames", "50"]).unwrap();
        match cli.command {
            Command::Webcam { index, max_frames } => {
                assert_eq!(index, 2);
                assert_eq!(max_frames, Some(50));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_stdin_format_validation() {
        assert!(stage_stdin("mkv").is_err());
    }
}
