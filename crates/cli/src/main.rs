use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use partscan_core::capture::capture_session::{Backends, CaptureSession};
use partscan_core::capture::result_display::ResultDisplay;
use partscan_core::classification::domain::classification_client::{
    label_image_path, LabelCatalog,
};
use partscan_core::classification::domain::classification_result::ClassificationResult;
use partscan_core::rendering::infrastructure::raster_surface::RasterSurface;
use partscan_core::shared::config::ClientConfig;
use partscan_core::shared::constants::IMAGE_EXTENSIONS;
use partscan_core::shared::frame::Frame;
use partscan_core::shared::stream_state::StreamingState;
use partscan_core::transport::infrastructure::http_inference_client::HttpInferenceClient;
use partscan_core::video::domain::image_writer::ImageWriter;
use partscan_core::video::domain::video_source::VideoSource;
#[cfg(feature = "camera-ffmpeg")]
use partscan_core::video::infrastructure::ffmpeg_camera_source::FfmpegCameraSource;
use partscan_core::video::infrastructure::image_file_writer::ImageFileWriter;
use partscan_core::video::infrastructure::still_image_source::StillImageSource;

const STREAM_WAIT: Duration = Duration::from_secs(10);

/// Live part detection and one-shot classification against a PartScan
/// inference backend.
#[derive(Parser)]
#[command(name = "partscan")]
struct Cli {
    /// Still image to use in place of a camera.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Camera device, stream URL or video file.
    #[cfg(feature = "camera-ffmpeg")]
    #[arg(long)]
    camera: Option<String>,

    /// Backend base URL (overrides the config file).
    #[arg(long)]
    server: Option<String>,

    /// Crop zoom: the sampled square is the shorter side divided by this.
    #[arg(long)]
    zoom: Option<f64>,

    /// Request timeout in seconds (default: wait indefinitely).
    #[arg(long)]
    timeout: Option<u64>,

    /// Client config file (default: per-user config, if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print every label the classifier knows.
    #[arg(long)]
    list_classes: bool,

    /// Run continuous detection for this many seconds and print the boxes.
    #[arg(long)]
    detect_for: Option<f64>,

    /// Capture one still and classify it.
    #[arg(long)]
    classify: bool,

    /// Save the preview (with detection overlay) as an image.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl Cli {
    fn needs_stream(&self) -> bool {
        self.detect_for.is_some() || self.classify || self.snapshot.is_some()
    }
}

/// Prints classification results to stdout and errors to stderr.
struct ConsoleResultDisplay {
    min_probability: f64,
}

impl ResultDisplay for ConsoleResultDisplay {
    fn show_photo(&mut self, photo: &Frame) {
        log::info!("Captured {}x{} photo", photo.width(), photo.height());
    }

    fn show_result(&mut self, result: &ClassificationResult) {
        let predictions = result.predictions(self.min_probability);
        if predictions.is_empty() {
            println!("No parts recognised");
        }
        for (rank, prediction) in predictions.iter().enumerate() {
            println!(
                "{:>2}. {:<12} {:>8.3}  {}",
                rank + 1,
                prediction.label,
                prediction.confidence,
                prediction.image_url
            );
        }
        if let Some(color) = result.color() {
            println!(
                "Colour: {} ({}) {:.3}",
                color.name, color.hex, color.confidence
            );
        }
    }

    fn show_error(&mut self, message: &str) {
        eprintln!("Error: {message}");
    }
}

fn main() {
    env_logger::init();
    std::panic::set_hook(Box::new(|info| {
        log::error!("{info}");
        eprintln!("Error: {info}");
    }));

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = load_config(&cli)?;
    let client = Arc::new(HttpInferenceClient::new(
        &config.server_url,
        config.request_timeout(),
    )?);

    if cli.list_classes {
        list_classes(&client)?;
    }
    if !cli.needs_stream() {
        return Ok(());
    }

    let source = open_source(&cli)?;
    let surface = RasterSurface::new(config.preview_width, config.preview_height);
    let min_probability = config.min_probability;
    let mut session = CaptureSession::start(config, source, Backends::http(client), surface)?;
    wait_for_stream(&session)?;

    if let Some(seconds) = cli.detect_for {
        run_detection(&mut session, Duration::from_secs_f64(seconds))?;
    }
    let mut classified = true;
    if cli.classify {
        let mut display = ConsoleResultDisplay { min_probability };
        classified = session.capture_into(&mut display).is_ok();
    }
    if let Some(path) = &cli.snapshot {
        write_snapshot(&session, path)?;
    }

    session.shutdown();
    if !classified {
        // Already reported through the display.
        process::exit(1);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    if let Some(zoom) = cli.zoom {
        config.zoom = zoom;
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout_secs = Some(timeout);
    }
    config.validate()?;
    Ok(config)
}

fn list_classes(client: &HttpInferenceClient) -> Result<(), Box<dyn std::error::Error>> {
    let classes = client.classes()?;
    for label in &classes {
        println!("{label}\t{}{}", client.base_url(), label_image_path(label));
    }
    log::info!("{} classes available", classes.len());
    Ok(())
}

fn run_detection(
    session: &mut CaptureSession<RasterSurface>,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    session.set_detection_enabled(true)?;
    thread::sleep(duration);

    let boxes = session.boxes();
    for detection in boxes.iter() {
        let validity = match detection.valid {
            Some(true) => "valid",
            Some(false) => "invalid",
            None => "-",
        };
        println!(
            "{:.1} {:.1} {:.1} {:.1} {validity}",
            detection.x, detection.y, detection.w, detection.h
        );
    }

    let stats = session.detection_stats();
    log::info!(
        "Detection: {} requests, {} updates, {} failures, {} boxes",
        stats.requests,
        stats.updates,
        stats.failures,
        boxes.len()
    );
    Ok(())
}

fn write_snapshot(
    session: &CaptureSession<RasterSurface>,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = session.with_surface(RasterSurface::snapshot);
    ImageFileWriter::new().write(path, &snapshot)?;
    log::info!("Preview written to {}", path.display());
    Ok(())
}

fn wait_for_stream(
    session: &CaptureSession<RasterSurface>,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    while session.streaming_state() != StreamingState::Streaming {
        if start.elapsed() > STREAM_WAIT {
            return Err(format!(
                "No frame from the video source within {}s",
                STREAM_WAIT.as_secs()
            )
            .into());
        }
        thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

fn open_source(cli: &Cli) -> Result<Arc<dyn VideoSource>, Box<dyn std::error::Error>> {
    if let Some(camera) = camera_source(cli) {
        return Ok(camera);
    }
    match &cli.image {
        Some(path) => Ok(Arc::new(StillImageSource::from_path(path))),
        None => Err(no_source_message().into()),
    }
}

#[cfg(feature = "camera-ffmpeg")]
fn camera_requested(cli: &Cli) -> bool {
    cli.camera.is_some()
}

#[cfg(not(feature = "camera-ffmpeg"))]
fn camera_requested(_cli: &Cli) -> bool {
    false
}

#[cfg(feature = "camera-ffmpeg")]
fn camera_source(cli: &Cli) -> Option<Arc<dyn VideoSource>> {
    let camera = cli.camera.as_ref()?;
    Some(Arc::new(FfmpegCameraSource::new(camera.clone())))
}

#[cfg(not(feature = "camera-ffmpeg"))]
fn camera_source(_cli: &Cli) -> Option<Arc<dyn VideoSource>> {
    None
}

fn no_source_message() -> &'static str {
    if cfg!(feature = "camera-ffmpeg") {
        "A video source is required: pass --camera or --image"
    } else {
        "A video source is required: pass --image (build with camera-ffmpeg for --camera)"
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.list_classes && !cli.needs_stream() {
        return Err(
            "Nothing to do: pass --list-classes, --detect-for, --classify or --snapshot".into(),
        );
    }
    if camera_requested(cli) && cli.image.is_some() {
        return Err("--camera and --image are mutually exclusive".into());
    }
    if let Some(image) = &cli.image {
        if !image.exists() {
            return Err(format!("Input file not found: {}", image.display()).into());
        }
        if !is_image(image) {
            return Err(format!("Unsupported image type: {}", image.display()).into());
        }
    }
    if let Some(seconds) = cli.detect_for {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(format!("--detect-for must be a positive duration, got {seconds}").into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
