/// Square input resolution of the remote detector and classifier.
pub const DETECTOR_INPUT_SIZE: u32 = 224;

pub const PREVIEW_WIDTH: u32 = 400;
pub const PREVIEW_HEIGHT: u32 = 400;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Pause between detection cycles. Only yields to the render loop and
/// user actions; it is not a rate limit.
pub const DETECTION_YIELD_MS: u64 = 1;

/// ~60 Hz display refresh.
pub const RENDER_INTERVAL_MS: u64 = 16;

/// Legacy classify responses carry probabilities on a 0-100 scale and were
/// filtered with `probability > 1.0`. Kept as-is; set deliberately through
/// `ClientConfig::min_probability`.
pub const LEGACY_MIN_PROBABILITY: f64 = 1.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
