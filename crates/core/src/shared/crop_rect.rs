use thiserror::Error;

/// Quarter of the shorter video side.
pub const DEFAULT_ZOOM: f64 = 4.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("video stream is not ready (dimensions {width}x{height})")]
    StreamNotReady { width: u32, height: u32 },
    #[error("zoom must be a positive finite number, got {0}")]
    InvalidZoom(f64),
}

/// Square sampling rectangle in source-video pixel coordinates.
///
/// Used for both the live preview and the detector/classifier input, so the
/// user frames a subject in the centre of the view rather than the full
/// wide-angle frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Integer pixel window `[x0, x1) x [y0, y1)` inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelWindow {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelWindow {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

impl CropRect {
    pub const ZERO: CropRect = CropRect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    /// Centred square of side `min(w, h) / zoom`.
    ///
    /// The side never exceeds the shorter frame dimension, so zoom factors
    /// below 1 yield the largest centred square instead of overflowing.
    pub fn compute(video_width: u32, video_height: u32, zoom: f64) -> Result<Self, GeometryError> {
        if video_width == 0 || video_height == 0 {
            return Err(GeometryError::StreamNotReady {
                width: video_width,
                height: video_height,
            });
        }
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(GeometryError::InvalidZoom(zoom));
        }

        let w = video_width as f64;
        let h = video_height as f64;
        let shorter = w.min(h);
        let size = (shorter / zoom).min(shorter);

        Ok(Self {
            x: (w - size) / 2.0,
            y: (h - size) / 2.0,
            width: size,
            height: size,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Rounds the rectangle outward to whole pixels and clamps it to the
    /// frame. `None` when nothing of the rectangle lies inside the frame.
    pub fn pixel_window(&self, frame_width: u32, frame_height: u32) -> Option<PixelWindow> {
        if self.is_empty() {
            return None;
        }
        let clamp = |v: f64, max: u32| v.max(0.0).min(max as f64) as u32;
        let window = PixelWindow {
            x0: clamp(self.x.floor(), frame_width),
            y0: clamp(self.y.floor(), frame_height),
            x1: clamp((self.x + self.width).ceil(), frame_width),
            y1: clamp((self.y + self.height).ceil(), frame_height),
        };
        (window.x1 > window.x0 && window.y1 > window.y0).then_some(window)
    }
}
