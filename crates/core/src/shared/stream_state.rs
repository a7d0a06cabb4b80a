use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use crate::shared::crop_rect::{CropRect, GeometryError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamingState {
    NotStarted,
    Streaming,
}

#[derive(Clone, Copy, Debug)]
struct FrozenCrop {
    crop: CropRect,
    video_width: u32,
    video_height: u32,
}

/// Session-wide record of the first playable frame.
///
/// The crop is computed from the first frame any component observes and is
/// frozen for the rest of the session. Later frames with different dimensions
/// (device rotation, a renegotiated stream) keep the original crop.
pub struct StreamState {
    zoom: f64,
    frozen: OnceLock<FrozenCrop>,
    resize_warned: AtomicBool,
}

impl StreamState {
    pub fn new(zoom: f64) -> Self {
        Self {
            zoom,
            frozen: OnceLock::new(),
            resize_warned: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> StreamingState {
        if self.frozen.get().is_some() {
            StreamingState::Streaming
        } else {
            StreamingState::NotStarted
        }
    }

    pub fn crop(&self) -> Option<CropRect> {
        self.frozen.get().map(|f| f.crop)
    }

    /// Transitions to `Streaming` on the first call with usable dimensions
    /// and returns the crop, which is the same for every later call.
    pub fn on_playable_frame(&self, width: u32, height: u32) -> Result<CropRect, GeometryError> {
        if let Some(frozen) = self.frozen.get() {
            self.warn_if_resized(frozen, width, height);
            return Ok(frozen.crop);
        }

        let crop = CropRect::compute(width, height, self.zoom)?;
        let candidate = FrozenCrop {
            crop,
            video_width: width,
            video_height: height,
        };
        match self.frozen.set(candidate) {
            Ok(()) => {
                log::info!(
                    "Streaming started at {width}x{height}, crop {:.1}x{:.1} at ({:.1}, {:.1})",
                    crop.width,
                    crop.height,
                    crop.x,
                    crop.y
                );
                Ok(crop)
            }
            // Another thread observed the first frame concurrently.
            Err(_) => Ok(self.frozen.get().map_or(crop, |f| f.crop)),
        }
    }

    fn warn_if_resized(&self, frozen: &FrozenCrop, width: u32, height: u32) {
        if (width, height) == (frozen.video_width, frozen.video_height) {
            return;
        }
        if !self.resize_warned.swap(true, Ordering::Relaxed) {
            log::warn!(
                "Stream dimensions changed from {}x{} to {width}x{height}; keeping the original crop",
                frozen.video_width,
                frozen.video_height
            );
        }
    }
}
