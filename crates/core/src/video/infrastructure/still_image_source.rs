use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::shared::frame::Frame;
use crate::video::domain::video_source::VideoSource;

/// Serves one still image as if it were a live camera.
///
/// Stands in for the camera when a photo is submitted from a file, and in
/// tests. The frame becomes available once `start` has loaded it.
pub struct StillImageSource {
    origin: Origin,
    frame: RwLock<Option<Arc<Frame>>>,
}

enum Origin {
    File(PathBuf),
    Memory(Arc<Frame>),
}

impl StillImageSource {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            origin: Origin::File(path.as_ref().to_path_buf()),
            frame: RwLock::new(None),
        }
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self {
            origin: Origin::Memory(Arc::new(frame)),
            frame: RwLock::new(None),
        }
    }
}

impl VideoSource for StillImageSource {
    fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let frame = match &self.origin {
            Origin::File(path) => {
                let img = image::open(path)
                    .map_err(|e| format!("cannot open {}: {e}", path.display()))?
                    .to_rgb8();
                log::info!(
                    "Loaded still image {} ({}x{})",
                    path.display(),
                    img.width(),
                    img.height()
                );
                Arc::new(Frame::from_rgb_image(img, 0))
            }
            Origin::Memory(frame) => frame.clone(),
        };
        *self.frame.write().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        Ok(())
    }

    fn current_frame(&self) -> Option<Arc<Frame>> {
        self.frame
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn stop(&self) {
        *self.frame.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_frame_before_start() {
        let source = StillImageSource::from_frame(Frame::filled(4, 4, [1, 1, 1]));
        assert!(source.current_frame().is_none());
        source.start().unwrap();
        assert_eq!(source.current_frame().unwrap().width(), 4);
    }

    #[test]
    fn test_loads_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.png");
        image::RgbImage::from_pixel(32, 24, image::Rgb([5, 6, 7]))
            .save(&path)
            .unwrap();

        let source = StillImageSource::from_path(&path);
        source.start().unwrap();

        let frame = source.current_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 24));
        assert_eq!(frame.pixel(0, 0), Some([5, 6, 7]));
    }

    #[test]
    fn test_missing_file_fails_to_start() {
        let source = StillImageSource::from_path("/definitely/not/here.png");
        let err = source.start().unwrap_err();
        assert!(err.to_string().contains("not/here.png"));
        assert!(source.current_frame().is_none());
    }

    #[test]
    fn test_stop_releases_frame() {
        let source = StillImageSource::from_frame(Frame::filled(2, 2, [0, 0, 0]));
        source.start().unwrap();
        source.stop();
        source.stop();
        assert!(source.current_frame().is_none());
    }
}
