use std::sync::{Arc, Mutex, PoisonError};

use crate::detection::domain::bounding_box_set::BoundingBoxSet;
use crate::rendering::domain::overlay::{BoxStyle, OverlayScale};
use crate::rendering::domain::surface::Surface;
use crate::shared::stream_state::StreamState;
use crate::video::domain::video_source::VideoSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    WaitingForStream,
    Rendered { boxes: usize },
}

/// Mirrors the cropped live view onto the preview surface and overlays the
/// latest detection boxes.
pub struct PreviewRenderer<S: Surface> {
    source: Arc<dyn VideoSource>,
    stream: Arc<StreamState>,
    boxes: BoundingBoxSet,
    surface: Arc<Mutex<S>>,
    detector_input_size: u32,
}

impl<S: Surface> PreviewRenderer<S> {
    pub fn new(
        source: Arc<dyn VideoSource>,
        stream: Arc<StreamState>,
        boxes: BoundingBoxSet,
        surface: Arc<Mutex<S>>,
        detector_input_size: u32,
    ) -> Self {
        Self {
            source,
            stream,
            boxes,
            surface,
            detector_input_size,
        }
    }

    /// One display refresh. The box set is read afresh on every step.
    pub fn render_step(&self) -> RenderOutcome {
        let Some(frame) = self.source.current_frame() else {
            return RenderOutcome::WaitingForStream;
        };
        let Ok(crop) = self.stream.on_playable_frame(frame.width(), frame.height()) else {
            return RenderOutcome::WaitingForStream;
        };

        let boxes = self.boxes.snapshot();
        let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        surface.draw_region(&frame, &crop);

        let (width, height) = surface.size();
        let scale = OverlayScale::new(self.detector_input_size, width, height);
        for detection in boxes.iter() {
            surface.stroke_rect(&scale.scale(detection), BoxStyle::for_box(detection));
        }

        RenderOutcome::Rendered { boxes: boxes.len() }
    }
}
