use crate::detection::domain::detection_box::DetectionBox;

/// Rectangle in display pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaledRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxStyle {
    Default,
    Valid,
    Invalid,
}

impl BoxStyle {
    pub fn for_box(detection: &DetectionBox) -> Self {
        match detection.valid {
            Some(true) => BoxStyle::Valid,
            Some(false) => BoxStyle::Invalid,
            None => BoxStyle::Default,
        }
    }

    pub fn rgb(&self) -> [u8; 3] {
        match self {
            BoxStyle::Default | BoxStyle::Invalid => [255, 0, 0],
            BoxStyle::Valid => [0, 200, 0],
        }
    }
}

/// Maps detector-input coordinates onto a display surface.
///
/// The two axes scale independently; a non-square surface stretches boxes
/// the same way it stretches the square crop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayScale {
    pub sx: f64,
    pub sy: f64,
}

impl OverlayScale {
    pub fn new(detector_input_size: u32, surface_width: u32, surface_height: u32) -> Self {
        let input = detector_input_size.max(1) as f64;
        Self {
            sx: surface_width as f64 / input,
            sy: surface_height as f64 / input,
        }
    }

    pub fn scale(&self, detection: &DetectionBox) -> ScaledRect {
        ScaledRect {
            x: detection.x * self.sx,
            y: detection.y * self.sy,
            width: detection.w * self.sx,
            height: detection.h * self.sy,
        }
    }
}
