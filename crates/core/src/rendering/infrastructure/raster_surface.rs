use image::{Rgb, RgbImage};

use crate::rendering::domain::overlay::{BoxStyle, ScaledRect};
use crate::rendering::domain::surface::Surface;
use crate::sampling::frame_sampler::draw_region;
use crate::shared::crop_rect::CropRect;
use crate::shared::frame::{Frame, PLACEHOLDER_RGB};

pub const LINE_WIDTH: i64 = 2;

/// In-memory RGB preview surface.
pub struct RasterSurface {
    canvas: RgbImage,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbImage::from_pixel(width, height, Rgb(PLACEHOLDER_RGB)),
        }
    }

    pub fn snapshot(&self) -> Frame {
        Frame::from_rgb_image(self.canvas.clone(), 0)
    }

    fn put(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.canvas.width() as i64 || y >= self.canvas.height() as i64 {
            return;
        }
        self.canvas.put_pixel(x as u32, y as u32, Rgb(rgb));
    }
}

impl Surface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn draw_region(&mut self, frame: &Frame, crop: &CropRect) {
        let (width, height) = self.canvas.dimensions();
        let scaled = draw_region(frame, crop, width, height);
        if let Some(img) = scaled.to_rgb_image() {
            self.canvas = img;
        }
    }

    fn stroke_rect(&mut self, rect: &ScaledRect, style: BoxStyle) {
        let rgb = style.rgb();
        let (width, height) = self.canvas.dimensions();
        // Clamped just past the canvas so off-screen edges stay off-screen
        // and the loops below stay bounded.
        let left = clamp_edge(rect.x, width);
        let top = clamp_edge(rect.y, height);
        let right = clamp_edge(rect.x + rect.width, width);
        let bottom = clamp_edge(rect.y + rect.height, height);
        let half = LINE_WIDTH / 2;

        // The stroke straddles the path, like a canvas 2D context.
        for t in -half..(LINE_WIDTH - half) {
            for x in (left - half)..=(right + half) {
                self.put(x, top + t, rgb);
                self.put(x, bottom + t, rgb);
            }
            for y in (top - half)..=(bottom + half) {
                self.put(left + t, y, rgb);
                self.put(right + t, y, rgb);
            }
        }
    }
}

fn clamp_edge(coordinate: f64, extent: u32) -> i64 {
    let limit = extent as f64 + LINE_WIDTH as f64;
    // NaN clamps to NaN, which casts to 0.
    coordinate.round().clamp(-(LINE_WIDTH as f64), limit) as i64
}
