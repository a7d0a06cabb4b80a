use crate::rendering::domain::overlay::{BoxStyle, ScaledRect};
use crate::shared::crop_rect::CropRect;
use crate::shared::frame::Frame;

/// On-screen preview target at display resolution.
pub trait Surface: Send {
    /// `(width, height)` in display pixels.
    fn size(&self) -> (u32, u32);

    /// Draws the `crop` region of `frame` scaled to cover the whole surface.
    fn draw_region(&mut self, frame: &Frame, crop: &CropRect);

    /// Strokes an unfilled rectangle in display coordinates.
    fn stroke_rect(&mut self, rect: &ScaledRect, style: BoxStyle);
}
