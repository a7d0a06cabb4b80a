use image::imageops::{self, FilterType};

use crate::shared::crop_rect::CropRect;
use crate::shared::frame::{Frame, PLACEHOLDER_RGB};

/// Draws the crop region of a frame into a buffer of a fixed size.
///
/// The same transform serves the square inference input and the preview
/// surface; the crop is square, so a square output adds no distortion.
#[derive(Clone, Copy, Debug)]
pub struct FrameSampler {
    output_size: u32,
}

impl FrameSampler {
    pub fn new(output_size: u32) -> Self {
        Self { output_size }
    }

    pub fn output_size(&self) -> u32 {
        self.output_size
    }

    /// `output_size x output_size` still of the crop region.
    pub fn sample(&self, frame: &Frame, crop: &CropRect) -> Frame {
        draw_region(frame, crop, self.output_size, self.output_size)
    }
}

/// Scales the `crop` region of `frame` to `out_width x out_height`.
///
/// An empty crop, or one lying outside the frame, yields a blank
/// placeholder buffer rather than an error.
pub fn draw_region(frame: &Frame, crop: &CropRect, out_width: u32, out_height: u32) -> Frame {
    let blank = || Frame::filled(out_width, out_height, PLACEHOLDER_RGB);

    let Some(window) = crop.pixel_window(frame.width(), frame.height()) else {
        return blank();
    };
    let Some(source) = frame.to_rgb_image() else {
        return blank();
    };

    let region = imageops::crop_imm(
        &source,
        window.x0,
        window.y0,
        window.width(),
        window.height(),
    )
    .to_image();
    let scaled = if region.dimensions() == (out_width, out_height) {
        region
    } else {
        imageops::resize(&region, out_width, out_height, FilterType::Triangle)
    };

    Frame::from_rgb_image(scaled, frame.index())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Left half red, right half blue.
    fn split_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _y in 0..height {
            for x in 0..width {
                if x < width / 2 {
                    data.extend_from_slice(&[255, 0, 0]);
                } else {
                    data.extend_from_slice(&[0, 0, 255]);
                }
            }
        }
        Frame::new(data, width, height, 3)
    }

    #[test]
    fn test_sample_has_output_dimensions() {
        let frame = Frame::filled(640, 480, [1, 2, 3]);
        let crop = CropRect::compute(640, 480, 4.0).unwrap();
        let out = FrameSampler::new(224).sample(&frame, &crop);
        assert_eq!((out.width(), out.height()), (224, 224));
        assert_eq!(out.pixel(100, 100), Some([1, 2, 3]));
    }

    #[test]
    fn test_sample_keeps_source_index() {
        let frame = split_frame(64, 64);
        let crop = CropRect::compute(64, 64, 2.0).unwrap();
        assert_eq!(FrameSampler::new(16).sample(&frame, &crop).index(), 3);
    }

    #[test]
    fn test_sample_only_reads_inside_crop() {
        let frame = split_frame(200, 100);
        // Entirely inside the red half.
        let crop = CropRect {
            x: 10.0,
            y: 10.0,
            width: 50.0,
            height: 50.0,
        };
        let out = FrameSampler::new(32).sample(&frame, &crop);
        assert!(out.data().chunks(3).all(|px| px == [255, 0, 0]));
    }

    #[test]
    fn test_centre_crop_preserves_left_right_layout() {
        let frame = split_frame(400, 400);
        let crop = CropRect::compute(400, 400, 2.0).unwrap();
        let out = FrameSampler::new(100).sample(&frame, &crop);
        assert_eq!(out.pixel(5, 50), Some([255, 0, 0]));
        assert_eq!(out.pixel(95, 50), Some([0, 0, 255]));
    }

    #[test]
    fn test_zero_crop_yields_blank_buffer() {
        let frame = Frame::filled(64, 64, [9, 9, 9]);
        let out = FrameSampler::new(8).sample(&frame, &CropRect::ZERO);
        assert_eq!((out.width(), out.height()), (8, 8));
        assert!(out.data().chunks(3).all(|px| px == PLACEHOLDER_RGB));
    }

    #[test]
    fn test_draw_region_to_non_square_surface() {
        let frame = Frame::filled(300, 300, [7, 7, 7]);
        let crop = CropRect::compute(300, 300, 3.0).unwrap();
        let out = draw_region(&frame, &crop, 40, 20);
        assert_eq!((out.width(), out.height()), (40, 20));
    }
}
