use std::sync::{Mutex, PoisonError};

use crate::sampling::encoded_image::{EncodeError, EncodedImage};
use crate::sampling::frame_sampler::FrameSampler;
use crate::shared::crop_rect::CropRect;
use crate::shared::frame::{Frame, PLACEHOLDER_RGB};

/// A sampled still together with its transport encoding.
#[derive(Clone, Debug)]
pub struct SampledImage {
    pub photo: Frame,
    pub encoded: EncodedImage,
}

/// The single off-screen buffer shared by one-shot capture and the
/// detection loop.
///
/// Draw and encode happen under one lock, so neither call site can observe
/// the buffer while the other is mid-draw.
pub struct SamplingBuffer {
    sampler: FrameSampler,
    buffer: Mutex<Frame>,
}

impl SamplingBuffer {
    pub fn new(output_size: u32) -> Self {
        Self {
            sampler: FrameSampler::new(output_size),
            buffer: Mutex::new(Frame::filled(output_size, output_size, PLACEHOLDER_RGB)),
        }
    }

    pub fn output_size(&self) -> u32 {
        self.sampler.output_size()
    }

    pub fn capture(&self, frame: &Frame, crop: &CropRect) -> Result<SampledImage, EncodeError> {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        *buffer = self.sampler.sample(frame, crop);
        let encoded = EncodedImage::encode_png(&buffer)?;
        Ok(SampledImage {
            photo: buffer.clone(),
            encoded,
        })
    }

    /// Copy of the last captured still (the placeholder before any capture).
    pub fn last_photo(&self) -> Frame {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
