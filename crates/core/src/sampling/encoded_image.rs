use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use image::ImageFormat;
use thiserror::Error;

use crate::shared::frame::Frame;

const DATA_URL_PREFIXES: &[&str] = &[
    "data:image/png;base64,",
    "data:image/jpg;base64,",
    "data:image/jpeg;base64,",
];

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("frame buffer does not match its dimensions")]
    InvalidFrame,
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("not an image data URL")]
    NotDataUrl,
}

/// Transport-ready still: base64 PNG without a `data:` URL prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    base64: String,
}

impl EncodedImage {
    /// Lossless PNG encoding of `frame`.
    pub fn encode_png(frame: &Frame) -> Result<Self, EncodeError> {
        let img = frame.to_rgb_image().ok_or(EncodeError::InvalidFrame)?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(Self {
            base64: BASE64_STANDARD.encode(bytes),
        })
    }

    /// Strips the `data:image/{png,jpg,jpeg};base64,` prefix.
    pub fn from_data_url(url: &str) -> Result<Self, EncodeError> {
        DATA_URL_PREFIXES
            .iter()
            .find_map(|prefix| url.strip_prefix(prefix))
            .map(|payload| Self {
                base64: payload.to_string(),
            })
            .ok_or(EncodeError::NotDataUrl)
    }

    pub fn as_base64(&self) -> &str {
        &self.base64
    }

    pub fn to_data_url(&self) -> String {
        format!("{}{}", DATA_URL_PREFIXES[0], self.base64)
    }

    pub fn decode(&self) -> Result<Frame, EncodeError> {
        let bytes = BASE64_STANDARD.decode(&self.base64)?;
        let img = image::load_from_memory(&bytes)?.to_rgb8();
        Ok(Frame::from_rgb_image(img, 0))
    }
}
