use thiserror::Error;

use crate::sampling::encoded_image::EncodeError;
use crate::shared::crop_rect::GeometryError;
use crate::transport::transport_error::TransportError;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// The camera could not be opened or access was denied. Not retried.
    #[error("camera unavailable: {0}")]
    Acquisition(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("cannot capture: {0}")]
    Geometry(#[from] GeometryError),
    #[error("cannot encode capture: {0}")]
    Encode(#[from] EncodeError),
    #[error("failed to start {name} thread: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}
