use crate::detection::domain::detection_box::DetectionBox;
use crate::sampling::encoded_image::EncodedImage;
use crate::transport::transport_error::TransportError;

/// Remote object detector.
///
/// Blocking: returns once the backend has answered. Implementations must
/// not retry; the detection loop decides what a failure means.
pub trait DetectionClient: Send + Sync {
    fn detect(&self, image: &EncodedImage) -> Result<Vec<DetectionBox>, TransportError>;
}
