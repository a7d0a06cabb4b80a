use crate::classification::domain::classification_result::ClassificationResult;
use crate::sampling::encoded_image::EncodedImage;
use crate::transport::transport_error::TransportError;

/// Remote classifier for one-shot captures.
pub trait ClassificationClient: Send + Sync {
    fn classify(&self, image: &EncodedImage) -> Result<ClassificationResult, TransportError>;
}

/// Catalogue of every label the classifier can return.
pub trait LabelCatalog: Send + Sync {
    fn classes(&self) -> Result<Vec<String>, TransportError>;
}

/// Reference image of a label, relative to the backend root.
pub fn label_image_path(label: &str) -> String {
    format!("/images/{label}.png")
}
