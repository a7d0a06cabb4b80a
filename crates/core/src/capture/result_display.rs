use crate::classification::domain::classification_result::ClassificationResult;
use crate::shared::frame::Frame;

/// Receives the outcome of a one-shot capture.
pub trait ResultDisplay {
    /// The sampled still, shown before the classifier answers.
    fn show_photo(&mut self, photo: &Frame);
    fn show_result(&mut self, result: &ClassificationResult);
    /// Replaces the result area with an error message.
    fn show_error(&mut self, message: &str);
}
