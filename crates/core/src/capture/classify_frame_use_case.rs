use std::sync::Arc;

use crate::capture::capture_error::CaptureError;
use crate::classification::domain::classification_client::ClassificationClient;
use crate::classification::domain::classification_result::ClassificationResult;
use crate::sampling::sampling_buffer::{SampledImage, SamplingBuffer};
use crate::shared::crop_rect::GeometryError;
use crate::shared::frame::Frame;
use crate::shared::stream_state::StreamState;
use crate::video::domain::video_source::VideoSource;

/// A classified still.
#[derive(Clone, Debug)]
pub struct Capture {
    pub photo: Frame,
    pub result: ClassificationResult,
}

/// One-shot classification: sample once → POST `/classify` → result.
pub struct ClassifyFrameUseCase {
    source: Arc<dyn VideoSource>,
    stream: Arc<StreamState>,
    buffer: Arc<SamplingBuffer>,
    classifier: Arc<dyn ClassificationClient>,
}

impl ClassifyFrameUseCase {
    pub fn new(
        source: Arc<dyn VideoSource>,
        stream: Arc<StreamState>,
        buffer: Arc<SamplingBuffer>,
        classifier: Arc<dyn ClassificationClient>,
    ) -> Self {
        Self {
            source,
            stream,
            buffer,
            classifier,
        }
    }

    pub fn execute(&self) -> Result<Capture, CaptureError> {
        let sampled = self.sample()?;
        let result = self.classify(&sampled)?;
        Ok(Capture {
            photo: sampled.photo,
            result,
        })
    }

    /// Draws the current crop through the shared sampling buffer.
    pub fn sample(&self) -> Result<SampledImage, CaptureError> {
        let frame = self
            .source
            .current_frame()
            .ok_or(GeometryError::StreamNotReady {
                width: 0,
                height: 0,
            })?;
        let crop = self.stream.on_playable_frame(frame.width(), frame.height())?;
        Ok(self.buffer.capture(&frame, &crop)?)
    }

    pub fn classify(&self, sampled: &SampledImage) -> Result<ClassificationResult, CaptureError> {
        log::info!(
            "Submitting {}x{} capture for classification",
            sampled.photo.width(),
            sampled.photo.height()
        );
        Ok(self.classifier.classify(&sampled.encoded)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::classification::domain::classification_result::{
        LabelScore, LegacyClassification,
    };
    use crate::sampling::encoded_image::EncodedImage;
    use crate::shared::crop_rect::DEFAULT_ZOOM;
    use crate::transport::transport_error::TransportError;
    use crate::video::infrastructure::still_image_source::StillImageSource;

    /// Answers every request with a clone of one canned response.
    pub(crate) struct StubClassifier {
        response: Mutex<Result<ClassificationResult, String>>,
        pub calls: AtomicUsize,
        pub last_image: Mutex<Option<EncodedImage>>,
    }

    impl StubClassifier {
        pub(crate) fn answering(result: ClassificationResult) -> Self {
            Self {
                response: Mutex::new(Ok(result)),
                calls: AtomicUsize::new(0),
                last_image: Mutex::new(None),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                response: Mutex::new(Err(message.to_string())),
                calls: AtomicUsize::new(0),
                last_image: Mutex::new(None),
            }
        }
    }

    impl ClassificationClient for StubClassifier {
        fn classify(&self, image: &EncodedImage) -> Result<ClassificationResult, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_image.lock().unwrap() = Some(image.clone());
            match &*self.response.lock().unwrap() {
                Ok(result) => Ok(result.clone()),
                Err(message) => Err(TransportError::Server {
                    message: message.clone(),
                }),
            }
        }
    }

    pub(crate) fn legacy(labels: &[(&str, f64)]) -> ClassificationResult {
        ClassificationResult::Legacy(LegacyClassification {
            classes: labels
                .iter()
                .map(|(label, probability)| LabelScore {
                    label: label.to_string(),
                    probability: *probability,
                })
                .collect(),
        })
    }

    fn use_case(
        started: bool,
        classifier: Arc<StubClassifier>,
    ) -> (ClassifyFrameUseCase, Arc<StreamState>) {
        let source = StillImageSource::from_frame(Frame::filled(640, 480, [200, 10, 10]));
        if started {
            source.start().unwrap();
        }
        let stream = Arc::new(StreamState::new(DEFAULT_ZOOM));
        let use_case = ClassifyFrameUseCase::new(
            Arc::new(source),
            stream.clone(),
            Arc::new(SamplingBuffer::new(224)),
            classifier,
        );
        (use_case, stream)
    }

    #[test]
    fn test_classifies_sampled_crop() {
        let classifier = Arc::new(StubClassifier::answering(legacy(&[("3001", 87.5)])));
        let (use_case, stream) = use_case(true, classifier.clone());

        let capture = use_case.execute().unwrap();

        assert_eq!((capture.photo.width(), capture.photo.height()), (224, 224));
        assert_eq!(capture.photo.pixel(112, 112), Some([200, 10, 10]));
        assert_eq!(capture.result, legacy(&[("3001", 87.5)]));
        assert!(stream.crop().is_some());

        let sent = classifier.last_image.lock().unwrap().clone().unwrap();
        let decoded = sent.decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (224, 224));
    }

    #[test]
    fn test_capture_before_streaming_is_geometry_error() {
        let classifier = Arc::new(StubClassifier::answering(legacy(&[])));
        let (use_case, _) = use_case(false, classifier.clone());

        let err = use_case.execute().unwrap_err();

        assert!(matches!(err, CaptureError::Geometry(_)));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backend_failure_is_transport_error() {
        let classifier = Arc::new(StubClassifier::failing("Error processing image"));
        let (use_case, _) = use_case(true, classifier);

        let err = use_case.execute().unwrap_err();

        assert!(matches!(err, CaptureError::Transport(TransportError::Server { .. })));
        assert!(err.to_string().contains("Error processing image"));
    }
}
