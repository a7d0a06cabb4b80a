use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::capture::capture_error::CaptureError;
use crate::capture::classify_frame_use_case::{Capture, ClassifyFrameUseCase};
use crate::capture::result_display::ResultDisplay;
use crate::classification::domain::classification_client::ClassificationClient;
use crate::detection::detection_loop::{
    DetectionContext, DetectionLoop, DetectionToggle, LoopStats, LoopStatsSnapshot,
};
use crate::detection::domain::bounding_box_set::BoundingBoxSet;
use crate::detection::domain::detection_box::DetectionBox;
use crate::detection::domain::detection_client::DetectionClient;
use crate::rendering::domain::surface::Surface;
use crate::rendering::preview_renderer::PreviewRenderer;
use crate::rendering::render_loop::{self, RenderLoopHandle};
use crate::sampling::sampling_buffer::SamplingBuffer;
use crate::shared::config::ClientConfig;
use crate::shared::crop_rect::CropRect;
use crate::shared::stream_state::{StreamState, StreamingState};
use crate::transport::infrastructure::http_inference_client::HttpInferenceClient;
use crate::video::domain::video_source::VideoSource;

/// The two remote collaborators of a session.
#[derive(Clone)]
pub struct Backends {
    pub detector: Arc<dyn DetectionClient>,
    pub classifier: Arc<dyn ClassificationClient>,
}

impl Backends {
    pub fn http(client: Arc<HttpInferenceClient>) -> Self {
        Self {
            detector: client.clone(),
            classifier: client,
        }
    }
}

/// One camera session: live preview, optional continuous detection and
/// one-shot classification, sharing a single crop and sampling buffer.
///
/// Dropping the session stops detection, the render loop and the camera,
/// blocking like [`CaptureSession::shutdown`].
pub struct CaptureSession<S: Surface + 'static> {
    config: ClientConfig,
    source: Arc<dyn VideoSource>,
    stream: Arc<StreamState>,
    detection: DetectionContext,
    classify: ClassifyFrameUseCase,
    surface: Arc<Mutex<S>>,
    render_loop: Option<RenderLoopHandle>,
    detection_threads: Vec<JoinHandle<()>>,
}

impl<S: Surface + 'static> CaptureSession<S> {
    /// Acquires the camera and starts the preview. A camera that cannot be
    /// opened ends the session before it begins.
    pub fn start(
        config: ClientConfig,
        source: Arc<dyn VideoSource>,
        backends: Backends,
        surface: S,
    ) -> Result<Self, CaptureError> {
        source.start().map_err(CaptureError::Acquisition)?;

        let stream = Arc::new(StreamState::new(config.zoom));
        let boxes = BoundingBoxSet::new();
        let buffer = Arc::new(SamplingBuffer::new(config.detector_input_size));
        let surface = Arc::new(Mutex::new(surface));

        let renderer = PreviewRenderer::new(
            source.clone(),
            stream.clone(),
            boxes.clone(),
            surface.clone(),
            config.detector_input_size,
        );
        let render_loop = match render_loop::spawn(renderer, config.render_interval()) {
            Ok(handle) => handle,
            Err(e) => {
                source.stop();
                return Err(CaptureError::Thread {
                    name: "render",
                    source: e,
                });
            }
        };

        let detection = DetectionContext {
            source: source.clone(),
            stream: stream.clone(),
            buffer: buffer.clone(),
            client: backends.detector,
            boxes,
            toggle: Arc::new(DetectionToggle::new()),
            in_flight: Arc::new(Mutex::new(())),
            stats: Arc::new(LoopStats::default()),
        };
        let classify =
            ClassifyFrameUseCase::new(source.clone(), stream.clone(), buffer, backends.classifier);

        log::info!(
            "Capture session started (zoom {}, detector input {}px)",
            config.zoom,
            config.detector_input_size
        );

        Ok(Self {
            config,
            source,
            stream,
            detection,
            classify,
            surface,
            render_loop: Some(render_loop),
            detection_threads: Vec::new(),
        })
    }

    /// Every toggle clears the displayed boxes. Enabling starts a detection
    /// loop unless one is already running; disabling lets the in-flight
    /// request finish and stops scheduling new ones.
    pub fn set_detection_enabled(&mut self, enabled: bool) -> Result<(), CaptureError> {
        self.detection.boxes.clear();
        self.reap_finished_loops();

        if !enabled {
            if self.detection.toggle.disable() {
                log::info!("Detection disabled");
            }
            return Ok(());
        }

        let Some(generation) = self.detection.toggle.enable() else {
            return Ok(());
        };
        let detection_loop = DetectionLoop::new(
            self.detection.clone(),
            generation,
            self.config.detection_yield(),
        );
        match detection_loop.spawn() {
            Ok(handle) => {
                self.detection_threads.push(handle);
                Ok(())
            }
            Err(source) => {
                self.detection.toggle.disable();
                Err(CaptureError::Thread {
                    name: "detection",
                    source,
                })
            }
        }
    }

    pub fn is_detection_enabled(&self) -> bool {
        self.detection.toggle.is_enabled()
    }

    /// One-shot classification of the current crop.
    pub fn capture(&self) -> Result<Capture, CaptureError> {
        self.classify.execute()
    }

    /// Like [`capture`](Self::capture), but hands the photo, then the result
    /// or the error message, to `display`.
    pub fn capture_into(&self, display: &mut dyn ResultDisplay) -> Result<Capture, CaptureError> {
        let outcome = self.classify.sample().and_then(|sampled| {
            display.show_photo(&sampled.photo);
            let result = self.classify.classify(&sampled)?;
            display.show_result(&result);
            Ok(Capture {
                photo: sampled.photo,
                result,
            })
        });
        if let Err(e) = &outcome {
            log::warn!("Capture failed: {e}");
            display.show_error(&e.to_string());
        }
        outcome
    }

    pub fn boxes(&self) -> Arc<Vec<DetectionBox>> {
        self.detection.boxes.snapshot()
    }

    pub fn crop(&self) -> Option<CropRect> {
        self.stream.crop()
    }

    pub fn streaming_state(&self) -> StreamingState {
        self.stream.state()
    }

    pub fn detection_stats(&self) -> LoopStatsSnapshot {
        self.detection.stats.snapshot()
    }

    pub fn frames_rendered(&self) -> usize {
        self.render_loop
            .as_ref()
            .map_or(0, RenderLoopHandle::frames_rendered)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
        f(&surface)
    }

    /// Waits for every detection loop to exit. Only returns once detection
    /// has been disabled and the last in-flight request has completed.
    pub fn join_detection(&mut self) {
        for handle in self.detection_threads.drain(..) {
            if handle.join().is_err() {
                log::error!("Detection loop panicked");
            }
        }
    }

    /// Stops detection, then the render loop, then the camera.
    ///
    /// A detect request already in flight is never abandoned, so this blocks
    /// until it completes. With no `request_timeout_secs` configured that
    /// wait is unbounded against a backend that never answers.
    pub fn shutdown(&mut self) {
        let Some(mut render_loop) = self.render_loop.take() else {
            return;
        };
        self.detection.toggle.disable();
        self.join_detection();
        render_loop.stop();
        self.source.stop();
        log::info!(
            "Capture session stopped ({} frames rendered)",
            render_loop.frames_rendered()
        );
    }

    fn reap_finished_loops(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .detection_threads
            .drain(..)
            .partition(JoinHandle::is_finished);
        self.detection_threads = running;
        for handle in finished {
            if handle.join().is_err() {
                log::error!("Detection loop panicked");
            }
        }
    }
}

impl<S: Surface + 'static> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::{Duration, Instant};

    use approx::relative_eq;
    use crossbeam_channel::{unbounded, Receiver, Sender};

    use crate::capture::classify_frame_use_case::tests::{legacy, StubClassifier};
    use crate::classification::domain::classification_result::ClassificationResult;
    use crate::detection::detection_loop::tests::ScriptedDetector;
    use crate::rendering::preview_renderer::tests::RecordingSurface;
    use crate::sampling::encoded_image::EncodedImage;
    use crate::shared::constants::LEGACY_MIN_PROBABILITY;
    use crate::shared::frame::Frame;
    use crate::transport::transport_error::TransportError;
    use crate::video::infrastructure::still_image_source::StillImageSource;

    /// Each detect call blocks until the test releases a response.
    struct GatedDetector {
        release: Receiver<Vec<DetectionBox>>,
        calls: Sender<()>,
    }

    impl DetectionClient for GatedDetector {
        fn detect(&self, _image: &EncodedImage) -> Result<Vec<DetectionBox>, TransportError> {
            let _ = self.calls.send(());
            self.release.recv().map_err(|_| TransportError::Server {
                message: "gate closed".into(),
            })
        }
    }

    /// A camera that opens but never delivers a frame.
    struct BlankSource;

    impl VideoSource for BlankSource {
        fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }

        fn current_frame(&self) -> Option<Arc<Frame>> {
            None
        }

        fn stop(&self) {}
    }

    #[derive(Default)]
    struct RecordingDisplay {
        photos: usize,
        results: Vec<ClassificationResult>,
        errors: Vec<String>,
    }

    impl ResultDisplay for RecordingDisplay {
        fn show_photo(&mut self, _photo: &Frame) {
            self.photos += 1;
        }

        fn show_result(&mut self, result: &ClassificationResult) {
            self.results.push(result.clone());
        }

        fn show_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
    }

    fn fast_config() -> ClientConfig {
        ClientConfig {
            render_interval_ms: 1,
            ..ClientConfig::default()
        }
    }

    fn camera() -> Arc<dyn VideoSource> {
        Arc::new(StillImageSource::from_frame(Frame::filled(640, 480, [30, 60, 90])))
    }

    fn backends(detector: Arc<dyn DetectionClient>) -> Backends {
        Backends {
            detector,
            classifier: Arc::new(StubClassifier::answering(legacy(&[("3001", 90.0)]))),
        }
    }

    fn session(detector: Arc<dyn DetectionClient>) -> CaptureSession<RecordingSurface> {
        CaptureSession::start(
            fast_config(),
            camera(),
            backends(detector),
            RecordingSurface::new(400, 400),
        )
        .unwrap()
    }

    fn gated() -> (Arc<GatedDetector>, Sender<Vec<DetectionBox>>, Receiver<()>) {
        let (release_tx, release_rx) = unbounded();
        let (calls_tx, calls_rx) = unbounded();
        let detector = Arc::new(GatedDetector {
            release: release_rx,
            calls: calls_tx,
        });
        (detector, release_tx, calls_rx)
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    fn one_box() -> Vec<DetectionBox> {
        vec![DetectionBox::new(10.0, 10.0, 50.0, 50.0)]
    }

    #[test]
    fn test_unavailable_camera_fails_start() {
        let result = CaptureSession::start(
            fast_config(),
            Arc::new(StillImageSource::from_path("/no/such/camera.png")),
            backends(Arc::new(ScriptedDetector::new(vec![]))),
            RecordingSurface::new(400, 400),
        );
        assert!(matches!(result, Err(CaptureError::Acquisition(_))));
    }

    #[test]
    fn test_preview_starts_streaming_without_detection() {
        let session = session(Arc::new(ScriptedDetector::new(vec![])));
        assert!(wait_until(|| session.frames_rendered() > 0));
        assert_eq!(session.streaming_state(), StreamingState::Streaming);
        assert_eq!(session.crop(), CropRect::compute(640, 480, 4.0).ok());
        assert!(!session.is_detection_enabled());
        assert_eq!(session.detection_stats().requests, 0);
    }

    #[test]
    fn test_detection_overlay_reaches_preview() {
        let detector = Arc::new(ScriptedDetector::new(vec![Ok(one_box())]));
        let mut session = session(detector);
        session.set_detection_enabled(true).unwrap();

        let s = 400.0 / 224.0;
        let drawn = wait_until(|| {
            session.with_surface(|surface| {
                surface.strokes.iter().any(|(rect, _)| {
                    relative_eq!(rect.x, 10.0 * s)
                        && relative_eq!(rect.y, 10.0 * s)
                        && relative_eq!(rect.width, 50.0 * s)
                        && relative_eq!(rect.height, 50.0 * s)
                })
            })
        });
        assert!(drawn);
    }

    #[test]
    fn test_enabling_clears_boxes_before_first_response() {
        let (detector, release, calls) = gated();
        let mut session = session(detector);

        session.set_detection_enabled(true).unwrap();
        calls.recv_timeout(Duration::from_secs(5)).unwrap();
        release.send(one_box()).unwrap();
        assert!(wait_until(|| session.boxes().len() == 1));

        session.set_detection_enabled(false).unwrap();
        assert!(session.boxes().is_empty());
        session.set_detection_enabled(true).unwrap();
        assert!(session.boxes().is_empty());

        drop(release);
    }

    #[test]
    fn test_disable_mid_flight_updates_once_then_stops() {
        let (detector, release, calls) = gated();
        let mut session = session(detector);

        session.set_detection_enabled(true).unwrap();
        calls.recv_timeout(Duration::from_secs(5)).unwrap();
        session.set_detection_enabled(false).unwrap();
        assert!(session.boxes().is_empty());

        release.send(one_box()).unwrap();
        session.join_detection();

        assert_eq!(*session.boxes(), one_box());
        assert!(calls.try_recv().is_err());
        assert_eq!(session.detection_stats().requests, 1);
    }

    #[test]
    fn test_enable_twice_runs_one_loop() {
        let (detector, release, calls) = gated();
        let mut session = session(detector);

        session.set_detection_enabled(true).unwrap();
        session.set_detection_enabled(true).unwrap();
        calls.recv_timeout(Duration::from_secs(5)).unwrap();
        thread::sleep(Duration::from_millis(20));

        assert!(calls.try_recv().is_err());
        assert_eq!(session.detection_threads.len(), 1);
        drop(release);
    }

    #[test]
    fn test_rapid_toggling_keeps_one_request_in_flight() {
        let detector =
            Arc::new(ScriptedDetector::new(vec![]).with_delay(Duration::from_millis(2)));
        let mut session = session(detector.clone());

        for _ in 0..20 {
            session.set_detection_enabled(true).unwrap();
            thread::sleep(Duration::from_millis(1));
            session.set_detection_enabled(false).unwrap();
        }
        session.set_detection_enabled(true).unwrap();
        assert!(wait_until(|| detector.calls.load(Ordering::SeqCst) >= 3));
        session.set_detection_enabled(false).unwrap();
        session.join_detection();

        assert_eq!(detector.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_classification_shows_no_predictions_and_no_error() {
        let mut session = CaptureSession::start(
            fast_config(),
            camera(),
            Backends {
                detector: Arc::new(ScriptedDetector::new(vec![])),
                classifier: Arc::new(StubClassifier::answering(legacy(&[]))),
            },
            RecordingSurface::new(400, 400),
        )
        .unwrap();
        let mut display = RecordingDisplay::default();

        let capture = session.capture_into(&mut display).unwrap();

        assert_eq!(display.photos, 1);
        assert!(display.errors.is_empty());
        assert_eq!(display.results.len(), 1);
        assert!(capture.result.predictions(LEGACY_MIN_PROBABILITY).is_empty());
        session.shutdown();
    }

    #[test]
    fn test_capture_without_frame_reports_error() {
        let session = CaptureSession::start(
            fast_config(),
            Arc::new(BlankSource),
            backends(Arc::new(ScriptedDetector::new(vec![]))),
            RecordingSurface::new(400, 400),
        )
        .unwrap();
        let mut display = RecordingDisplay::default();

        let err = session.capture_into(&mut display).unwrap_err();

        assert!(matches!(err, CaptureError::Geometry(_)));
        assert_eq!(display.photos, 0);
        assert_eq!(display.errors.len(), 1);
        assert!(display.results.is_empty());
    }

    #[test]
    fn test_classify_failure_reaches_display() {
        let session = CaptureSession::start(
            fast_config(),
            camera(),
            Backends {
                detector: Arc::new(ScriptedDetector::new(vec![])),
                classifier: Arc::new(StubClassifier::failing("model offline")),
            },
            RecordingSurface::new(400, 400),
        )
        .unwrap();
        let mut display = RecordingDisplay::default();

        assert!(session.capture_into(&mut display).is_err());
        assert_eq!(display.photos, 1);
        assert!(display.errors[0].contains("model offline"));
    }

    #[test]
    fn test_capture_and_detection_share_crop() {
        let mut session = session(Arc::new(ScriptedDetector::new(vec![])));
        session.set_detection_enabled(true).unwrap();

        let capture = session.capture().unwrap();

        assert_eq!(capture.photo.width(), 224);
        assert_eq!(session.crop(), CropRect::compute(640, 480, 4.0).ok());
        session.shutdown();
        session.shutdown();
        assert!(!session.is_detection_enabled());
    }

    #[test]
    fn test_shutdown_waits_for_in_flight_request() {
        let (detector, release, calls) = gated();
        let mut session = session(detector);
        session.set_detection_enabled(true).unwrap();
        calls.recv_timeout(Duration::from_secs(5)).unwrap();

        let (done_tx, done_rx) = unbounded();
        let closer = thread::spawn(move || {
            session.shutdown();
            let _ = done_tx.send(session.detection_stats());
        });

        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        release.send(one_box()).unwrap();
        let stats = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.updates, 1);
        closer.join().unwrap();
    }
}
