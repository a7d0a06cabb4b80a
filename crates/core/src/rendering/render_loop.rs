use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::rendering::domain::surface::Surface;
use crate::rendering::preview_renderer::{PreviewRenderer, RenderOutcome};

/// Owner of the perpetual preview refresh.
///
/// The loop runs one render step per interval until `stop` is called or the
/// handle is dropped; stopping wakes the loop immediately.
pub struct RenderLoopHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    frames_rendered: Arc<AtomicUsize>,
}

/// Starts the loop on a thread named `render-loop`.
pub fn spawn<S: Surface + 'static>(
    renderer: PreviewRenderer<S>,
    interval: Duration,
) -> io::Result<RenderLoopHandle> {
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let frames_rendered = Arc::new(AtomicUsize::new(0));
    let counter = frames_rendered.clone();

    let thread = thread::Builder::new().name("render-loop".into()).spawn(move || {
        log::debug!("Render loop started ({} ms interval)", interval.as_millis());
        loop {
            if let RenderOutcome::Rendered { .. } = renderer.render_step() {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::debug!("Render loop stopped");
    })?;

    Ok(RenderLoopHandle {
        stop_tx: Some(stop_tx),
        thread: Some(thread),
        frames_rendered,
    })
}

impl RenderLoopHandle {
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    /// Stops the loop and waits for the in-progress step to finish.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Render loop panicked");
            }
        }
    }
}

impl Drop for RenderLoopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    use crate::detection::domain::bounding_box_set::BoundingBoxSet;
    use crate::rendering::preview_renderer::tests::RecordingSurface;
    use crate::shared::crop_rect::DEFAULT_ZOOM;
    use crate::shared::frame::Frame;
    use crate::shared::stream_state::StreamState;
    use crate::video::domain::video_source::VideoSource;
    use crate::video::infrastructure::still_image_source::StillImageSource;

    fn spawn_loop(start_source: bool) -> (RenderLoopHandle, Arc<Mutex<RecordingSurface>>) {
        let source = StillImageSource::from_frame(Frame::filled(64, 64, [0, 0, 0]));
        if start_source {
            source.start().unwrap();
        }
        let surface = Arc::new(Mutex::new(RecordingSurface::new(100, 100)));
        let renderer = PreviewRenderer::new(
            Arc::new(source),
            Arc::new(StreamState::new(DEFAULT_ZOOM)),
            BoundingBoxSet::new(),
            surface.clone(),
            224,
        );
        (spawn(renderer, Duration::from_millis(1)).unwrap(), surface)
    }

    fn wait_until(deadline: Duration, cond: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn test_renders_repeatedly_until_stopped() {
        let (mut handle, surface) = spawn_loop(true);
        assert!(wait_until(Duration::from_secs(5), || handle.frames_rendered() >= 3));
        assert!(handle.is_running());

        handle.stop();
        assert!(!handle.is_running());
        let drawn = surface.lock().unwrap().regions.len();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(surface.lock().unwrap().regions.len(), drawn);
    }

    #[test]
    fn test_loop_runs_on_named_thread() {
        let source = StillImageSource::from_frame(Frame::filled(8, 8, [0, 0, 0]));
        let surface = Arc::new(Mutex::new(RecordingSurface::new(10, 10)));
        let renderer = PreviewRenderer::new(
            Arc::new(source),
            Arc::new(StreamState::new(DEFAULT_ZOOM)),
            BoundingBoxSet::new(),
            surface,
            224,
        );
        let handle = spawn(renderer, Duration::from_millis(1)).unwrap();

        let name = handle.thread.as_ref().and_then(|t| t.thread().name().map(str::to_owned));
        assert_eq!(name.as_deref(), Some("render-loop"));
    }

    #[test]
    fn test_waiting_steps_are_not_counted() {
        let (mut handle, _surface) = spawn_loop(false);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(handle.frames_rendered(), 0);
        handle.stop();
    }

    #[test]
    fn test_stop_is_idempotent_and_drop_safe() {
        let (mut handle, _surface) = spawn_loop(true);
        handle.stop();
        handle.stop();
        drop(handle);
    }
}
