use std::sync::Arc;

use crate::shared::frame::Frame;

/// A live stream of frames, read by sampling the most recent one.
///
/// Implementations publish frames from their own producer; readers never
/// block on the stream and may see the same frame more than once.
pub trait VideoSource: Send + Sync {
    /// Acquires the device. Failure is terminal for the session.
    fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// The most recent decoded frame; `None` before the first playable frame.
    fn current_frame(&self) -> Option<Arc<Frame>>;

    /// Releases the device. Safe to call more than once.
    fn stop(&self);
}
