use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::detection::domain::bounding_box_set::BoundingBoxSet;
use crate::detection::domain::detection_client::DetectionClient;
use crate::sampling::encoded_image::{EncodeError, EncodedImage};
use crate::sampling::sampling_buffer::SamplingBuffer;
use crate::shared::stream_state::StreamState;
use crate::video::domain::video_source::VideoSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Sampling,
    AwaitingResponse,
    Updating,
}

/// User-controlled detection switch.
///
/// Every enable starts a new generation; a loop only continues while
/// detection is on and its own generation is the current one, so a loop left
/// over from before a quick off/on toggle winds down instead of running
/// alongside its replacement.
#[derive(Default)]
pub struct DetectionToggle {
    enabled: AtomicBool,
    generation: AtomicU64,
    transition: Mutex<()>,
}

impl DetectionToggle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Returns the new generation, or `None` if detection was already on.
    /// Of several racing callers exactly one gets a generation.
    pub fn enable(&self) -> Option<u64> {
        let _guard = self.transition.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_enabled() {
            return None;
        }
        // Bump first: a stale loop must never observe `enabled` together
        // with its own generation.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.enabled.store(true, Ordering::SeqCst);
        Some(generation)
    }

    /// Returns whether detection was on.
    pub fn disable(&self) -> bool {
        self.enabled.swap(false, Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_enabled() && self.generation() == generation
    }
}

/// Counters shared by every loop generation of a session.
#[derive(Default)]
pub struct LoopStats {
    requests: AtomicUsize,
    updates: AtomicUsize,
    failures: AtomicUsize,
    discarded: AtomicUsize,
    skipped: AtomicUsize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStatsSnapshot {
    /// Detect requests issued.
    pub requests: usize,
    /// Responses that replaced the box set.
    pub updates: usize,
    /// Iterations that failed to sample, encode or reach the backend.
    pub failures: usize,
    /// Responses dropped because detection was re-enabled meanwhile.
    pub discarded: usize,
    /// Iterations skipped because the stream had no playable frame yet.
    pub skipped: usize,
}

impl LoopStats {
    pub fn snapshot(&self) -> LoopStatsSnapshot {
        LoopStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything a loop reads or writes, owned by the capture session.
#[derive(Clone)]
pub struct DetectionContext {
    pub source: Arc<dyn VideoSource>,
    pub stream: Arc<StreamState>,
    pub buffer: Arc<SamplingBuffer>,
    pub client: Arc<dyn DetectionClient>,
    pub boxes: BoundingBoxSet,
    pub toggle: Arc<DetectionToggle>,
    /// Held from sampling until the box set is updated; at most one detect
    /// request is outstanding across all generations.
    pub in_flight: Arc<Mutex<()>>,
    pub stats: Arc<LoopStats>,
}

/// Polling cycle: sample → detect → replace boxes → yield → repeat.
///
/// The continuation check happens once, at the top of each iteration. A
/// request in flight is never abandoned; disabling detection only prevents
/// the next one.
pub struct DetectionLoop {
    ctx: DetectionContext,
    generation: u64,
    yield_interval: Duration,
    state: LoopState,
}

impl DetectionLoop {
    pub fn new(ctx: DetectionContext, generation: u64, yield_interval: Duration) -> Self {
        Self {
            ctx,
            generation,
            yield_interval,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Runs one full cycle and returns `Running` to continue or `Idle` once
    /// the loop should exit.
    pub fn run_iteration(&mut self) -> LoopState {
        if !self.should_continue() {
            return self.enter(LoopState::Idle);
        }
        self.enter(LoopState::Running);

        let in_flight = self.ctx.in_flight.clone();
        let _permit = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // The permit may have been held by a stale generation while the
        // toggle changed.
        if !self.should_continue() {
            return self.enter(LoopState::Idle);
        }

        self.enter(LoopState::Sampling);
        let image = match self.sample() {
            Ok(Some(image)) => image,
            Ok(None) => {
                LoopStats::bump(&self.ctx.stats.skipped);
                return self.enter(LoopState::Running);
            }
            Err(e) => {
                log::warn!("Detection sample failed: {e}");
                LoopStats::bump(&self.ctx.stats.failures);
                return self.enter(LoopState::Running);
            }
        };

        self.enter(LoopState::AwaitingResponse);
        LoopStats::bump(&self.ctx.stats.requests);
        let response = self.ctx.client.detect(&image);

        self.enter(LoopState::Updating);
        match response {
            Ok(boxes) if self.ctx.toggle.generation() == self.generation => {
                log::debug!("Detection generation {}: {} boxes", self.generation, boxes.len());
                self.ctx.boxes.replace(boxes);
                LoopStats::bump(&self.ctx.stats.updates);
            }
            Ok(_) => {
                log::debug!(
                    "Dropping response of stale detection generation {}",
                    self.generation
                );
                LoopStats::bump(&self.ctx.stats.discarded);
            }
            Err(e) => {
                log::warn!("Detection request failed, keeping previous boxes: {e}");
                LoopStats::bump(&self.ctx.stats.failures);
            }
        }

        self.enter(LoopState::Running)
    }

    /// Drives iterations until the loop goes idle, pausing briefly between
    /// them so the render loop and user actions get the CPU.
    pub fn run(mut self) {
        log::info!("Detection loop generation {} started", self.generation);
        while self.run_iteration() != LoopState::Idle {
            thread::sleep(self.yield_interval);
        }
        log::info!("Detection loop generation {} stopped", self.generation);
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("detection-loop-{}", self.generation))
            .spawn(move || self.run())
    }

    fn should_continue(&self) -> bool {
        self.ctx.toggle.is_current(self.generation)
    }

    fn enter(&mut self, state: LoopState) -> LoopState {
        log::trace!(
            "Detection generation {}: {:?} -> {:?}",
            self.generation,
            self.state,
            state
        );
        self.state = state;
        state
    }

    fn sample(&self) -> Result<Option<EncodedImage>, EncodeError> {
        let Some(frame) = self.ctx.source.current_frame() else {
            return Ok(None);
        };
        let Ok(crop) = self
            .ctx
            .stream
            .on_playable_frame(frame.width(), frame.height())
        else {
            return Ok(None);
        };
        let sampled = self.ctx.buffer.capture(&frame, &crop)?;
        Ok(Some(sampled.encoded))
    }
}
