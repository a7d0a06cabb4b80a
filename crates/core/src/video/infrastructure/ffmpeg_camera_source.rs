use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;

use crate::shared::frame::Frame;
use crate::video::domain::video_source::VideoSource;

type StartError = Box<dyn std::error::Error + Send + Sync>;

/// Live frames from a capture device, stream URL or video file via
/// ffmpeg-next (libavdevice + libavformat + libavcodec).
///
/// A background thread decodes to RGB24 and publishes only the most recent
/// frame; slow readers skip frames instead of queueing them.
pub struct FfmpegCameraSource {
    input: String,
    latest: Arc<RwLock<Option<Arc<Frame>>>>,
    stopped: Arc<AtomicBool>,
    decoder_thread: Mutex<Option<JoinHandle<()>>>,
}

impl FfmpegCameraSource {
    /// `input` is anything ffmpeg can open: `/dev/video0`, `rtsp://...`,
    /// or a file path.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            latest: Arc::new(RwLock::new(None)),
            stopped: Arc::new(AtomicBool::new(false)),
            decoder_thread: Mutex::new(None),
        }
    }
}

impl VideoSource for FfmpegCameraSource {
    fn start(&self) -> Result<(), StartError> {
        let (opened_tx, opened_rx) = bounded::<Result<(u32, u32), String>>(1);
        let input = self.input.clone();
        let latest = self.latest.clone();
        let stopped = self.stopped.clone();
        stopped.store(false, Ordering::Relaxed);

        let handle = thread::Builder::new()
            .name("camera-decoder".into())
            .spawn(move || {
                let mut stream = match CameraStream::open(&input) {
                    Ok(stream) => {
                        let _ = opened_tx.send(Ok((stream.width, stream.height)));
                        stream
                    }
                    Err(e) => {
                        let _ = opened_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                if let Err(e) = stream.pump(&latest, &stopped) {
                    log::error!("Camera stream {input} failed: {e}");
                }
                log::info!("Camera stream {input} ended");
            })?;

        match opened_rx.recv() {
            Ok(Ok((width, height))) => {
                log::info!("Opened camera {} ({width}x{height})", self.input);
                *self
                    .decoder_thread
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            }
            Ok(Err(message)) => {
                let _ = handle.join();
                Err(format!("cannot open camera {}: {message}", self.input).into())
            }
            Err(_) => {
                let _ = handle.join();
                Err(format!("camera thread for {} exited before opening", self.input).into())
            }
        }
    }

    fn current_frame(&self) -> Option<Arc<Frame>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        let handle = self
            .decoder_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Camera decoder thread panicked");
            }
        }
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Drop for FfmpegCameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decoder state owned by the camera thread; ffmpeg contexts never cross
/// threads.
struct CameraStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    width: u32,
    height: u32,
    frame_interval: Option<Duration>,
}

impl CameraStream {
    fn open(input: &str) -> Result<Self, ffmpeg_next::Error> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let ictx = ffmpeg_next::format::input(&input)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(ffmpeg_next::Error::StreamNotFound)?;

        let video_stream_index = stream.index();
        let rate = stream.avg_frame_rate();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        // Files decode faster than real time; pace them like a live device.
        let frame_interval = (rate.numerator() > 0 && rate.denominator() > 0)
            .then(|| Duration::from_secs_f64(rate.denominator() as f64 / rate.numerator() as f64));

        Ok(Self {
            ictx,
            decoder,
            scaler,
            video_stream_index,
            width,
            height,
            frame_interval,
        })
    }

    fn pump(
        &mut self,
        latest: &RwLock<Option<Arc<Frame>>>,
        stopped: &AtomicBool,
    ) -> Result<(), ffmpeg_next::Error> {
        let mut frame_index = 0usize;
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();

        for (stream, packet) in self.ictx.packets() {
            if stopped.load(Ordering::Relaxed) {
                break;
            }
            if stream.index() != self.video_stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                self.scaler.run(&decoded, &mut rgb_frame)?;
                let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
                let frame = Frame::new(pixels, self.width, self.height, frame_index);
                frame_index += 1;
                *latest.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(frame));

                if let Some(interval) = self.frame_interval {
                    thread::sleep(interval);
                }
            }
        }
        Ok(())
    }
}

fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * Frame::CHANNELS;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}
