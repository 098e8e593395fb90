use crate::camera::{enumerate_devices, requested_format, select_device};
use crate::config::{CameraConfig, ScanMode, ScannerConfig};
use crate::decode::{DecodeOutcome, QrDecoder};
use crate::error::{CameraError, Result};
use crate::events::{EventBus, ScanEvent, ScanSource};
use crate::frame::{FrameData, PixelFormat};
use crate::ring_buffer::RingBuffer;
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::CameraIndex;
use nokhwa::CallbackCamera;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cadence of the pull-mode polling loop. Decode attempts are further
/// gated by [`ScanThrottle`], so this only bounds re-schedule latency.
const POLL_TICK: Duration = Duration::from_millis(16);

/// Minimum-interval gate for pull-mode decode attempts.
///
/// Ticks arriving before the interval has elapsed re-schedule without
/// decoding, bounding CPU cost independently of the tick rate.
pub struct ScanThrottle {
    interval: Duration,
    last_attempt: Option<Instant>,
}

impl ScanThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    /// Whether enough time has passed since the last recorded attempt
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_attempt {
            Some(last) => now.duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Record that a decode attempt happened at `now`
    pub fn mark(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }
}

/// One decode attempt against a frame, publishing a detection on success.
///
/// Not-found is silently ignored; a genuine decode failure is logged and
/// never halts the loop. Returns true if a detection was published.
fn attempt_frame(decoder: &QrDecoder, frame: &FrameData, event_bus: &EventBus) -> bool {
    match decoder.decode_frame(frame) {
        DecodeOutcome::Decoded(text) => {
            if let Err(e) = event_bus.publish(ScanEvent::CodeDetected {
                text,
                source: ScanSource::Camera,
                timestamp: SystemTime::now(),
            }) {
                debug!("Detection not delivered: {}", e);
            }
            true
        }
        DecodeOutcome::NotFound => false,
        DecodeOutcome::Failed { details } => {
            debug!("Frame decode failed: {}", details);
            false
        }
    }
}

/// A continuously running decode loop over live camera frames.
///
/// Both implementations share one observable contract: attempt to decode a
/// QR code from the live stream and publish every successful decode; the
/// result store downstream is what makes each distinct value appear once.
#[async_trait]
pub trait FrameScanner: Send {
    /// Start the decode loop
    async fn start(&mut self) -> Result<()>;

    /// Stop the decode loop and release whatever it holds on the stream
    async fn stop(&mut self);

    /// Whether the loop is currently running
    fn is_running(&self) -> bool;

    /// Which strategy this scanner implements
    fn mode(&self) -> ScanMode;
}

/// Construct the configured scanner implementation.
///
/// Pull mode polls `ring_buffer` (the caller is responsible for starting
/// camera capture into it); push mode acquires its own callback stream.
pub fn create_scanner(
    scanner_config: ScannerConfig,
    camera_config: CameraConfig,
    ring_buffer: Arc<RingBuffer>,
    event_bus: Arc<EventBus>,
) -> Box<dyn FrameScanner> {
    match scanner_config.mode {
        ScanMode::Pull => Box::new(PullScanner::new(scanner_config, ring_buffer, event_bus)),
        ScanMode::Push => Box::new(PushScanner::new(scanner_config, camera_config, event_bus)),
    }
}

/// Pull-mode scanner: a self-rescheduling polling task grabs the latest
/// buffered frame and runs a synchronous single-shot decode, throttled to
/// the configured minimum interval.
pub struct PullScanner {
    config: ScannerConfig,
    decoder: Arc<QrDecoder>,
    ring_buffer: Arc<RingBuffer>,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
    poll_task: Option<JoinHandle<()>>,
}

impl PullScanner {
    pub fn new(
        config: ScannerConfig,
        ring_buffer: Arc<RingBuffer>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let decoder = Arc::new(QrDecoder::new(&config));
        Self {
            config,
            decoder,
            ring_buffer,
            event_bus,
            cancel: CancellationToken::new(),
            poll_task: None,
        }
    }
}

#[async_trait]
impl FrameScanner for PullScanner {
    async fn start(&mut self) -> Result<()> {
        if self.poll_task.is_some() {
            warn!("Pull scanner is already running");
            return Ok(());
        }

        info!(
            "Starting pull-mode scan loop ({}ms minimum interval)",
            self.config.scan_interval_ms
        );

        let decoder = Arc::clone(&self.decoder);
        let ring_buffer = Arc::clone(&self.ring_buffer);
        let event_bus = Arc::clone(&self.event_bus);
        let token = self.cancel.clone();
        let mut throttle = ScanThrottle::new(Duration::from_millis(self.config.scan_interval_ms));

        let poll_task = tokio::spawn(async move {
            let mut last_frame_id = None;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(POLL_TICK) => {}
                }

                // Too soon since the last attempt: re-schedule only
                if !throttle.ready(Instant::now()) {
                    continue;
                }

                // Decode only when the buffer actually holds a new frame
                let Some(frame) = ring_buffer.latest_frame().await else {
                    continue;
                };
                if last_frame_id == Some(frame.id) {
                    continue;
                }
                last_frame_id = Some(frame.id);

                throttle.mark(Instant::now());
                attempt_frame(&decoder, &frame, &event_bus);
            }

            debug!("Pull-mode scan loop stopped");
        });

        self.poll_task = Some(poll_task);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            info!("Stopping pull-mode scan loop");
            self.cancel.cancel();
            let _ = task.await;
        }
    }

    fn is_running(&self) -> bool {
        self.poll_task.is_some()
    }

    fn mode(&self) -> ScanMode {
        ScanMode::Pull
    }
}

/// Push-mode scanner: hands a per-frame callback to the camera library's
/// own threaded capture loop. The loop's rhythm is opaque to this code;
/// stopping requires an explicit stream reset to release the device.
pub struct PushScanner {
    camera_config: CameraConfig,
    decoder: Arc<QrDecoder>,
    event_bus: Arc<EventBus>,
    camera: Option<CallbackCamera>,
}

impl PushScanner {
    pub fn new(
        scanner_config: ScannerConfig,
        camera_config: CameraConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let decoder = Arc::new(QrDecoder::new(&scanner_config));
        Self {
            camera_config,
            decoder,
            event_bus,
            camera: None,
        }
    }

    /// Build a fresh per-frame callback.
    ///
    /// Needed twice because a failed preferred-device attempt consumes the
    /// closure handed to the camera library.
    fn build_callback(&self) -> impl FnMut(nokhwa::Buffer) + Send + 'static {
        let decoder = Arc::clone(&self.decoder);
        let event_bus = Arc::clone(&self.event_bus);
        let frame_counter = Arc::new(AtomicU64::new(0));

        move |buffer| {
            let decoded = match buffer.decode_image::<RgbFormat>() {
                Ok(image) => image,
                Err(e) => {
                    warn!("Frame decode error: {}", e);
                    return;
                }
            };

            let width = decoded.width();
            let height = decoded.height();
            let frame = FrameData::new(
                frame_counter.fetch_add(1, Ordering::Relaxed),
                SystemTime::now(),
                decoded.into_raw(),
                width,
                height,
                PixelFormat::Rgb24,
            );

            attempt_frame(&decoder, &frame, &event_bus);
        }
    }

    fn open_callback_camera(&self, index: CameraIndex) -> Result<CallbackCamera> {
        let mut camera = CallbackCamera::new(
            index.clone(),
            requested_format(&self.camera_config),
            self.build_callback(),
        )
        .map_err(|e| CameraError::DeviceOpen {
            device: format!("{:?}", index),
            details: e.to_string(),
        })?;

        camera
            .open_stream()
            .map_err(|e| CameraError::StreamRequest {
                details: e.to_string(),
            })?;

        Ok(camera)
    }
}

#[async_trait]
impl FrameScanner for PushScanner {
    async fn start(&mut self) -> Result<()> {
        if self.camera.is_some() {
            warn!("Push scanner is already running");
            return Ok(());
        }

        let devices = enumerate_devices()?;
        let preferred = select_device(&self.camera_config, &devices);
        info!(
            "Starting push-mode scanner on device {:?} ({}x{} requested)",
            preferred, self.camera_config.resolution.0, self.camera_config.resolution.1
        );

        let mut camera = match self.open_callback_camera(preferred.clone()) {
            Ok(camera) => camera,
            Err(e) => {
                warn!(
                    "Failed to open preferred device {:?}, falling back to default: {}",
                    preferred, e
                );
                self.open_callback_camera(CameraIndex::Index(0))?
            }
        };

        if let Ok(format) = camera.camera_format() {
            info!(
                "Push-mode stream active at {}x{}",
                format.resolution().width(),
                format.resolution().height()
            );
        }

        self.camera = Some(camera);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            info!("Stopping push-mode scanner");
            if let Err(e) = camera.stop_stream() {
                warn!("Failed to stop callback stream: {}", e);
            }
        }
    }

    fn is_running(&self) -> bool {
        self.camera.is_some()
    }

    fn mode(&self) -> ScanMode {
        ScanMode::Push
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QrScanConfig;

    #[test]
    fn test_throttle_first_attempt_is_ready() {
        let throttle = ScanThrottle::new(Duration::from_millis(100));
        assert!(throttle.ready(Instant::now()));
    }

    #[test]
    fn test_throttle_gates_fast_ticks() {
        let interval = Duration::from_millis(100);
        let mut throttle = ScanThrottle::new(interval);
        let start = Instant::now();

        // Simulate one second of ~60Hz ticks
        let mut attempts = 0;
        for tick in 0..60 {
            let now = start + Duration::from_millis(tick * 16);
            if throttle.ready(now) {
                throttle.mark(now);
                attempts += 1;
            }
        }

        // 960ms of ticks at a 100ms floor allows at most 10 attempts
        assert!(attempts <= 10, "{} attempts exceeded throttle", attempts);
        assert!(attempts >= 9);
    }

    #[test]
    fn test_throttle_ready_again_after_interval() {
        let mut throttle = ScanThrottle::new(Duration::from_millis(100));
        let start = Instant::now();
        throttle.mark(start);
        assert!(!throttle.ready(start + Duration::from_millis(50)));
        assert!(throttle.ready(start + Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_pull_scanner_lifecycle() {
        let config = QrScanConfig::default();
        let ring_buffer = Arc::new(RingBuffer::new(4));
        let event_bus = Arc::new(EventBus::new(16));
        let mut scanner =
            PullScanner::new(config.scanner.clone(), ring_buffer, event_bus);

        assert!(!scanner.is_running());
        scanner.start().await.unwrap();
        assert!(scanner.is_running());
        assert_eq!(scanner.mode(), ScanMode::Pull);
        scanner.stop().await;
        assert!(!scanner.is_running());
    }

    #[tokio::test]
    async fn test_pull_scanner_publishes_decoded_frame() {
        // Render a QR code into a frame the polling loop can pick up
        const MODULE_PX: usize = 8;
        const QUIET_MODULES: usize = 4;
        let code = qrcode::QrCode::new(b"pull-mode").unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let size = (modules + 2 * QUIET_MODULES) * MODULE_PX;
        let mut luma = vec![255u8; size * size];
        for (i, color) in colors.iter().enumerate() {
            if *color == qrcode::Color::Dark {
                let mx = i % modules + QUIET_MODULES;
                let my = i / modules + QUIET_MODULES;
                for dy in 0..MODULE_PX {
                    for dx in 0..MODULE_PX {
                        luma[(my * MODULE_PX + dy) * size + mx * MODULE_PX + dx] = 0;
                    }
                }
            }
        }
        let frame = FrameData::new(
            7,
            SystemTime::now(),
            luma,
            size as u32,
            size as u32,
            PixelFormat::Luma8,
        );

        let config = QrScanConfig::default();
        let ring_buffer = Arc::new(RingBuffer::new(4));
        let event_bus = Arc::new(EventBus::new(16));
        let mut rx = event_bus.subscribe();
        ring_buffer.push_frame(frame).await;

        let mut scanner = PullScanner::new(
            config.scanner.clone(),
            Arc::clone(&ring_buffer),
            Arc::clone(&event_bus),
        );
        scanner.start().await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("expected a detection within the timeout")
            .unwrap();
        match event {
            ScanEvent::CodeDetected { text, source, .. } => {
                assert_eq!(text, "pull-mode");
                assert_eq!(source, ScanSource::Camera);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        scanner.stop().await;
    }
}
