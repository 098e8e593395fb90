use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{FrameData, PixelFormat};
use crate::ring_buffer::RingBuffer;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
    RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Labels that mark a device as rear/environment-facing
const REAR_FACING_MARKERS: [&str; 4] = ["back", "rear", "environment", "world"];

/// Enumerate available video input devices.
///
/// A backend/query failure is the "camera unsupported" condition; an empty
/// device list is the "no camera" condition.
pub fn enumerate_devices() -> Result<Vec<CameraInfo>, CameraError> {
    let devices = nokhwa::query(ApiBackend::Auto).map_err(|e| CameraError::Unsupported {
        details: e.to_string(),
    })?;

    debug!("Found {} video input devices", devices.len());
    for device in &devices {
        debug!("  {:?}: {}", device.index(), device.human_name());
    }

    if devices.is_empty() {
        return Err(CameraError::NoDevices);
    }

    Ok(devices)
}

/// Pick the device to try first: an explicit index if configured, otherwise
/// a rear-facing device by label, otherwise the first enumerated device.
pub fn select_device(config: &CameraConfig, devices: &[CameraInfo]) -> CameraIndex {
    if let Some(index) = config.index {
        return CameraIndex::Index(index);
    }

    if config.prefer_rear_facing {
        if let Some(device) = devices
            .iter()
            .find(|d| is_rear_facing(&d.human_name()))
        {
            info!("Preferring rear-facing device: {}", device.human_name());
            return device.index().clone();
        }
    }

    devices
        .first()
        .map(|d| d.index().clone())
        .unwrap_or(CameraIndex::Index(0))
}

fn is_rear_facing(name: &str) -> bool {
    let name = name.to_lowercase();
    REAR_FACING_MARKERS.iter().any(|m| name.contains(m))
}

pub(crate) fn requested_format(config: &CameraConfig) -> RequestedFormat<'static> {
    let format = CameraFormat::new(
        Resolution::new(config.resolution.0, config.resolution.1),
        FrameFormat::MJPEG,
        config.max_fps,
    );
    RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format))
}

fn try_open(index: CameraIndex, config: &CameraConfig) -> Result<Camera, CameraError> {
    let mut camera =
        Camera::new(index.clone(), requested_format(config)).map_err(|e| {
            CameraError::DeviceOpen {
                device: format!("{:?}", index),
                details: e.to_string(),
            }
        })?;

    camera
        .open_stream()
        .map_err(|e| CameraError::StreamRequest {
            details: e.to_string(),
        })?;

    Ok(camera)
}

/// Open the preferred device, retrying once with the default device at the
/// same resolution if that fails.
fn open_with_fallback(
    config: &CameraConfig,
    preferred: CameraIndex,
) -> Result<Camera, CameraError> {
    match try_open(preferred.clone(), config) {
        Ok(camera) => Ok(camera),
        Err(e) => {
            warn!(
                "Failed to open preferred device {:?}, falling back to default: {}",
                preferred, e
            );
            try_open(CameraIndex::Index(0), config)
        }
    }
}

/// Camera acquisition and capture loop.
///
/// Owns the capture thread for the session's lifetime; `stop_capture`
/// releases the device. The stream itself lives on the blocking capture
/// thread because platform camera handles are not generally `Send`.
pub struct CameraInterface {
    config: CameraConfig,
    cancel: CancellationToken,
    is_running: Arc<AtomicBool>,
    capture_task: Option<JoinHandle<()>>,
    actual_resolution: Option<(u32, u32)>,
}

impl CameraInterface {
    /// Create a new camera interface with the given configuration
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            is_running: Arc::new(AtomicBool::new(false)),
            capture_task: None,
            actual_resolution: None,
        }
    }

    /// Acquire the camera and start feeding frames into the ring buffer.
    ///
    /// Returns once the device is open and streaming (or has failed both
    /// the preferred and the fallback attempt).
    pub async fn start_capture(
        &mut self,
        ring_buffer: Arc<RingBuffer>,
    ) -> Result<(), CameraError> {
        if self.is_running.load(Ordering::Relaxed) {
            warn!("Camera capture is already running");
            return Ok(());
        }

        let devices = enumerate_devices()?;
        let preferred = select_device(&self.config, &devices);
        info!(
            "Starting camera capture on device {:?} ({}x{} @ {}fps requested)",
            preferred, self.config.resolution.0, self.config.resolution.1, self.config.max_fps
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        let config = self.config.clone();
        let token = self.cancel.clone();
        let is_running = Arc::clone(&self.is_running);
        let handle = Handle::current();

        let capture_task = task::spawn_blocking(move || {
            capture_loop(config, preferred, ring_buffer, token, ready_tx, is_running, handle)
        });

        match ready_rx.await {
            Ok(Ok((width, height))) => {
                info!("Camera stream active at {}x{}", width, height);
                self.actual_resolution = Some((width, height));
                self.capture_task = Some(capture_task);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CameraError::CaptureStream {
                details: "capture thread exited before reporting status".to_string(),
            }),
        }
    }

    /// Stop capture and release the camera device
    pub async fn stop_capture(&mut self) {
        if !self.is_running.load(Ordering::Relaxed) && self.capture_task.is_none() {
            debug!("Camera capture is not running");
            return;
        }

        info!("Stopping camera capture");
        self.cancel.cancel();

        if let Some(task) = self.capture_task.take() {
            if tokio::time::timeout(Duration::from_secs(2), task)
                .await
                .is_err()
            {
                warn!("Capture thread did not stop within timeout");
            }
        }
    }

    /// Check if the camera is currently capturing
    pub fn is_capturing(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Negotiated stream resolution, once capture has started
    pub fn actual_resolution(&self) -> Option<(u32, u32)> {
        self.actual_resolution
    }

    /// Get camera configuration
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
}

/// Blocking capture loop: owns the camera handle, decodes each delivered
/// buffer to RGB and pushes it into the ring buffer until cancelled.
fn capture_loop(
    config: CameraConfig,
    preferred: CameraIndex,
    ring_buffer: Arc<RingBuffer>,
    token: CancellationToken,
    ready_tx: oneshot::Sender<Result<(u32, u32), CameraError>>,
    is_running: Arc<AtomicBool>,
    handle: Handle,
) {
    let mut camera = match open_with_fallback(&config, preferred) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let resolution = camera.resolution();
    let actual = (resolution.width(), resolution.height());
    is_running.store(true, Ordering::Relaxed);
    if ready_tx.send(Ok(actual)).is_err() {
        // Caller went away before capture started
        let _ = camera.stop_stream();
        is_running.store(false, Ordering::Relaxed);
        return;
    }

    debug!("Capture loop started");

    while !token.is_cancelled() {
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("Frame capture error: {}", e);
                std::thread::sleep(Duration::from_millis(100));
                continue;
            }
        };

        let decoded = match buffer.decode_image::<RgbFormat>() {
            Ok(image) => image,
            Err(e) => {
                warn!("Frame decode error: {}", e);
                continue;
            }
        };

        let width = decoded.width();
        let height = decoded.height();
        let frame = FrameData::new(
            ring_buffer.next_frame_id(),
            SystemTime::now(),
            decoded.into_raw(),
            width,
            height,
            PixelFormat::Rgb24,
        );

        handle.block_on(ring_buffer.push_frame(frame));
    }

    if let Err(e) = camera.stop_stream() {
        error!("Failed to stop camera stream: {}", e);
    }
    is_running.store(false, Ordering::Relaxed);
    debug!("Capture loop stopped, device released");
}

/// Camera interface builder for easier configuration
pub struct CameraInterfaceBuilder {
    config: Option<CameraConfig>,
}

impl CameraInterfaceBuilder {
    /// Create a new camera interface builder
    pub fn new() -> Self {
        Self { config: None }
    }

    /// Set camera configuration
    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the camera interface
    pub fn build(self) -> Result<CameraInterface, CameraError> {
        let config = self.config.ok_or(CameraError::Configuration {
            details: "Camera configuration must be specified".to_string(),
        })?;

        Ok(CameraInterface::new(config))
    }
}

impl Default for CameraInterfaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QrScanConfig;

    fn device(name: &str, index: u32) -> CameraInfo {
        CameraInfo::new(name, "test device", "", CameraIndex::Index(index))
    }

    #[test]
    fn test_rear_facing_markers() {
        assert!(is_rear_facing("Back Camera"));
        assert!(is_rear_facing("rear-facing webcam"));
        assert!(is_rear_facing("Environment cam"));
        assert!(!is_rear_facing("FaceTime HD Camera"));
    }

    #[test]
    fn test_explicit_index_wins() {
        let mut config = QrScanConfig::default().camera;
        config.index = Some(3);
        let devices = vec![device("Back Camera", 0)];
        assert_eq!(select_device(&config, &devices), CameraIndex::Index(3));
    }

    #[test]
    fn test_rear_facing_preferred() {
        let config = QrScanConfig::default().camera;
        let devices = vec![
            device("Front Camera", 0),
            device("Back Camera", 1),
        ];
        assert_eq!(select_device(&config, &devices), CameraIndex::Index(1));
    }

    #[test]
    fn test_first_device_when_no_rear_facing() {
        let config = QrScanConfig::default().camera;
        let devices = vec![device("Webcam A", 4), device("Webcam B", 5)];
        assert_eq!(select_device(&config, &devices), CameraIndex::Index(4));
    }

    #[test]
    fn test_rear_preference_can_be_disabled() {
        let mut config = QrScanConfig::default().camera;
        config.prefer_rear_facing = false;
        let devices = vec![
            device("Front Camera", 0),
            device("Back Camera", 1),
        ];
        assert_eq!(select_device(&config, &devices), CameraIndex::Index(0));
    }

    #[test]
    fn test_builder_requires_config() {
        assert!(CameraInterfaceBuilder::new().build().is_err());
        let camera = CameraInterfaceBuilder::new()
            .config(QrScanConfig::default().camera)
            .build()
            .unwrap();
        assert!(!camera.is_capturing());
    }
}
