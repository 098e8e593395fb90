use thiserror::Error;

#[derive(Error, Debug)]
pub enum QrScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("System error: {message}")]
    System { message: String },
}

impl QrScanError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Errors raised while acquiring or running the camera stream
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera API is not supported on this system: {details}")]
    Unsupported { details: String },

    #[error("No camera devices found")]
    NoDevices,

    #[error("Failed to open camera device {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Failed to request camera stream: {details}")]
    StreamRequest { details: String },

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },

    #[error("Camera capture stream error: {details}")]
    CaptureStream { details: String },
}

/// Errors raised by clipboard access
#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("Clipboard is unavailable: {details}")]
    Unavailable { details: String },

    #[error("Clipboard write failed: {details}")]
    WriteFailed { details: String },
}

/// Errors raised by the event bus
#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Failed to receive event: {details}")]
    ReceiveFailed { details: String },
}

pub type Result<T> = std::result::Result<T, QrScanError>;
