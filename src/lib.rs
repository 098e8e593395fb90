pub mod camera;
pub mod clipboard;
pub mod config;
pub mod decode;
pub mod error;
pub mod events;
pub mod frame;
pub mod image_input;
pub mod input;
pub mod results;
pub mod ring_buffer;
pub mod scanner;
pub mod session;
pub mod view;

pub use camera::{CameraInterface, CameraInterfaceBuilder};
pub use clipboard::{ClipboardProvider, MockClipboard, NullClipboard, SystemClipboard};
pub use config::{QrScanConfig, ScanMode};
pub use decode::{DecodeOutcome, QrDecoder};
pub use error::{QrScanError, Result};
pub use events::{EventBus, ScanEvent, ScanSource, UiCommand};
pub use frame::{FrameData, PixelFormat};
pub use image_input::{FileScanOutcome, ImageFileScanner};
pub use input::KeyboardInputHandler;
pub use results::{display_value, ResultEntry, ResultStore};
pub use ring_buffer::RingBuffer;
pub use scanner::{create_scanner, FrameScanner, PullScanner, PushScanner, ScanThrottle};
pub use session::{ScannerSession, ShutdownReason};
pub use view::{ResultsView, ViewMode};
