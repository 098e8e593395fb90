use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Where a decoded value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanSource {
    /// Decoded from the live camera stream
    Camera,
    /// Decoded from an image file
    File,
}

/// User-interface commands emitted by the keyboard handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiCommand {
    /// Move row selection down (towards older entries)
    SelectNext,
    /// Move row selection up (towards newer entries)
    SelectPrevious,
    /// Copy the selected row's display value
    CopySelected,
    /// Delete the selected row
    DeleteSelected,
    /// Copy all displayed values joined with newlines
    CopyAll,
    /// Remove every row
    ClearAll,
    /// The file-path entry buffer changed (shown in the prompt)
    FileEntryUpdated(String),
    /// File-path entry was dismissed without submitting
    FileEntryCancelled,
    /// Scan the given image files
    ScanFiles(Vec<PathBuf>),
}

/// Events that can occur in the scanner system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// The decoder produced a value from a frame or file
    CodeDetected {
        text: String,
        source: ScanSource,
        timestamp: SystemTime,
    },
    /// Camera connection status changed
    CameraStatusChanged {
        connected: bool,
        timestamp: SystemTime,
    },
    /// A user-interface command was issued
    Command {
        command: UiCommand,
        timestamp: SystemTime,
    },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl ScanEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            ScanEvent::CodeDetected { timestamp, .. } => *timestamp,
            ScanEvent::CameraStatusChanged { timestamp, .. } => *timestamp,
            ScanEvent::Command { timestamp, .. } => *timestamp,
            ScanEvent::SystemError { .. } => SystemTime::now(),
            ScanEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ScanEvent::CodeDetected { text, source, .. } => {
                format!("Code detected via {:?}: {} chars", source, text.len())
            }
            ScanEvent::CameraStatusChanged { connected, .. } => {
                format!(
                    "Camera {}",
                    if *connected { "connected" } else { "disconnected" }
                )
            }
            ScanEvent::Command { command, .. } => format!("Command: {:?}", command),
            ScanEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            ScanEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::CodeDetected { .. } => "code_detected",
            ScanEvent::CameraStatusChanged { .. } => "camera_status_changed",
            ScanEvent::Command { .. } => "command",
            ScanEvent::SystemError { .. } => "system_error",
            ScanEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels.
///
/// The bus is the single ordering point between the scanner rhythms and the
/// session loop: decode results are applied in publication order.
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: ScanEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        // Log important events at appropriate levels
        match &event {
            ScanEvent::CodeDetected { source, .. } => {
                // Repeats every frame while a code is in view; the session
                // logs first sightings after dedup
                debug!("QR code detected via {:?}", source);
            }
            ScanEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            ScanEvent::CameraStatusChanged { connected, .. } => {
                if *connected {
                    info!("Camera connected");
                } else {
                    warn!("Camera disconnected");
                }
            }
            ScanEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}
