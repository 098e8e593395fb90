use crate::camera::CameraInterface;
use crate::clipboard::{copy_best_effort, create_clipboard, ClipboardProvider};
use crate::config::{QrScanConfig, ScanMode};
use crate::error::Result;
use crate::events::{EventBus, ScanEvent, UiCommand};
use crate::image_input::ImageFileScanner;
use crate::input::KeyboardInputHandler;
use crate::results::ResultStore;
use crate::ring_buffer::RingBuffer;
use crate::scanner::{create_scanner, FrameScanner};
use crate::view::{ResultsView, ViewMode};
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Why the session ended
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest,
    Error(String),
}

/// The scanner session: owns every component for the lifetime of the page,
/// from camera acquisition to teardown.
///
/// All shared state (the result store, the view) is touched only from the
/// session's event loop; scanners and the keyboard handler communicate
/// through the event bus, which applies decode results in the order the
/// attempts completed.
pub struct ScannerSession {
    config: QrScanConfig,
    event_bus: Arc<EventBus>,
    ring_buffer: Arc<RingBuffer>,
    store: ResultStore,
    view: ResultsView,
    clipboard: Box<dyn ClipboardProvider>,
    camera: CameraInterface,
    scanner: Box<dyn FrameScanner>,
    file_scanner: ImageFileScanner,
    keyboard: KeyboardInputHandler,
    events_rx: Option<broadcast::Receiver<ScanEvent>>,
    alternate_screen: bool,
}

impl ScannerSession {
    /// Construct all components from configuration. Nothing touches the
    /// camera or the terminal until [`start`](Self::start).
    pub fn new(config: QrScanConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let ring_buffer = Arc::new(RingBuffer::new(config.system.ring_buffer_capacity));

        // Subscribe before anything can publish so no event is dropped
        let events_rx = event_bus.subscribe();

        let scanner = create_scanner(
            config.scanner.clone(),
            config.camera.clone(),
            Arc::clone(&ring_buffer),
            Arc::clone(&event_bus),
        );

        Self {
            store: ResultStore::new(),
            view: ResultsView::new(&config.results),
            clipboard: create_clipboard(config.results.clipboard),
            camera: CameraInterface::new(config.camera.clone()),
            file_scanner: ImageFileScanner::new(&config.scanner),
            keyboard: KeyboardInputHandler::new(Arc::clone(&event_bus)),
            scanner,
            events_rx: Some(events_rx),
            alternate_screen: false,
            config,
            event_bus,
            ring_buffer,
        }
    }

    /// Start the session: keyboard, terminal, then camera and scanner.
    ///
    /// A camera failure is not fatal - the session switches the view to the
    /// camera-error state and continues with file input as the fallback.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting scanner session ({:?} mode)", self.config.scanner.mode);

        self.keyboard.start().await?;

        if execute!(io::stdout(), EnterAlternateScreen, Hide).is_ok() {
            self.alternate_screen = true;
        }

        match self.start_scanning().await {
            Ok(()) => {
                self.view.set_mode(ViewMode::Scanning);
                let _ = self.event_bus.publish(ScanEvent::CameraStatusChanged {
                    connected: true,
                    timestamp: SystemTime::now(),
                });
            }
            Err(e) => {
                // Recovered locally: the file input path stays available
                warn!("Camera setup failed, falling back to file input: {}", e);
                self.view.set_mode(ViewMode::CameraError {
                    message: e.to_string(),
                });
                let _ = self.event_bus.publish(ScanEvent::CameraStatusChanged {
                    connected: false,
                    timestamp: SystemTime::now(),
                });
            }
        }

        self.redraw();
        Ok(())
    }

    /// Bring up the capture path for the configured scan mode.
    ///
    /// Pull mode streams frames into the ring buffer and polls them; push
    /// mode hands the stream to the scanner's own callback loop.
    async fn start_scanning(&mut self) -> Result<()> {
        if self.config.scanner.mode == ScanMode::Pull {
            self.camera
                .start_capture(Arc::clone(&self.ring_buffer))
                .await?;
        }
        self.scanner.start().await
    }

    /// Decode image files given on the command line before the event loop
    /// starts; detections arrive as ordinary events.
    pub async fn scan_image_files(&mut self, paths: &[PathBuf]) {
        if paths.is_empty() {
            return;
        }
        info!("Scanning {} image files", paths.len());
        self.file_scanner.scan_files(paths, &self.event_bus).await;
    }

    /// Run the event loop until shutdown is requested
    pub async fn run(&mut self) -> Result<i32> {
        let mut events_rx = self
            .events_rx
            .take()
            .ok_or_else(|| crate::error::QrScanError::system("Session already ran"))?;

        let reason = loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Ok(event) => {
                        if let Some(reason) = self.handle_event(event).await {
                            break reason;
                        }
                        self.redraw();
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Event loop lagged, {} events dropped", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break ShutdownReason::Error("event bus closed".to_string());
                    }
                },
                _ = signal::ctrl_c() => {
                    break ShutdownReason::Signal("SIGINT".to_string());
                }
            }
        };

        info!("Session ending: {:?}", reason);
        self.shutdown().await;

        Ok(match reason {
            ShutdownReason::Error(_) => 1,
            _ => 0,
        })
    }

    /// Apply one event to the store and view. Returns the shutdown reason
    /// when the event ends the session.
    async fn handle_event(&mut self, event: ScanEvent) -> Option<ShutdownReason> {
        match event {
            ScanEvent::CodeDetected { text, source, .. } => {
                // Single dedup point for both the camera and the file path
                if self.store.add_if_new(&text, source) {
                    self.view.clamp_selection(self.store.len());
                }
                None
            }
            ScanEvent::Command { command, .. } => {
                self.handle_command(command).await;
                None
            }
            ScanEvent::CameraStatusChanged { .. } => None,
            ScanEvent::SystemError { component, error } => {
                debug!("Component error from {}: {}", component, error);
                None
            }
            ScanEvent::ShutdownRequested { reason, .. } => {
                debug!("Shutdown event: {}", reason);
                Some(ShutdownReason::UserRequest)
            }
        }
    }

    async fn handle_command(&mut self, command: UiCommand) {
        match command {
            UiCommand::SelectPrevious => self.view.select_previous(),
            UiCommand::SelectNext => self.view.select_next(self.store.len()),
            UiCommand::CopySelected => {
                if let Some(entry) = self.store.entry(self.view.selected()) {
                    copy_best_effort(self.clipboard.as_mut(), &entry.display);
                }
            }
            UiCommand::DeleteSelected => {
                if let Some(raw) = self
                    .store
                    .entry(self.view.selected())
                    .map(|entry| entry.raw.clone())
                {
                    self.store.remove(&raw);
                    self.view.clamp_selection(self.store.len());
                }
            }
            UiCommand::CopyAll => {
                // Disabled while the list is empty
                if self.store.is_empty() {
                    debug!("Copy-all ignored: no results");
                } else {
                    let joined = self.store.joined_display();
                    copy_best_effort(self.clipboard.as_mut(), &joined);
                }
            }
            UiCommand::ClearAll => {
                self.store.clear();
                self.view.clamp_selection(0);
            }
            UiCommand::FileEntryUpdated(buffer) => self.view.set_file_entry(buffer),
            UiCommand::FileEntryCancelled => self.view.clear_file_entry(),
            UiCommand::ScanFiles(paths) => {
                self.view.clear_file_entry();
                self.file_scanner.scan_files(&paths, &self.event_bus).await;
            }
        }
    }

    fn redraw(&self) {
        if let Err(e) = self.view.draw(&self.store) {
            warn!("Failed to draw results view: {}", e);
        }
    }

    /// Tear down in reverse dependency order: the scanner first (releasing
    /// its hold on the stream), then capture (stopping the device), then
    /// input and terminal state.
    async fn shutdown(&mut self) {
        info!("Shutting down scanner session");

        self.scanner.stop().await;
        self.camera.stop_capture().await;

        if let Err(e) = self.keyboard.stop().await {
            error!("Failed to stop keyboard handler: {}", e);
        }

        if self.alternate_screen {
            if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, Show) {
                error!("Failed to restore terminal: {}", e);
            }
            self.alternate_screen = false;
        }

        debug!("Scanner session shut down");
    }

    /// Number of distinct codes seen so far
    pub fn result_count(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::ClipboardProvider;
    use crate::error::ClipboardError;
    use crate::events::ScanSource;
    use std::sync::Mutex;

    /// Clipboard mock that can be inspected after being boxed away
    struct SharedClipboard(Arc<Mutex<Vec<String>>>);

    impl ClipboardProvider for SharedClipboard {
        fn write_text(&mut self, text: &str) -> std::result::Result<(), ClipboardError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn test_session() -> (ScannerSession, Arc<Mutex<Vec<String>>>) {
        let mut config = QrScanConfig::default();
        config.results.clipboard = false;
        let mut session = ScannerSession::new(config);

        let writes = Arc::new(Mutex::new(Vec::new()));
        session.clipboard = Box::new(SharedClipboard(Arc::clone(&writes)));
        (session, writes)
    }

    fn detected(text: &str, source: ScanSource) -> ScanEvent {
        ScanEvent::CodeDetected {
            text: text.to_string(),
            source,
            timestamp: SystemTime::now(),
        }
    }

    fn command(command: UiCommand) -> ScanEvent {
        ScanEvent::Command {
            command,
            timestamp: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_detections_add_one_row() {
        let (mut session, _) = test_session();

        for _ in 0..5 {
            session
                .handle_event(detected("code", ScanSource::Camera))
                .await;
        }
        // Same code again from the file path
        session
            .handle_event(detected("code", ScanSource::File))
            .await;

        assert_eq!(session.result_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_then_rescan_is_new() {
        let (mut session, _) = test_session();

        session
            .handle_event(detected("code", ScanSource::Camera))
            .await;
        session
            .handle_event(command(UiCommand::DeleteSelected))
            .await;
        assert_eq!(session.result_count(), 0);

        session
            .handle_event(detected("code", ScanSource::Camera))
            .await;
        assert_eq!(session.result_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_resets_everything() {
        let (mut session, _) = test_session();

        for text in ["a", "b", "c"] {
            session
                .handle_event(detected(text, ScanSource::Camera))
                .await;
        }
        session.handle_event(command(UiCommand::ClearAll)).await;

        assert_eq!(session.result_count(), 0);
        assert_eq!(session.view.selected(), 0);
        let lines = session.view.render_lines(&session.store).join("\n");
        assert!(lines.contains("No QR codes scanned yet"));
    }

    #[tokio::test]
    async fn test_copy_selected_writes_display_value() {
        let (mut session, writes) = test_session();

        session
            .handle_event(detected("ticket=ABC", ScanSource::Camera))
            .await;
        session
            .handle_event(command(UiCommand::CopySelected))
            .await;

        assert_eq!(*writes.lock().unwrap(), vec!["ABC"]);
    }

    #[tokio::test]
    async fn test_copy_all_disabled_when_empty() {
        let (mut session, writes) = test_session();

        session.handle_event(command(UiCommand::CopyAll)).await;
        assert!(writes.lock().unwrap().is_empty());

        session
            .handle_event(detected("x=1", ScanSource::Camera))
            .await;
        session
            .handle_event(detected("plain", ScanSource::Camera))
            .await;
        session.handle_event(command(UiCommand::CopyAll)).await;

        assert_eq!(*writes.lock().unwrap(), vec!["plain\n1"]);
    }

    #[tokio::test]
    async fn test_selection_follows_commands() {
        let (mut session, writes) = test_session();

        for text in ["oldest", "middle", "newest"] {
            session
                .handle_event(detected(text, ScanSource::Camera))
                .await;
        }

        // Move to the middle row and copy it
        session
            .handle_event(command(UiCommand::SelectNext))
            .await;
        session
            .handle_event(command(UiCommand::CopySelected))
            .await;
        assert_eq!(*writes.lock().unwrap(), vec!["middle"]);

        // Delete it; selection clamps to a valid row
        session
            .handle_event(command(UiCommand::DeleteSelected))
            .await;
        assert_eq!(session.result_count(), 2);
        assert!(session.view.selected() < session.result_count());
    }

    #[tokio::test]
    async fn test_shutdown_event_ends_loop() {
        let (mut session, _) = test_session();

        let reason = session
            .handle_event(ScanEvent::ShutdownRequested {
                timestamp: SystemTime::now(),
                reason: "test".to_string(),
            })
            .await;
        assert!(matches!(reason, Some(ShutdownReason::UserRequest)));
    }

    #[tokio::test]
    async fn test_file_entry_commands_update_prompt() {
        let (mut session, _) = test_session();

        session
            .handle_event(command(UiCommand::FileEntryUpdated("/tmp/a".to_string())))
            .await;
        let lines = session.view.render_lines(&session.store).join("\n");
        assert!(lines.contains("Scan file: /tmp/a_"));

        session
            .handle_event(command(UiCommand::FileEntryCancelled))
            .await;
        let lines = session.view.render_lines(&session.store).join("\n");
        assert!(!lines.contains("Scan file:"));
    }
}
