use crate::error::Result;
use crate::events::{EventBus, ScanEvent, UiCommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press translates to
#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    /// Publish a UI command
    Command(UiCommand),
    /// Request application shutdown
    Shutdown,
    /// Nothing to do
    Ignored,
}

/// Keyboard modes: normal list navigation, or line-editing a file path
#[derive(Debug, PartialEq, Eq)]
enum InputMode {
    Normal,
    /// Collecting a file path (or several, whitespace-separated)
    FileEntry(String),
}

/// Translate one key press given the current input mode.
///
/// Kept free of terminal I/O so the mapping is testable.
fn handle_key(mode: &mut InputMode, code: KeyCode) -> KeyAction {
    match mode {
        InputMode::Normal => match code {
            KeyCode::Up => KeyAction::Command(UiCommand::SelectPrevious),
            KeyCode::Down => KeyAction::Command(UiCommand::SelectNext),
            KeyCode::Char('c') => KeyAction::Command(UiCommand::CopySelected),
            KeyCode::Char('d') | KeyCode::Delete => {
                KeyAction::Command(UiCommand::DeleteSelected)
            }
            KeyCode::Char('a') => KeyAction::Command(UiCommand::CopyAll),
            KeyCode::Char('x') => KeyAction::Command(UiCommand::ClearAll),
            KeyCode::Char('u') => {
                *mode = InputMode::FileEntry(String::new());
                KeyAction::Command(UiCommand::FileEntryUpdated(String::new()))
            }
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Shutdown,
            _ => KeyAction::Ignored,
        },
        InputMode::FileEntry(buffer) => match code {
            KeyCode::Char(c) => {
                buffer.push(c);
                KeyAction::Command(UiCommand::FileEntryUpdated(buffer.clone()))
            }
            KeyCode::Backspace => {
                buffer.pop();
                KeyAction::Command(UiCommand::FileEntryUpdated(buffer.clone()))
            }
            KeyCode::Enter => {
                let paths: Vec<PathBuf> =
                    buffer.split_whitespace().map(PathBuf::from).collect();
                // Buffer resets on every submission so the same path can be
                // entered again and still trigger a scan
                *mode = InputMode::Normal;
                if paths.is_empty() {
                    KeyAction::Command(UiCommand::FileEntryCancelled)
                } else {
                    KeyAction::Command(UiCommand::ScanFiles(paths))
                }
            }
            KeyCode::Esc => {
                *mode = InputMode::Normal;
                KeyAction::Command(UiCommand::FileEntryCancelled)
            }
            _ => KeyAction::Ignored,
        },
    }
}

/// Raw-mode keyboard handler translating key presses into UI command events
pub struct KeyboardInputHandler {
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    /// Create a new keyboard input handler
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input handler");

        let event_bus = Arc::clone(&self.event_bus);
        let cancellation_token = self.cancellation_token.clone();

        // Spawn a blocking task to handle keyboard input
        task::spawn_blocking(move || {
            // Enable raw mode to capture individual key presses
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard handler active");
            let mut mode = InputMode::Normal;

            loop {
                // Check if we should stop
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                // Poll for keyboard events with a timeout
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            // Only handle key press events (not release)
                            if key_event.kind != KeyEventKind::Press {
                                continue;
                            }

                            match handle_key(&mut mode, key_event.code) {
                                KeyAction::Command(command) => {
                                    if let Err(e) = event_bus.publish(ScanEvent::Command {
                                        command,
                                        timestamp: SystemTime::now(),
                                    }) {
                                        warn!("Failed to publish command: {}", e);
                                    }
                                }
                                KeyAction::Shutdown => {
                                    info!("Quit key pressed - requesting shutdown");
                                    if let Err(e) =
                                        event_bus.publish(ScanEvent::ShutdownRequested {
                                            timestamp: SystemTime::now(),
                                            reason: "User requested via keyboard".to_string(),
                                        })
                                    {
                                        warn!("Failed to publish shutdown event: {}", e);
                                    }
                                    break;
                                }
                                KeyAction::Ignored => {
                                    debug!("Key pressed: {:?}", key_event.code);
                                }
                            }
                        }
                    }
                    Ok(false) => {
                        // No event available, continue polling
                    }
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            // Disable raw mode when exiting
            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_mode_mappings() {
        let mut mode = InputMode::Normal;
        assert_eq!(
            handle_key(&mut mode, KeyCode::Up),
            KeyAction::Command(UiCommand::SelectPrevious)
        );
        assert_eq!(
            handle_key(&mut mode, KeyCode::Down),
            KeyAction::Command(UiCommand::SelectNext)
        );
        assert_eq!(
            handle_key(&mut mode, KeyCode::Char('c')),
            KeyAction::Command(UiCommand::CopySelected)
        );
        assert_eq!(
            handle_key(&mut mode, KeyCode::Delete),
            KeyAction::Command(UiCommand::DeleteSelected)
        );
        assert_eq!(
            handle_key(&mut mode, KeyCode::Char('a')),
            KeyAction::Command(UiCommand::CopyAll)
        );
        assert_eq!(
            handle_key(&mut mode, KeyCode::Char('x')),
            KeyAction::Command(UiCommand::ClearAll)
        );
        assert_eq!(handle_key(&mut mode, KeyCode::Char('q')), KeyAction::Shutdown);
        assert_eq!(handle_key(&mut mode, KeyCode::Tab), KeyAction::Ignored);
    }

    #[test]
    fn test_file_entry_flow() {
        let mut mode = InputMode::Normal;
        assert_eq!(
            handle_key(&mut mode, KeyCode::Char('u')),
            KeyAction::Command(UiCommand::FileEntryUpdated(String::new()))
        );
        assert_eq!(mode, InputMode::FileEntry(String::new()));

        for c in ['q', 'r', '.', 'p', 'n', 'g'] {
            handle_key(&mut mode, KeyCode::Char(c));
        }
        // 'q' must edit the buffer, not quit, while entering a path
        assert_eq!(mode, InputMode::FileEntry("qr.png".to_string()));

        match handle_key(&mut mode, KeyCode::Enter) {
            KeyAction::Command(UiCommand::ScanFiles(paths)) => {
                assert_eq!(paths, vec![PathBuf::from("qr.png")]);
            }
            other => panic!("unexpected action: {:?}", other),
        }
        assert_eq!(mode, InputMode::Normal);
    }

    #[test]
    fn test_file_entry_multiple_paths() {
        let mut mode = InputMode::FileEntry("a.png b.png".to_string());
        match handle_key(&mut mode, KeyCode::Enter) {
            KeyAction::Command(UiCommand::ScanFiles(paths)) => {
                assert_eq!(paths, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_file_entry_backspace_and_cancel() {
        let mut mode = InputMode::FileEntry("ab".to_string());
        assert_eq!(
            handle_key(&mut mode, KeyCode::Backspace),
            KeyAction::Command(UiCommand::FileEntryUpdated("a".to_string()))
        );
        assert_eq!(
            handle_key(&mut mode, KeyCode::Esc),
            KeyAction::Command(UiCommand::FileEntryCancelled)
        );
        assert_eq!(mode, InputMode::Normal);
    }

    #[test]
    fn test_empty_submission_cancels() {
        let mut mode = InputMode::FileEntry("   ".to_string());
        assert_eq!(
            handle_key(&mut mode, KeyCode::Enter),
            KeyAction::Command(UiCommand::FileEntryCancelled)
        );
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let event_bus = Arc::new(EventBus::new(100));
        let handler = KeyboardInputHandler::new(event_bus);

        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }
}
