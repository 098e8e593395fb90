use crate::error::ClipboardError;
use tracing::{debug, warn};

/// Clipboard write access behind a trait so the session can be exercised
/// without touching the system clipboard.
pub trait ClipboardProvider: Send {
    /// Write text to the clipboard
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// System clipboard backed by arboard
pub struct SystemClipboard {
    clipboard: arboard::Clipboard,
}

impl SystemClipboard {
    /// Connect to the system clipboard
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard = arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable {
            details: e.to_string(),
        })?;
        Ok(Self { clipboard })
    }
}

impl ClipboardProvider for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.clipboard
            .set_text(text.to_string())
            .map_err(|e| ClipboardError::WriteFailed {
                details: e.to_string(),
            })
    }
}

/// No-op clipboard used when clipboard access is disabled or unavailable
pub struct NullClipboard;

impl ClipboardProvider for NullClipboard {
    fn write_text(&mut self, _text: &str) -> Result<(), ClipboardError> {
        debug!("Clipboard disabled, copy ignored");
        Ok(())
    }
}

/// Capturing clipboard for tests
#[derive(Default)]
pub struct MockClipboard {
    pub writes: Vec<String>,
}

impl MockClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardProvider for MockClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.writes.push(text.to_string());
        Ok(())
    }
}

/// Best-effort clipboard write: failures are logged, never propagated
pub fn copy_best_effort(clipboard: &mut dyn ClipboardProvider, text: &str) {
    match clipboard.write_text(text) {
        Ok(()) => debug!("Copied {} chars to clipboard", text.len()),
        Err(e) => warn!("Clipboard write failed: {}", e),
    }
}

/// Build the configured clipboard provider, degrading to the no-op
/// provider when the system clipboard cannot be reached.
pub fn create_clipboard(enabled: bool) -> Box<dyn ClipboardProvider> {
    if !enabled {
        return Box::new(NullClipboard);
    }

    match SystemClipboard::new() {
        Ok(clipboard) => Box::new(clipboard),
        Err(e) => {
            warn!("System clipboard unavailable, copies disabled: {}", e);
            Box::new(NullClipboard)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_captures_writes() {
        let mut clipboard = MockClipboard::new();
        clipboard.write_text("one").unwrap();
        clipboard.write_text("two").unwrap();
        assert_eq!(clipboard.writes, vec!["one", "two"]);
    }

    #[test]
    fn test_best_effort_swallows_failures() {
        struct FailingClipboard;
        impl ClipboardProvider for FailingClipboard {
            fn write_text(&mut self, _text: &str) -> Result<(), ClipboardError> {
                Err(ClipboardError::WriteFailed {
                    details: "denied".to_string(),
                })
            }
        }

        // Must not panic or propagate
        copy_best_effort(&mut FailingClipboard, "text");
    }

    #[test]
    fn test_disabled_clipboard_is_null() {
        let mut clipboard = create_clipboard(false);
        assert!(clipboard.write_text("ignored").is_ok());
    }
}
