use crate::config::ResultsConfig;
use crate::results::ResultStore;
use crossterm::cursor::MoveTo;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use std::io::{self, Write};

/// Longest rendered row value before truncation
const MAX_ROW_CHARS: usize = 60;

/// Mutually exclusive visual states of the scanning area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    /// Camera setup has not finished yet
    Idle,
    /// Live scanning is active
    Scanning,
    /// Camera setup failed; file input is the fallback
    CameraError { message: String },
}

/// Terminal rendering of the results list.
///
/// Keeps only presentation state (mode, row selection, the pending
/// file-path prompt); the rows themselves live in the result store, which
/// stays in 1:1 correspondence with what is drawn.
pub struct ResultsView {
    mode: ViewMode,
    selected: usize,
    max_visible_rows: usize,
    file_entry: Option<String>,
}

impl ResultsView {
    pub fn new(config: &ResultsConfig) -> Self {
        Self {
            mode: ViewMode::Idle,
            selected: 0,
            max_visible_rows: config.max_visible_rows,
            file_entry: None,
        }
    }

    /// Switch the scanning area state
    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    /// Move selection towards older entries
    pub fn select_next(&mut self, row_count: usize) {
        if row_count > 0 && self.selected + 1 < row_count {
            self.selected += 1;
        }
    }

    /// Move selection towards newer entries
    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Keep the selection inside the list after rows were removed
    pub fn clamp_selection(&mut self, row_count: usize) {
        if row_count == 0 {
            self.selected = 0;
        } else if self.selected >= row_count {
            self.selected = row_count - 1;
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Show the file-path prompt with the given buffer contents
    pub fn set_file_entry(&mut self, buffer: String) {
        self.file_entry = Some(buffer);
    }

    /// Hide the file-path prompt
    pub fn clear_file_entry(&mut self) {
        self.file_entry = None;
    }

    /// Render the whole screen as lines of text
    pub fn render_lines(&self, store: &ResultStore) -> Vec<String> {
        let mut lines = Vec::new();

        lines.push(format!("QR Scanner - {} codes", store.len()));
        lines.push(String::new());

        match &self.mode {
            ViewMode::Idle => {
                lines.push("Starting camera...".to_string());
            }
            ViewMode::Scanning => {
                lines.push("Point the camera at a QR code.".to_string());
            }
            ViewMode::CameraError { message } => {
                lines.push(format!("Camera unavailable: {}", message));
                lines.push("Scan image files instead: press [u] and enter a path.".to_string());
            }
        }
        lines.push(String::new());

        if store.is_empty() {
            lines.push("No QR codes scanned yet".to_string());
        } else {
            for (index, entry) in store.entries().iter().take(self.max_visible_rows).enumerate() {
                let marker = if index == self.selected { '>' } else { ' ' };
                let mut display = entry.display.clone();
                if display.chars().count() > MAX_ROW_CHARS {
                    display = display.chars().take(MAX_ROW_CHARS - 1).collect();
                    display.push('…');
                }
                lines.push(format!(
                    "{} {}  {}",
                    marker,
                    entry.scanned_at.format("%H:%M:%S"),
                    display
                ));
            }
            let hidden = store.len().saturating_sub(self.max_visible_rows);
            if hidden > 0 {
                lines.push(format!("  ... {} more", hidden));
            }
        }
        lines.push(String::new());

        if let Some(buffer) = &self.file_entry {
            lines.push(format!("Scan file: {}_", buffer));
        } else {
            let copy_all = if store.is_empty() {
                "[a] copy all (disabled)"
            } else {
                "[a] copy all"
            };
            lines.push(format!(
                "[up/down] select  [c] copy  [d] delete  {}  [x] clear  [u] scan file  [q] quit",
                copy_all
            ));
        }

        lines
    }

    /// Draw the rendered lines to the terminal
    pub fn draw(&self, store: &ResultStore) -> io::Result<()> {
        let mut stdout = io::stdout();
        queue!(stdout, Clear(ClearType::All))?;
        for (row, line) in self.render_lines(store).iter().enumerate() {
            queue!(stdout, MoveTo(0, row as u16), Print(line))?;
        }
        stdout.flush()
    }
}
