use crate::events::ScanSource;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use tracing::{debug, info};

/// Derive the value shown for a decoded payload: split on the first `=`
/// and keep the remainder if present, else the whole string. A convention
/// for URL-query-style payloads (`ticket=b=c` shows as `b=c`).
pub fn display_value(raw: &str) -> &str {
    match raw.split_once('=') {
        Some((_, rest)) => rest,
        None => raw,
    }
}

/// One displayed scan result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    /// The exact decoded payload; identity for deduplication
    pub raw: String,
    /// The derived display value
    pub display: String,
    /// When the value was first seen
    pub scanned_at: DateTime<Local>,
    /// Where the value came from
    pub source: ScanSource,
}

/// The set of distinct decoded values seen this session.
///
/// Membership is by exact raw-string equality; entries are kept in
/// reverse-chronological insertion order for display. The store is the
/// single point of truth for "has this code already been shown" - both
/// the camera path and the file path go through [`ResultStore::add_if_new`],
/// keeping the store and the rendered list in 1:1 correspondence.
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: Vec<ResultEntry>,
    seen: HashSet<String>,
}

impl ResultStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly decoded value unless it is already present.
    ///
    /// Returns true if the value was new and a row was added at the top.
    pub fn add_if_new(&mut self, raw: &str, source: ScanSource) -> bool {
        if self.seen.contains(raw) {
            return false;
        }

        self.seen.insert(raw.to_string());
        self.entries.insert(
            0,
            ResultEntry {
                raw: raw.to_string(),
                display: display_value(raw).to_string(),
                scanned_at: Local::now(),
                source,
            },
        );

        info!("New code added ({} total): {} chars", self.entries.len(), raw.len());
        true
    }

    /// Remove a value from the store and its row from the list.
    ///
    /// After removal the value counts as unseen and can be rescanned as new.
    pub fn remove(&mut self, raw: &str) -> bool {
        if !self.seen.remove(raw) {
            return false;
        }

        self.entries.retain(|entry| entry.raw != raw);
        debug!("Code removed ({} remaining)", self.entries.len());
        true
    }

    /// Empty the store and the list in one step
    pub fn clear(&mut self) {
        let removed = self.entries.len();
        self.entries.clear();
        self.seen.clear();
        info!("Cleared {} codes", removed);
    }

    /// Whether the value has already been shown
    pub fn contains(&self, raw: &str) -> bool {
        self.seen.contains(raw)
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no values
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in display order, newest first
    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    /// Entry at the given display position
    pub fn entry(&self, index: usize) -> Option<&ResultEntry> {
        self.entries.get(index)
    }

    /// All displayed values joined with newlines, in display order.
    /// This is what copy-all writes to the clipboard.
    pub fn joined_display(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.display.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
