//! Request History Domain Model
//!
//! Defines the structure for tracking executed requests.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::generate_id;
use crate::request::ApiRequest;

/// Default cap on stored entries.
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// A single entry in the request history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Unique identifier for this entry.
    pub id: Uuid,
    /// When the request was executed.
    pub timestamp: DateTime<Utc>,
    /// The request as written, before substitution.
    pub request: ApiRequest,
    /// Response status code.
    pub status_code: Option<u16>,
    /// Transport time in milliseconds.
    pub elapsed_ms: Option<u64>,
}

impl HistoryEntry {
    /// Creates an entry for a completed request.
    #[must_use]
    pub fn new(
        request: ApiRequest,
        status_code: u16,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id(),
            timestamp,
            request,
            status_code: Some(status_code),
            elapsed_ms: Some(elapsed_ms),
        }
    }

    /// Returns the duration as a display string.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_display(&self) -> String {
        match self.elapsed_ms {
            Some(ms) if ms < 1000 => format!("{ms}ms"),
            Some(ms) => format!("{:.1}s", ms as f64 / 1000.0),
            None => "-".to_string(),
        }
    }
}

/// Request history with a maximum size limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHistory {
    /// History entries (newest first).
    entries: VecDeque<HistoryEntry>,
    /// Maximum number of entries to keep.
    #[serde(default = "default_max_entries")]
    max_entries: usize,
}

const fn default_max_entries() -> usize {
    DEFAULT_MAX_HISTORY
}

impl Default for RequestHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl RequestHistory {
    /// Creates a new empty history.
    #[must_use]
    pub const fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
        }
    }

    /// Adds an entry to the history (at the front), dropping the oldest
    /// entries beyond the cap.
    pub fn add(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.max_entries);
    }

    /// Returns all entries (newest first).
    #[must_use]
    pub const fn entries(&self) -> &VecDeque<HistoryEntry> {
        &self.entries
    }

    /// Returns an entry by ID.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Clears all history entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cap.
    #[must_use]
    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Sets the maximum number of entries and trims if needed.
    pub fn set_max_entries(&mut self, max: usize) {
        self.max_entries = max;
        self.entries.truncate(max);
    }
}
