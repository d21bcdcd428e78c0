//! Bounded diagnostic log for a chat session.
//!
//! Every transport lifecycle event and inbound frame gets an entry. The log
//! is a fixed-capacity ring: the oldest entries are silently discarded once
//! the capacity is reached, so a long-lived session cannot grow without
//! bound.

use std::collections::VecDeque;
use std::fmt;

use time::OffsetDateTime;

use crate::utils::time::format_rfc3339;

/// Default number of entries retained.
pub const DIAGNOSTIC_LOG_CAPACITY: usize = 100;

/// One timestamped diagnostic entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry {
    /// When the entry was recorded.
    pub timestamp: OffsetDateTime,

    /// The entry text. Credential values are masked before they get here.
    pub text: String,
}

impl fmt::Display for DiagnosticEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", format_rfc3339(&self.timestamp), self.text)
    }
}

/// A bounded, ordered diagnostic log with FIFO eviction.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    entries: VecDeque<DiagnosticEntry>,
    capacity: usize,
}

impl DiagnosticLog {
    /// Creates a log with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DIAGNOSTIC_LOG_CAPACITY)
    }

    /// Creates a log with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records an entry now.
    pub fn record(&mut self, text: impl Into<String>) {
        self.record_at(OffsetDateTime::now_utc(), text);
    }

    /// Records an entry with an explicit timestamp.
    pub fn record_at(&mut self, timestamp: OffsetDateTime, text: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(DiagnosticEntry {
            timestamp,
            text: text.into(),
        });
    }

    /// Returns the number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the retained entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticEntry> {
        self.entries.iter()
    }

    /// Returns the most recent entry, if any.
    pub fn latest(&self) -> Option<&DiagnosticEntry> {
        self.entries.back()
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}
