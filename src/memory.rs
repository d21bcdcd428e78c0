//! Polling feed over the agent's memory store.
//!
//! The backend exposes memory as a plain request/response endpoint; this
//! feed refreshes it on a fixed interval, keeps the last good snapshot, and
//! surfaces fetch failures as a retryable error state instead of discarding
//! what was already loaded.

use std::time::Duration;

use time::OffsetDateTime;

use crate::client::Deck;
use crate::error::{Error, Result};
use crate::types::MemoryRecord;

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A polled view of the agent's memory history.
pub struct MemoryFeed {
    client: Deck,
    interval: Duration,
    records: Vec<MemoryRecord>,
    last_error: Option<Error>,
    last_updated: Option<OffsetDateTime>,
    polling: bool,
}

impl MemoryFeed {
    /// Creates a feed with the default polling interval.
    pub fn new(client: Deck) -> Self {
        Self {
            client,
            interval: DEFAULT_POLL_INTERVAL,
            records: Vec::new(),
            last_error: None,
            last_updated: None,
            polling: true,
        }
    }

    /// Sets the polling interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns the polling interval.
    pub fn poll_interval(&self) -> Duration {
        self.interval
    }

    /// Returns the last good snapshot of records.
    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    /// Returns the error from the most recent failed refresh, if the
    /// failure has not been superseded by a successful one.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Returns when the snapshot was last refreshed successfully.
    pub fn last_updated(&self) -> Option<OffsetDateTime> {
        self.last_updated
    }

    /// Returns true while automatic polling is enabled.
    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Suspends automatic polling; manual refresh still works.
    pub fn pause(&mut self) {
        self.polling = false;
    }

    /// Resumes automatic polling.
    pub fn resume(&mut self) {
        self.polling = true;
    }

    /// Fetches the memory history now, regardless of the polling switch.
    ///
    /// On failure the previous snapshot is retained and the error is kept
    /// for the caller to render alongside a retry affordance.
    pub async fn refresh(&mut self) -> Result<()> {
        match self.client.memory_history().await {
            Ok(records) => {
                self.records = records;
                self.last_updated = Some(OffsetDateTime::now_utc());
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// One poll-loop step: refreshes when polling is enabled, then waits
    /// out the interval. Refresh failures are retained, not propagated; the
    /// next tick retries.
    pub async fn tick(&mut self) {
        if self.polling {
            let _ = self.refresh().await;
        }
        tokio::time::sleep(self.interval).await;
    }
}
