//! Status polling for one scan.
//!
//! [`StatusPoller`] is a lazy, finite sequence of status snapshots: wait
//! one interval, fetch `GET /scan/{id}/status`, yield, repeat. It ends
//! normally after yielding a terminal snapshot, immediately on
//! cancellation, and with [`PollError::Exhausted`] once `max_attempts`
//! fetches have gone by without a terminal status. A finished poller never
//! restarts; each scan gets a fresh one.

use crate::backend::{ScanBackend, ScanStatusSnapshot};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Errors yielded through the polling sequence.
#[derive(Debug, Error)]
pub enum PollError {
    /// One status fetch failed. The sequence is still alive; the consumer
    /// decides whether to keep going.
    #[error("status fetch failed: {0}")]
    Fetch(#[source] crate::error::Error),

    /// `max_attempts` fetches elapsed without a terminal status. The
    /// sequence is over.
    #[error("polling exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Wait between status fetches
    pub interval: Duration,
    /// Maximum number of status fetches before giving up
    pub max_attempts: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 300,
        }
    }
}

pub struct StatusPoller {
    backend: Arc<dyn ScanBackend>,
    scan_id: String,
    options: PollOptions,
    cancel: CancellationToken,
    attempts: u32,
    done: bool,
}

impl StatusPoller {
    pub fn new(
        backend: Arc<dyn ScanBackend>,
        scan_id: impl Into<String>,
        options: PollOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            scan_id: scan_id.into(),
            options,
            cancel,
            attempts: 0,
            done: false,
        }
    }

    /// Number of status fetches issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Yield the next snapshot in the sequence.
    ///
    /// `None` means the sequence is over: a terminal snapshot was already
    /// yielded, exhaustion was already reported, or the token fired. The
    /// interval wait and the fetch itself are both abandoned mid-flight on
    /// cancellation, without yielding anything further.
    pub async fn next(&mut self) -> Option<Result<ScanStatusSnapshot, PollError>> {
        if self.done || self.cancel.is_cancelled() {
            self.done = true;
            return None;
        }

        if self.attempts >= self.options.max_attempts {
            self.done = true;
            tracing::warn!(
                "Polling for scan {} exhausted after {} attempts",
                self.scan_id,
                self.attempts
            );
            return Some(Err(PollError::Exhausted {
                attempts: self.attempts,
            }));
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.done = true;
                return None;
            }
            _ = sleep(self.options.interval) => {}
        }

        self.attempts += 1;

        let snapshot = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.done = true;
                return None;
            }
            result = self.backend.scan_status(&self.scan_id) => result,
        };

        match snapshot {
            Ok(snap) => {
                if snap.status.is_terminal() {
                    self.done = true;
                }
                tracing::debug!(
                    "Scan {} status: {} ({:.0}%, {} devices)",
                    self.scan_id,
                    snap.status,
                    snap.progress,
                    snap.device_count
                );
                Some(Ok(snap))
            }
            Err(e) => Some(Err(PollError::Fetch(e))),
        }
    }
}
