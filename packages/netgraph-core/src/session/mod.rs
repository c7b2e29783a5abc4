//! Scan session lifecycle.
//!
//! One [`ScanSession`] tracks a single end-to-end scan attempt. It is owned
//! by the [`controller::ScanController`], created when the backend accepts
//! a start request, mutated only by status snapshots from that session's
//! own poller, and replaced on reset.

pub mod controller;
pub mod poller;

pub use controller::ScanController;
pub use poller::{PollError, PollOptions, StatusPoller};

use crate::backend::{Device, ScanResponse, ScanStatus, ScanType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Controller lifecycle phase.
///
/// `Idle -> Validating -> Requesting -> Polling -> {Completed, Failed,
/// Cancelled}`, with `Idle` reachable again from any terminal phase via
/// reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Validating,
    Requesting,
    Polling,
    Completed,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Cancelled)
    }

    /// A scan is in flight from validation until a terminal phase.
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Validating | Phase::Requesting | Phase::Polling)
    }
}

/// One end-to-end scan attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub session_id: String,
    pub target: String,
    pub scan_type: ScanType,
    pub status: ScanStatus,
    /// Percent complete, 0-100, monotonic non-decreasing while non-terminal
    pub progress: f64,
    pub device_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Full device list, populated once after a completed status is observed
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl ScanSession {
    /// Build a session from the backend's accepted start response.
    pub(crate) fn from_start_response(resp: &ScanResponse, scan_type: ScanType) -> Self {
        Self {
            session_id: resp.scan_id.clone(),
            target: resp.target_range.clone(),
            scan_type,
            status: resp.status,
            progress: resp.progress,
            device_count: resp.device_count,
            started_at: resp.started_at,
            completed_at: resp.completed_at,
            error_message: resp.error_message.clone(),
            devices: Vec::new(),
        }
    }
}
