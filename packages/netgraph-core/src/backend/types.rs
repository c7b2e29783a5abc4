//! Wire types for the scan backend REST API.
//!
//! Field names follow the backend's snake_case JSON. Devices are immutable
//! snapshots: the client never mutates one after receiving it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Types of scan the backend supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    /// Fast scan of common ports
    Quick,
    /// Full port range, slower
    Deep,
    /// Host discovery only, no port scan
    Discovery,
    /// User-supplied port range
    Custom,
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanType::Quick => write!(f, "quick"),
            ScanType::Deep => write!(f, "deep"),
            ScanType::Discovery => write!(f, "discovery"),
            ScanType::Custom => write!(f, "custom"),
        }
    }
}

/// Lifecycle status reported by the backend for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    /// A terminal status admits no further progress.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Pending => write!(f, "pending"),
            ScanStatus::Running => write!(f, "running"),
            ScanStatus::Completed => write!(f, "completed"),
            ScanStatus::Failed => write!(f, "failed"),
            ScanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Request body for `POST /scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    /// IP address or CIDR range, e.g. "192.168.1.0/24"
    pub target: String,
    pub scan_type: ScanType,
    /// Custom port range for `ScanType::Custom`, e.g. "22,80,443" or "1-1000"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    /// User confirms they own or may scan this network
    pub user_consent: bool,
}

impl ScanRequest {
    pub fn new(target: impl Into<String>, scan_type: ScanType) -> Self {
        Self {
            target: target.into(),
            scan_type,
            port_range: None,
            user_consent: true,
        }
    }
}

/// One open port on a discovered device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_port_state")]
    pub state: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

fn default_port_state() -> String {
    "open".to_string()
}

/// A device discovered by the backend. Immutable on the client side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub ip: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    /// OS detection confidence, 0-100
    #[serde(default)]
    pub os_accuracy: u8,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub open_ports: Vec<Port>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default = "default_is_up")]
    pub is_up: bool,
    #[serde(default)]
    pub vulnerability_count: u32,
}

fn default_is_up() -> bool {
    true
}

impl Device {
    /// Best display name: hostname if resolved, otherwise the IP.
    pub fn display_name(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.ip)
    }
}

/// Full scan result from `POST /scan` and `GET /scan/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub scan_id: String,
    pub target_range: String,
    pub scan_type: String,
    pub status: ScanStatus,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub scanned_hosts: u32,
    #[serde(default)]
    pub total_hosts: u32,
    #[serde(default)]
    pub device_count: u32,
}

/// Lightweight snapshot from `GET /scan/{id}/status`, consumed by the poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStatusSnapshot {
    pub scan_id: String,
    pub status: ScanStatus,
    /// Percent complete, 0-100
    pub progress: f64,
    #[serde(default)]
    pub device_count: u32,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Acknowledgement body from `POST /scan/{id}/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAck {
    #[serde(default)]
    pub scan_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
