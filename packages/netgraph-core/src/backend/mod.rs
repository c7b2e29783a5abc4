//! Scan backend access.
//!
//! The backend is reached only through the [`ScanBackend`] trait so hosts
//! and tests can inject their own implementation; [`HttpBackend`] is the
//! production one.

mod config;
mod http;
mod types;

pub use config::{
    generate_example_config, get_config_file_path_string, load_backend_config, BackendConfig,
    ConfigSource,
};
pub use http::HttpBackend;
pub use types::{
    CancelAck, Device, Port, ScanRequest, ScanResponse, ScanStatus, ScanStatusSnapshot, ScanType,
};

use crate::error::Result;
use async_trait::async_trait;

/// Port to the scan backend's REST API.
///
/// Implementations map transport problems to [`crate::Error::Network`] and
/// error bodies to [`crate::Error::Backend`].
#[async_trait]
pub trait ScanBackend: Send + Sync {
    /// `POST /scan` - start a new scan.
    async fn start_scan(&self, request: &ScanRequest) -> Result<ScanResponse>;

    /// `GET /scan/{id}/status` - lightweight status snapshot.
    async fn scan_status(&self, scan_id: &str) -> Result<ScanStatusSnapshot>;

    /// `GET /scan/{id}` - full result including discovered devices.
    async fn scan_result(&self, scan_id: &str) -> Result<ScanResponse>;

    /// `POST /scan/{id}/cancel` - best-effort cancellation.
    async fn cancel_scan(&self, scan_id: &str) -> Result<CancelAck>;
}
