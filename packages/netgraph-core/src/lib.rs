//! Netgraph Core Library
//!
//! This crate provides the client-side core for driving network scans and
//! exploring their results:
//! - Scan lifecycle control (single-flight start/cancel/reset, cancellable
//!   status polling against a REST backend)
//! - Topology modeling (device list to severity-tiered star graph)
//! - An accessible graph view with one authoritative selection state for
//!   pointer and keyboard input, rendered through a pluggable port
//!
//! # Example
//!
//! ```no_run
//! use netgraph_core::backend::{HttpBackend, ScanRequest, ScanType};
//! use netgraph_core::session::ScanController;
//! use netgraph_core::topology::build_topology;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = Arc::new(HttpBackend::new("http://127.0.0.1:8000/api")?);
//!     let controller = ScanController::with_defaults(backend);
//!
//!     // Start a scan and let polling run in the background
//!     let session = controller
//!         .start(ScanRequest::new("192.168.1.0/24", ScanType::Quick))
//!         .await?;
//!     println!("Scan {} started", session.session_id);
//!
//!     // ... once the controller reaches a terminal phase:
//!     if let Some(session) = controller.session() {
//!         let model = build_topology(&session.devices, Some("192.168.1.1"));
//!         println!("{} devices, {} edges", model.nodes.len(), model.edges.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod session;
pub mod topology;
pub mod validate;
pub mod view;

// Re-export commonly used types
pub use backend::{Device, HttpBackend, ScanBackend, ScanRequest, ScanStatus, ScanType};
pub use error::{Error, Result};
pub use session::{Phase, PollOptions, ScanController, ScanSession, StatusPoller};
pub use topology::{build_topology, GraphEdge, GraphNode, SeverityTier, TopologyModel};
pub use view::{Direction, GraphView, KeyCommand, PointerEvent, Renderer, SelectionState};
