//! Topology model builder.
//!
//! Pure transform from a flat device list plus an optional gateway IP to a
//! positioned star graph. No I/O and no randomness: identical inputs give
//! identical output, node order follows input order, so the result is
//! suitable for golden assertions and render diffing.

use crate::backend::Device;
use serde::{Deserialize, Serialize};

/// Vulnerability severity tier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Critical,
    High,
    Medium,
    Low,
    None,
}

impl SeverityTier {
    /// Fixed thresholds over the device's vulnerability count.
    pub fn from_vulnerability_count(count: u32) -> Self {
        match count {
            0 => SeverityTier::None,
            1..=2 => SeverityTier::Medium,
            3..=4 => SeverityTier::High,
            _ => SeverityTier::Critical,
        }
    }
}

impl std::fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeverityTier::Critical => write!(f, "critical"),
            SeverityTier::High => write!(f, "high"),
            SeverityTier::Medium => write!(f, "medium"),
            SeverityTier::Low => write!(f, "low"),
            SeverityTier::None => write!(f, "none"),
        }
    }
}

/// Node glyph, derived from the backend's device type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    /// Routers, firewalls, switches
    Diamond,
    /// Servers and NAS boxes
    Square,
    /// Printers and IoT gear
    Triangle,
    /// Everything else
    Circle,
}

impl NodeShape {
    pub fn from_device_type(device_type: Option<&str>) -> Self {
        match device_type {
            Some("router") | Some("firewall") | Some("switch") | Some("network_device") => {
                NodeShape::Diamond
            }
            Some("server") | Some("nas") => NodeShape::Square,
            Some("printer") | Some("iot") | Some("camera") => NodeShape::Triangle,
            _ => NodeShape::Circle,
        }
    }
}

/// One device positioned in the graph. Recomputed whenever the device list
/// changes; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Device identity; the device IP is unique within one scan
    pub id: String,
    pub device: Device,
    pub severity: SeverityTier,
    pub shape: NodeShape,
    /// Layout hint: larger rings sit closer to the center
    pub ring_level: u8,
    pub is_gateway: bool,
    pub is_offline: bool,
}

impl GraphNode {
    /// Human-readable label for display and assistive text.
    pub fn label(&self) -> String {
        match &self.device.hostname {
            Some(hostname) => format!("{} ({})", hostname, self.device.ip),
            None => self.device.ip.clone(),
        }
    }
}

/// Edge between the gateway and one non-gateway device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// The full graph model for one render pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyModel {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl TopologyModel {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn gateway(&self) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.is_gateway)
    }
}

/// Ring placement: gateway at the center, then out by severity.
fn ring_level(is_gateway: bool, severity: SeverityTier) -> u8 {
    if is_gateway {
        return 10;
    }
    match severity {
        SeverityTier::Critical => 7,
        SeverityTier::High => 5,
        SeverityTier::Medium => 3,
        SeverityTier::Low | SeverityTier::None => 1,
    }
}

/// Build the graph model for a device list.
///
/// The gateway is the device whose IP equals `gateway_ip`; when present,
/// every other device gets one edge to it (star topology). Without a
/// gateway the nodes stand isolated. An empty device list yields an empty
/// model.
pub fn build_topology(devices: &[Device], gateway_ip: Option<&str>) -> TopologyModel {
    let nodes: Vec<GraphNode> = devices
        .iter()
        .map(|device| {
            let is_gateway = gateway_ip.is_some_and(|gw| gw == device.ip);
            let severity = SeverityTier::from_vulnerability_count(device.vulnerability_count);
            GraphNode {
                id: device.ip.clone(),
                device: device.clone(),
                severity,
                shape: NodeShape::from_device_type(device.device_type.as_deref()),
                ring_level: ring_level(is_gateway, severity),
                is_gateway,
                is_offline: !device.is_up,
            }
        })
        .collect();

    let edges = match nodes.iter().find(|n| n.is_gateway) {
        Some(gateway) => nodes
            .iter()
            .filter(|n| !n.is_gateway)
            .map(|n| GraphEdge {
                id: format!("{}->{}", gateway.id, n.id),
                source: gateway.id.clone(),
                target: n.id.clone(),
            })
            .collect(),
        None => Vec::new(),
    };

    TopologyModel { nodes, edges }
}
