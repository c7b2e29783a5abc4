//! Scan target validation.
//!
//! Runs before any network call. Only private/local IPv4 ranges are
//! accepted so the client cannot be pointed at public networks:
//! RFC 1918 (10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16) plus loopback
//! (127.0.0.0/8) and link-local (169.254.0.0/16). Range size is capped to
//! keep scans bounded.

use crate::error::{Error, Result};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

/// Maximum number of addresses allowed in one scan target (/24 equivalent).
pub const MAX_NETWORK_SIZE: u32 = 256;

/// What kind of target was validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    SingleIp,
    Network,
}

/// A target that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedTarget {
    pub target: String,
    pub kind: TargetKind,
    /// Number of addresses covered by the target.
    pub num_hosts: u32,
}

fn allowed_ranges() -> [Ipv4Network; 5] {
    // Parse of literal CIDRs cannot fail.
    [
        "10.0.0.0/8".parse().unwrap(),
        "172.16.0.0/12".parse().unwrap(),
        "192.168.0.0/16".parse().unwrap(),
        "127.0.0.0/8".parse().unwrap(),
        "169.254.0.0/16".parse().unwrap(),
    ]
}

/// Whether a single address falls inside the allowed private/local ranges.
pub fn is_private_ip(ip: Ipv4Addr) -> bool {
    allowed_ranges().iter().any(|net| net.contains(ip))
}

/// Validate a scan target: a single IPv4 address or an IPv4 CIDR network.
///
/// Returns the parsed target on success; rejects empty input, malformed
/// syntax, public ranges, and networks larger than [`MAX_NETWORK_SIZE`].
pub fn validate_target(target: &str) -> Result<ValidatedTarget> {
    let target = target.trim();
    if target.is_empty() {
        return Err(Error::Validation("target cannot be empty".to_string()));
    }

    // Single IP first: "192.168.1.1"
    if let Ok(ip) = target.parse::<Ipv4Addr>() {
        if !is_private_ip(ip) {
            return Err(Error::Validation(format!(
                "{} is not a private address; only private networks can be scanned",
                ip
            )));
        }
        return Ok(ValidatedTarget {
            target: target.to_string(),
            kind: TargetKind::SingleIp,
            num_hosts: 1,
        });
    }

    // Then CIDR: "192.168.1.0/24"
    let network: Ipv4Network = target.parse().map_err(|_| {
        Error::Validation(format!(
            "'{}' is not a valid IPv4 address or CIDR network",
            target
        ))
    })?;

    let entirely_private = allowed_ranges().iter().any(|allowed| {
        allowed.contains(network.network()) && allowed.contains(network.broadcast())
    });
    if !entirely_private {
        return Err(Error::Validation(format!(
            "{} is not entirely within private ranges; only private networks can be scanned",
            network
        )));
    }

    let size = network.size();
    if size > MAX_NETWORK_SIZE {
        return Err(Error::Validation(format!(
            "{} covers {} addresses, above the {} address limit; use a /24 or smaller",
            network, size, MAX_NETWORK_SIZE
        )));
    }

    Ok(ValidatedTarget {
        target: target.to_string(),
        kind: TargetKind::Network,
        num_hosts: size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_private_single_ip() {
        let v = validate_target("192.168.1.1").unwrap();
        assert_eq!(v.kind, TargetKind::SingleIp);
        assert_eq!(v.num_hosts, 1);
    }

    #[test]
    fn test_accepts_private_cidr() {
        let v = validate_target("10.0.0.0/24").unwrap();
        assert_eq!(v.kind, TargetKind::Network);
        assert_eq!(v.num_hosts, 256);
    }

    #[test]
    fn test_accepts_loopback_and_link_local() {
        assert!(validate_target("127.0.0.1").is_ok());
        assert!(validate_target("169.254.10.0/24").is_ok());
    }

    #[test]
    fn test_rejects_public_targets() {
        assert!(validate_target("8.8.8.8").is_err());
        assert!(validate_target("1.2.3.0/24").is_err());
    }

    #[test]
    fn test_rejects_oversized_network() {
        let err = validate_target("10.0.0.0/16").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(validate_target("").is_err());
        assert!(validate_target("not-a-network").is_err());
        assert!(validate_target("192.168.1.0/33").is_err());
    }

    #[test]
    fn test_172_boundary() {
        // 172.16/12 covers 172.16.0.0 - 172.31.255.255
        assert!(validate_target("172.16.0.1").is_ok());
        assert!(validate_target("172.31.255.0/24").is_ok());
        assert!(validate_target("172.32.0.1").is_err());
    }
}
