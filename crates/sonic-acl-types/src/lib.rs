//! Common ACL match types for filter analysis.
//!
//! This crate provides type-safe representations of the literal values that
//! appear in ACL lines:
//!
//! - [`Ipv4Prefix`]: IPv4 network prefixes (CIDR notation)
//! - [`Ipv4Wildcard`]: IPv4 address plus wildcard (don't-care) mask
//! - [`IpProtocol`]: IP protocol numbers with well-known names
//! - [`PortRange`]: closed L4 port ranges, with named ports
//! - [`TcpFlags`]: TCP flag bytes
//! - [`IcmpMatch`]: ICMP type/code pairs, with named messages

mod icmp;
mod ip;
mod port;
mod protocol;
mod tcp;

pub use icmp::{icmp_by_name, IcmpMatch};
pub use ip::{Ipv4Prefix, Ipv4Wildcard, MAX_WILDCARD_INTERVALS};
pub use port::{parse_port, port_by_name, PortRange, MAX_PORT};
pub use protocol::IpProtocol;
pub use tcp::TcpFlags;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid wildcard mask: {0}")]
    InvalidWildcard(String),

    #[error("wildcard mask {0} expands to more than {1} address ranges")]
    UnsupportedWildcard(String, usize),

    #[error("invalid IP protocol: {0}")]
    InvalidProtocol(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("invalid ICMP type or code: {0}")]
    InvalidIcmp(String),

    #[error("invalid TCP flag: {0}")]
    InvalidTcpFlag(String),
}
