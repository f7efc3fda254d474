//! IP protocol numbers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An IP protocol number (the IPv4 `protocol` header field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "ProtocolRepr", into = "String")]
pub struct IpProtocol(u8);

/// Named protocols understood in ACL lines and flow specs.
const NAMES: &[(&str, u8)] = &[
    ("icmp", 1),
    ("igmp", 2),
    ("ipinip", 4),
    ("tcp", 6),
    ("udp", 17),
    ("gre", 47),
    ("esp", 50),
    ("ahp", 51),
    ("ospf", 89),
    ("eigrp", 88),
    ("pim", 103),
    ("vrrp", 112),
    ("sctp", 132),
];

impl IpProtocol {
    pub const ICMP: Self = IpProtocol(1);
    pub const TCP: Self = IpProtocol(6);
    pub const UDP: Self = IpProtocol(17);

    pub const fn new(value: u8) -> Self {
        IpProtocol(value)
    }

    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns the well-known lowercase name, if any.
    pub fn name(&self) -> Option<&'static str> {
        NAMES
            .iter()
            .find(|(_, number)| *number == self.0)
            .map(|(name, _)| *name)
    }

    /// Returns true if packets of this protocol carry L4 ports.
    pub const fn has_ports(&self) -> bool {
        self.0 == Self::TCP.0 || self.0 == Self::UDP.0
    }

    pub const fn is_tcp(&self) -> bool {
        self.0 == Self::TCP.0
    }

    pub const fn is_icmp(&self) -> bool {
        self.0 == Self::ICMP.0
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name.to_uppercase()),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for IpProtocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<u8>() {
            return Ok(IpProtocol(number));
        }
        let lower = trimmed.to_lowercase();
        NAMES
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, number)| IpProtocol(*number))
            .ok_or_else(|| ParseError::InvalidProtocol(s.to_string()))
    }
}

impl From<u8> for IpProtocol {
    fn from(value: u8) -> Self {
        IpProtocol(value)
    }
}

impl From<IpProtocol> for String {
    fn from(protocol: IpProtocol) -> Self {
        protocol.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProtocolRepr {
    Number(u8),
    Name(String),
}

impl TryFrom<ProtocolRepr> for IpProtocol {
    type Error = ParseError;

    fn try_from(repr: ProtocolRepr) -> Result<Self, Self::Error> {
        match repr {
            ProtocolRepr::Number(number) => Ok(IpProtocol(number)),
            ProtocolRepr::Name(name) => name.parse(),
        }
    }
}
