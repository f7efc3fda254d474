//! ICMP message types and codes.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ICMP type, optionally narrowed to one code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IcmpMatch {
    pub icmp_type: u8,
    pub code: Option<u8>,
}

/// Named ICMP messages as written in ACL lines.
const ICMP_NAMES: &[(&str, u8, Option<u8>)] = &[
    ("echo-reply", 0, None),
    ("unreachable", 3, None),
    ("net-unreachable", 3, Some(0)),
    ("host-unreachable", 3, Some(1)),
    ("protocol-unreachable", 3, Some(2)),
    ("port-unreachable", 3, Some(3)),
    ("packet-too-big", 3, Some(4)),
    ("administratively-prohibited", 3, Some(13)),
    ("source-quench", 4, None),
    ("redirect", 5, None),
    ("echo", 8, None),
    ("router-advertisement", 9, None),
    ("router-solicitation", 10, None),
    ("time-exceeded", 11, None),
    ("ttl-exceeded", 11, Some(0)),
    ("parameter-problem", 12, None),
    ("timestamp-request", 13, None),
    ("timestamp-reply", 14, None),
];

/// Looks up a named ICMP message.
pub fn icmp_by_name(name: &str) -> Option<IcmpMatch> {
    let lower = name.trim().to_lowercase();
    ICMP_NAMES
        .iter()
        .find(|(known, _, _)| *known == lower)
        .map(|(_, icmp_type, code)| IcmpMatch {
            icmp_type: *icmp_type,
            code: *code,
        })
}

impl IcmpMatch {
    pub const fn new(icmp_type: u8, code: Option<u8>) -> Self {
        Self { icmp_type, code }
    }

    /// Parses a numeric type and optional numeric code.
    pub fn parse(icmp_type: &str, code: Option<&str>) -> Result<Self, ParseError> {
        let icmp_type = icmp_type
            .trim()
            .parse::<u8>()
            .map_err(|_| ParseError::InvalidIcmp(icmp_type.to_string()))?;
        let code = code
            .map(|c| {
                c.trim()
                    .parse::<u8>()
                    .map_err(|_| ParseError::InvalidIcmp(c.to_string()))
            })
            .transpose()?;
        Ok(Self { icmp_type, code })
    }

    pub fn matches(&self, icmp_type: u8, code: u8) -> bool {
        self.icmp_type == icmp_type && self.code.map_or(true, |c| c == code)
    }
}

impl fmt::Display for IcmpMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} {}", self.icmp_type, code),
            None => write!(f, "{}", self.icmp_type),
        }
    }
}
