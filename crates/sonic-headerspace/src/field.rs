//! Packet header fields tracked by the header space.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Number of tracked header fields.
pub const FIELD_COUNT: usize = 10;

/// A packet header field, with its value domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderField {
    SrcIp,
    DstIp,
    IpProtocol,
    SrcPort,
    DstPort,
    TcpFlags,
    IcmpType,
    IcmpCode,
    PacketLength,
    FragmentOffset,
}

impl HeaderField {
    /// All fields, in cube order.
    pub const ALL: [HeaderField; FIELD_COUNT] = [
        HeaderField::SrcIp,
        HeaderField::DstIp,
        HeaderField::IpProtocol,
        HeaderField::SrcPort,
        HeaderField::DstPort,
        HeaderField::TcpFlags,
        HeaderField::IcmpType,
        HeaderField::IcmpCode,
        HeaderField::PacketLength,
        HeaderField::FragmentOffset,
    ];

    /// Largest value in this field's domain.
    pub const fn domain_max(&self) -> u32 {
        match self {
            Self::SrcIp | Self::DstIp => u32::MAX,
            Self::IpProtocol | Self::TcpFlags | Self::IcmpType | Self::IcmpCode => 0xff,
            Self::SrcPort | Self::DstPort | Self::PacketLength => 0xffff,
            // 13-bit fragment offset
            Self::FragmentOffset => 0x1fff,
        }
    }

    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Renders one value of this field for humans.
    pub fn format_value(&self, value: u32) -> String {
        match self {
            Self::SrcIp | Self::DstIp => Ipv4Addr::from(value).to_string(),
            Self::TcpFlags => format!("0x{:02x}", value),
            _ => value.to_string(),
        }
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SrcIp => "srcIp",
            Self::DstIp => "dstIp",
            Self::IpProtocol => "ipProtocol",
            Self::SrcPort => "srcPort",
            Self::DstPort => "dstPort",
            Self::TcpFlags => "tcpFlags",
            Self::IcmpType => "icmpType",
            Self::IcmpCode => "icmpCode",
            Self::PacketLength => "packetLength",
            Self::FragmentOffset => "fragmentOffset",
        };
        write!(f, "{}", name)
    }
}
