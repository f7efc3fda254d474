//! Concrete packet descriptors.

use crate::field::HeaderField;
use serde::{Deserialize, Serialize};
use sonic_acl_types::{IpProtocol, TcpFlags};
use std::fmt;
use std::net::Ipv4Addr;

/// One concrete packet header: a single point in header space.
///
/// Fields that do not apply to the protocol (ports for ICMP, flags for UDP,
/// ICMP type/code for TCP) hold 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    ip_protocol: IpProtocol,
    src_port: u16,
    dst_port: u16,
    tcp_flags: TcpFlags,
    icmp_type: u8,
    icmp_code: u8,
    packet_length: u16,
    fragment_offset: u16,
}

impl Flow {
    /// Creates a flow with every optional field zeroed.
    pub fn new(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, ip_protocol: IpProtocol) -> Self {
        Self {
            src_ip,
            dst_ip,
            ip_protocol,
            src_port: 0,
            dst_port: 0,
            tcp_flags: TcpFlags::NONE,
            icmp_type: 0,
            icmp_code: 0,
            packet_length: 0,
            fragment_offset: 0,
        }
    }

    pub fn with_ports(mut self, src_port: u16, dst_port: u16) -> Self {
        self.src_port = src_port;
        self.dst_port = dst_port;
        self
    }

    pub fn with_tcp_flags(mut self, tcp_flags: TcpFlags) -> Self {
        self.tcp_flags = tcp_flags;
        self
    }

    pub fn with_icmp(mut self, icmp_type: u8, icmp_code: u8) -> Self {
        self.icmp_type = icmp_type;
        self.icmp_code = icmp_code;
        self
    }

    pub fn with_packet_length(mut self, packet_length: u16) -> Self {
        self.packet_length = packet_length;
        self
    }

    pub fn with_fragment_offset(mut self, fragment_offset: u16) -> Self {
        self.fragment_offset = fragment_offset;
        self
    }

    pub fn src_ip(&self) -> Ipv4Addr {
        self.src_ip
    }

    pub fn dst_ip(&self) -> Ipv4Addr {
        self.dst_ip
    }

    pub fn ip_protocol(&self) -> IpProtocol {
        self.ip_protocol
    }

    pub fn src_port(&self) -> u16 {
        self.src_port
    }

    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }

    pub fn tcp_flags(&self) -> TcpFlags {
        self.tcp_flags
    }

    pub fn icmp_type(&self) -> u8 {
        self.icmp_type
    }

    pub fn icmp_code(&self) -> u8 {
        self.icmp_code
    }

    pub fn packet_length(&self) -> u16 {
        self.packet_length
    }

    pub fn fragment_offset(&self) -> u16 {
        self.fragment_offset
    }

    /// The flow's value for `field`, as a header space coordinate.
    pub fn value(&self, field: HeaderField) -> u32 {
        match field {
            HeaderField::SrcIp => u32::from(self.src_ip),
            HeaderField::DstIp => u32::from(self.dst_ip),
            HeaderField::IpProtocol => u32::from(self.ip_protocol.value()),
            HeaderField::SrcPort => u32::from(self.src_port),
            HeaderField::DstPort => u32::from(self.dst_port),
            HeaderField::TcpFlags => u32::from(self.tcp_flags.bits()),
            HeaderField::IcmpType => u32::from(self.icmp_type),
            HeaderField::IcmpCode => u32::from(self.icmp_code),
            HeaderField::PacketLength => u32::from(self.packet_length),
            HeaderField::FragmentOffset => u32::from(self.fragment_offset),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ip_protocol.has_ports() {
            write!(
                f,
                "{}:{} -> {}:{} {}",
                self.src_ip, self.src_port, self.dst_ip, self.dst_port, self.ip_protocol
            )?;
            if self.ip_protocol.is_tcp() && self.tcp_flags != TcpFlags::NONE {
                write!(f, " [{}]", self.tcp_flags)?;
            }
            Ok(())
        } else if self.ip_protocol.is_icmp() {
            write!(
                f,
                "{} -> {} ICMP (type={}, code={})",
                self.src_ip, self.dst_ip, self.icmp_type, self.icmp_code
            )
        } else {
            write!(f, "{} -> {} {}", self.src_ip, self.dst_ip, self.ip_protocol)
        }
    }
}
