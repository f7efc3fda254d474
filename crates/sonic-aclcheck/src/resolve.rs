//! Turning parsed lines into header spaces.

use crate::filter::{Filter, FilterLine};
use crate::line::{AddressMatch, MatchSpec, PortMatch};
use crate::objects::{ObjectGroups, ReferenceError};
use sonic_headerspace::{Cube, HeaderField, HeaderSpace, IntervalSet};
use std::sync::OnceLock;
use tracing::debug;

/// The header space of one line, or why it has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(HeaderSpace),
    Undefined { name: String },
    /// `path` starts and ends with the same group.
    Circular { path: Vec<String> },
}

impl Resolution {
    pub fn space(&self) -> Option<&HeaderSpace> {
        match self {
            Resolution::Resolved(space) => Some(space),
            _ => None,
        }
    }

    /// The reference problem for unresolved lines.
    pub fn problem(&self) -> Option<ReferenceError> {
        match self {
            Resolution::Resolved(_) => None,
            Resolution::Undefined { name } => Some(ReferenceError::Undefined { name: name.clone() }),
            Resolution::Circular { path } => Some(ReferenceError::Circular { path: path.clone() }),
        }
    }
}

impl From<ReferenceError> for Resolution {
    fn from(err: ReferenceError) -> Self {
        match err {
            ReferenceError::Undefined { name } => Resolution::Undefined { name },
            ReferenceError::Circular { path } => Resolution::Circular { path },
        }
    }
}

/// Every well-formed packet, computed once.
pub fn packet_universe() -> &'static HeaderSpace {
    static UNIVERSE: OnceLock<HeaderSpace> = OnceLock::new();
    UNIVERSE.get_or_init(HeaderSpace::universe)
}

/// Resolves a line's match against the node's object groups.
///
/// The result only contains well-formed packets, so ports appear only for
/// TCP/UDP, flags only for TCP and ICMP type/code only for ICMP.
pub fn resolve(spec: &MatchSpec, objects: &ObjectGroups) -> Resolution {
    match build_cube(spec, objects) {
        Ok(cube) => Resolution::Resolved(HeaderSpace::from_cube(cube).intersect(packet_universe())),
        Err(err) => err.into(),
    }
}

fn build_cube(spec: &MatchSpec, objects: &ObjectGroups) -> Result<Cube, ReferenceError> {
    let mut cube = Cube::all();

    if let Some(protocol) = spec.protocol {
        cube.constrain(
            HeaderField::IpProtocol,
            &IntervalSet::single(HeaderField::IpProtocol.domain_max(), u32::from(protocol.value())),
        );
    }
    cube.constrain(HeaderField::SrcIp, &address_set(&spec.src, objects)?);
    cube.constrain(HeaderField::DstIp, &address_set(&spec.dst, objects)?);
    if let Some(port) = &spec.src_port {
        cube.constrain(HeaderField::SrcPort, &port_set(port, objects)?);
    }
    if let Some(port) = &spec.dst_port {
        cube.constrain(HeaderField::DstPort, &port_set(port, objects)?);
    }
    if !spec.tcp_flags.is_unconstrained() {
        cube.constrain(HeaderField::TcpFlags, &spec.tcp_flags.allowed_bytes());
    }
    if let Some(icmp) = spec.icmp {
        cube.constrain(
            HeaderField::IcmpType,
            &IntervalSet::single(HeaderField::IcmpType.domain_max(), u32::from(icmp.icmp_type)),
        );
        if let Some(code) = icmp.code {
            cube.constrain(
                HeaderField::IcmpCode,
                &IntervalSet::single(HeaderField::IcmpCode.domain_max(), u32::from(code)),
            );
        }
    }
    if spec.fragments {
        let max = HeaderField::FragmentOffset.domain_max();
        cube.constrain(HeaderField::FragmentOffset, &IntervalSet::range(max, 1, max));
    }
    if let Some((min, max)) = spec.packet_length {
        cube.constrain(
            HeaderField::PacketLength,
            &IntervalSet::range(HeaderField::PacketLength.domain_max(), u32::from(min), u32::from(max)),
        );
    }
    Ok(cube)
}

fn address_set(address: &AddressMatch, objects: &ObjectGroups) -> Result<IntervalSet, ReferenceError> {
    match address {
        AddressMatch::Group(name) => objects.address_set(name),
        literal => Ok(literal
            .literal_set()
            .unwrap_or_else(|| IntervalSet::full(HeaderField::SrcIp.domain_max()))),
    }
}

fn port_set(port: &PortMatch, objects: &ObjectGroups) -> Result<IntervalSet, ReferenceError> {
    match port {
        PortMatch::Group(name) => objects.port_set(name),
        literal => Ok(literal
            .literal_set()
            .unwrap_or_else(|| IntervalSet::full(HeaderField::SrcPort.domain_max()))),
    }
}

/// A filter with every line resolved up front.
#[derive(Debug, Clone)]
pub struct ResolvedFilter<'a> {
    filter: &'a Filter,
    resolutions: Vec<Resolution>,
}

impl<'a> ResolvedFilter<'a> {
    pub fn new(filter: &'a Filter, objects: &ObjectGroups) -> Self {
        let resolutions: Vec<Resolution> = filter
            .lines()
            .iter()
            .map(|line| resolve(line.spec(), objects))
            .collect();
        debug!(
            node = %filter.node(),
            filter = %filter.name(),
            lines = resolutions.len(),
            cubes = resolutions
                .iter()
                .filter_map(Resolution::space)
                .map(HeaderSpace::cube_count)
                .sum::<usize>(),
            "resolved filter"
        );
        Self {
            filter,
            resolutions,
        }
    }

    pub fn filter(&self) -> &'a Filter {
        self.filter
    }

    /// Lines paired with their resolutions, in order.
    pub fn lines(&self) -> impl Iterator<Item = (&'a FilterLine, &Resolution)> + '_ {
        self.filter.lines().iter().zip(self.resolutions.iter())
    }
}
