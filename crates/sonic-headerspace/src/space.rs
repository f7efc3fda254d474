//! Unions of cubes (disjunctive normal form).

use crate::cube::Cube;
use crate::error::SpaceError;
use crate::field::HeaderField;
use crate::flow::Flow;
use crate::interval::IntervalSet;
use sonic_acl_types::IpProtocol;
use std::fmt;

/// A set of packet headers, stored as a union of non-empty cubes.
///
/// Cubes may overlap. The empty space has no cubes, so [`HeaderSpace::is_empty`]
/// is exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HeaderSpace {
    cubes: Vec<Cube>,
}

impl HeaderSpace {
    /// Matches no packet.
    pub fn empty() -> Self {
        Self { cubes: Vec::new() }
    }

    /// Every point of the header domain, well-formed or not.
    pub fn all_headers() -> Self {
        Self::from_cube(Cube::all())
    }

    /// Every well-formed IPv4 packet.
    ///
    /// Ports vary only for TCP and UDP, flags only for TCP, and ICMP
    /// type/code only for ICMP; for other protocols those fields are 0.
    pub fn universe() -> Self {
        let zero = |field: HeaderField| IntervalSet::single(field.domain_max(), 0);
        let proto = |value: IpProtocol| {
            IntervalSet::single(HeaderField::IpProtocol.domain_max(), u32::from(value.value()))
        };
        let other_protocols = IntervalSet::full(HeaderField::IpProtocol.domain_max()).difference(
            &IntervalSet::from_values(
                HeaderField::IpProtocol.domain_max(),
                [IpProtocol::ICMP, IpProtocol::TCP, IpProtocol::UDP]
                    .iter()
                    .map(|p| u32::from(p.value())),
            ),
        );

        let no_icmp = |cube: Cube| {
            cube.with(HeaderField::IcmpType, &zero(HeaderField::IcmpType))
                .with(HeaderField::IcmpCode, &zero(HeaderField::IcmpCode))
        };
        let no_ports = |cube: Cube| {
            cube.with(HeaderField::SrcPort, &zero(HeaderField::SrcPort))
                .with(HeaderField::DstPort, &zero(HeaderField::DstPort))
        };
        let no_flags = |cube: Cube| cube.with(HeaderField::TcpFlags, &zero(HeaderField::TcpFlags));

        let tcp = no_icmp(Cube::all().with(HeaderField::IpProtocol, &proto(IpProtocol::TCP)));
        let udp = no_flags(no_icmp(
            Cube::all().with(HeaderField::IpProtocol, &proto(IpProtocol::UDP)),
        ));
        let icmp = no_flags(no_ports(
            Cube::all().with(HeaderField::IpProtocol, &proto(IpProtocol::ICMP)),
        ));
        let other = no_flags(no_ports(no_icmp(
            Cube::all().with(HeaderField::IpProtocol, &other_protocols),
        )));

        Self {
            cubes: vec![icmp, tcp, udp, other],
        }
    }

    /// A space holding a single cube (empty if the cube is).
    pub fn from_cube(cube: Cube) -> Self {
        Self::from_cubes(vec![cube])
    }

    /// A space holding the union of `cubes`; empty cubes are dropped.
    pub fn from_cubes(cubes: Vec<Cube>) -> Self {
        Self {
            cubes: cubes.into_iter().filter(|c| !c.is_empty()).collect(),
        }
    }

    pub fn cubes(&self) -> &[Cube] {
        &self.cubes
    }

    pub fn cube_count(&self) -> usize {
        self.cubes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }

    /// Concrete containment test.
    pub fn matches(&self, flow: &Flow) -> bool {
        self.cubes.iter().any(|cube| cube.contains(flow))
    }

    pub fn intersect(&self, other: &HeaderSpace) -> HeaderSpace {
        let mut cubes = Vec::new();
        for a in &self.cubes {
            for b in &other.cubes {
                if let Some(c) = a.intersect(b) {
                    cubes.push(c);
                }
            }
        }
        HeaderSpace { cubes }
    }

    /// Narrows every cube's `field` to `set`.
    pub fn constrain(&self, field: HeaderField, set: &IntervalSet) -> HeaderSpace {
        Self::from_cubes(
            self.cubes
                .iter()
                .map(|cube| cube.clone().with(field, set))
                .collect(),
        )
    }

    pub fn intersects(&self, other: &HeaderSpace) -> bool {
        self.cubes
            .iter()
            .any(|a| other.cubes.iter().any(|b| a.intersects(b)))
    }

    /// Union of both spaces. Cubes already covered by a single cube on the
    /// other side are absorbed.
    pub fn union(&self, other: &HeaderSpace) -> HeaderSpace {
        let mut cubes: Vec<Cube> = self
            .cubes
            .iter()
            .filter(|a| !other.cubes.iter().any(|b| a.is_subset_of(b)))
            .cloned()
            .collect();
        for b in &other.cubes {
            if !cubes.iter().any(|a| b.is_subset_of(a)) {
                cubes.push(b.clone());
            }
        }
        HeaderSpace { cubes }
    }

    /// Set difference `self \ other`, without a size bound.
    pub fn subtract(&self, other: &HeaderSpace) -> HeaderSpace {
        let mut remaining = self.cubes.clone();
        for b in &other.cubes {
            if remaining.is_empty() {
                break;
            }
            remaining = remaining.iter().flat_map(|a| a.subtract(b)).collect();
        }
        HeaderSpace { cubes: remaining }
    }

    /// Set difference `self \ other`.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::SpaceLimitExceeded`] if an intermediate result
    /// holds more than `max_cubes` cubes.
    pub fn subtract_bounded(
        &self,
        other: &HeaderSpace,
        max_cubes: usize,
    ) -> Result<HeaderSpace, SpaceError> {
        let mut remaining = self.cubes.clone();
        for b in &other.cubes {
            if remaining.is_empty() {
                break;
            }
            if !remaining.iter().any(|a| a.intersects(b)) {
                continue;
            }
            let mut next = Vec::with_capacity(remaining.len());
            for a in &remaining {
                next.extend(a.subtract(b));
                if next.len() > max_cubes {
                    return Err(SpaceError::SpaceLimitExceeded {
                        limit: max_cubes,
                        reached: next.len(),
                    });
                }
            }
            remaining = next;
        }
        Ok(HeaderSpace { cubes: remaining })
    }

    pub fn is_subset_of(&self, other: &HeaderSpace) -> bool {
        self.subtract(other).is_empty()
    }

    /// Sum of cube volumes. Exact when cubes are disjoint, an upper bound
    /// otherwise.
    pub fn volume(&self) -> f64 {
        self.cubes.iter().map(Cube::volume).sum()
    }
}

impl From<Cube> for HeaderSpace {
    fn from(cube: Cube) -> Self {
        Self::from_cube(cube)
    }
}

impl fmt::Display for HeaderSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cubes.is_empty() {
            return write!(f, "(empty)");
        }
        let parts: Vec<String> = self.cubes.iter().map(|c| format!("[{}]", c)).collect();
        write!(f, "{}", parts.join(" | "))
    }
}
