//! Conjunctions of per-field constraints.

use crate::field::{HeaderField, FIELD_COUNT};
use crate::flow::Flow;
use crate::interval::IntervalSet;
use std::fmt;

/// A conjunction of one [`IntervalSet`] per header field.
///
/// A cube with any empty field matches nothing; [`crate::HeaderSpace`]
/// never stores such cubes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cube {
    fields: [IntervalSet; FIELD_COUNT],
}

impl Cube {
    /// The unconstrained cube: every field spans its full domain.
    pub fn all() -> Self {
        Self {
            fields: std::array::from_fn(|i| IntervalSet::full(HeaderField::ALL[i].domain_max())),
        }
    }

    /// Returns the constraint on `field`.
    pub fn get(&self, field: HeaderField) -> &IntervalSet {
        &self.fields[field.index()]
    }

    /// Narrows `field` to its intersection with `set`.
    pub fn constrain(&mut self, field: HeaderField, set: &IntervalSet) {
        let slot = &mut self.fields[field.index()];
        *slot = slot.intersect(set);
    }

    /// Builder form of [`Cube::constrain`].
    pub fn with(mut self, field: HeaderField, set: &IntervalSet) -> Self {
        self.constrain(field, set);
        self
    }

    /// Builder shorthand for a closed range on one field.
    pub fn with_range(self, field: HeaderField, lo: u32, hi: u32) -> Self {
        let set = IntervalSet::range(field.domain_max(), lo, hi);
        self.with(field, &set)
    }

    /// Builder shorthand for a single value on one field.
    pub fn with_value(self, field: HeaderField, value: u32) -> Self {
        self.with_range(field, value, value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().any(IntervalSet::is_empty)
    }

    /// Field-wise intersection; `None` when any field becomes empty.
    pub fn intersect(&self, other: &Cube) -> Option<Cube> {
        let mut fields = self.fields.clone();
        for (slot, constraint) in fields.iter_mut().zip(other.fields.iter()) {
            *slot = slot.intersect(constraint);
            if slot.is_empty() {
                return None;
            }
        }
        Some(Cube { fields })
    }

    pub fn intersects(&self, other: &Cube) -> bool {
        self.fields
            .iter()
            .zip(other.fields.iter())
            .all(|(a, b)| a.intersects(b))
    }

    /// Set difference `self \ other` as pairwise-disjoint cubes.
    ///
    /// Piece *i* agrees with `other` on every field before *i*, lies outside
    /// `other` on field *i*, and keeps `self`'s constraint afterwards, so at
    /// most [`FIELD_COUNT`] pieces are produced.
    pub fn subtract(&self, other: &Cube) -> Vec<Cube> {
        let Some(overlap) = self.intersect(other) else {
            return vec![self.clone()];
        };

        let mut pieces = Vec::new();
        let mut prefix = self.clone();
        for i in 0..FIELD_COUNT {
            let outside = self.fields[i].difference(&other.fields[i]);
            if !outside.is_empty() {
                let mut piece = prefix.clone();
                piece.fields[i] = outside;
                pieces.push(piece);
            }
            prefix.fields[i] = overlap.fields[i].clone();
        }
        pieces
    }

    pub fn is_subset_of(&self, other: &Cube) -> bool {
        self.fields
            .iter()
            .zip(other.fields.iter())
            .all(|(a, b)| a.is_subset_of(b))
    }

    pub fn contains(&self, flow: &Flow) -> bool {
        self.first_excluding_field(flow).is_none()
    }

    /// The first field (in cube order) whose constraint excludes `flow`.
    pub fn first_excluding_field(&self, flow: &Flow) -> Option<HeaderField> {
        HeaderField::ALL
            .into_iter()
            .find(|field| !self.fields[field.index()].contains(flow.value(*field)))
    }

    /// Number of headers in the cube, as a float (the exact count can
    /// exceed 128 bits).
    pub fn volume(&self) -> f64 {
        self.fields.iter().map(|set| set.len() as f64).product()
    }

    /// Fields that are narrower than their full domain.
    pub fn constrained_fields(&self) -> impl Iterator<Item = HeaderField> + '_ {
        HeaderField::ALL
            .into_iter()
            .filter(|field| !self.fields[field.index()].is_full())
    }
}

impl fmt::Display for Cube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .constrained_fields()
            .map(|field| {
                let set = self.get(field);
                let values: Vec<String> = set
                    .ranges()
                    .iter()
                    .map(|&(lo, hi)| {
                        if lo == hi {
                            field.format_value(lo)
                        } else {
                            format!("{}-{}", field.format_value(lo), field.format_value(hi))
                        }
                    })
                    .collect();
                format!("{}={}", field, values.join(","))
            })
            .collect();
        if parts.is_empty() {
            write!(f, "*")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_acl_types::IpProtocol;
    use std::net::Ipv4Addr;

    fn tcp_port(port: u32) -> Cube {
        Cube::all()
            .with_value(HeaderField::IpProtocol, 6)
            .with_value(HeaderField::DstPort, port)
    }

    #[test]
    fn test_all_is_unconstrained() {
        let cube = Cube::all();
        assert!(!cube.is_empty());
        assert_eq!(cube.constrained_fields().count(), 0);
        assert_eq!(cube.to_string(), "*");
    }

    #[test]
    fn test_intersect_disjoint_is_none() {
        assert!(tcp_port(80).intersect(&tcp_port(443)).is_none());
        assert!(!tcp_port(80).intersects(&tcp_port(443)));
    }

    #[test]
    fn test_subtract_disjoint_returns_self() {
        let a = tcp_port(80);
        assert_eq!(a.subtract(&tcp_port(443)), vec![a.clone()]);
    }

    #[test]
    fn test_subtract_superset_is_empty() {
        assert!(tcp_port(80).subtract(&Cube::all()).is_empty());
    }

    #[test]
    fn test_subtract_pieces_are_disjoint_and_exact() {
        let all = Cube::all();
        let pieces = all.subtract(&tcp_port(80));
        // ipProtocol != 6, or ipProtocol == 6 and dstPort != 80
        assert_eq!(pieces.len(), 2);
        assert!(!pieces[0].intersects(&pieces[1]));
        for piece in &pieces {
            assert!(!piece.intersects(&tcp_port(80)));
        }
    }

    #[test]
    fn test_contains_and_first_excluding_field() {
        let cube = tcp_port(80);
        let web = Flow::new(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2), IpProtocol::TCP)
            .with_ports(40000, 80);
        let dns = Flow::new(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2), IpProtocol::UDP)
            .with_ports(40000, 53);
        assert!(cube.contains(&web));
        assert_eq!(cube.first_excluding_field(&dns), Some(HeaderField::IpProtocol));
    }

    #[test]
    fn test_volume() {
        let cube = Cube::all()
            .with_range(HeaderField::DstPort, 0, 9)
            .with_value(HeaderField::IpProtocol, 6);
        let unconstrained = Cube::all().volume();
        let expected = unconstrained / 65536.0 * 10.0 / 256.0;
        assert!((cube.volume() - expected).abs() / expected < 1e-9);
    }

    #[test]
    fn test_display() {
        let cube = Cube::all()
            .with_range(HeaderField::DstIp, 0x0280_0000, 0x0280_ffff)
            .with_value(HeaderField::IpProtocol, 17);
        assert_eq!(
            cube.to_string(),
            "dstIp=2.128.0.0-2.128.255.255 ipProtocol=17"
        );
    }
}
