//! Concrete flow versus line matching.

use crate::resolve::Resolution;
use serde::{Deserialize, Serialize};
use sonic_headerspace::{Flow, HeaderField, HeaderSpace};

/// How one line treats one flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "result")]
pub enum LineMatch {
    Match,
    /// `field` is the first field that rules the flow out.
    NoMatch { field: HeaderField },
    Indeterminate { reason: String },
}

impl LineMatch {
    pub fn is_match(&self) -> bool {
        matches!(self, LineMatch::Match)
    }
}

pub fn matches(flow: &Flow, space: &HeaderSpace) -> bool {
    space.matches(flow)
}

/// Explains the outcome of matching `flow` against one resolved line.
pub fn explain(flow: &Flow, resolution: &Resolution) -> LineMatch {
    let space = match resolution {
        Resolution::Resolved(space) => space,
        unresolved => {
            let reason = unresolved
                .problem()
                .map(|p| p.to_string())
                .unwrap_or_default();
            return LineMatch::Indeterminate { reason };
        }
    };

    // Report the field of the cube that got furthest before failing.
    let mut blocker: Option<HeaderField> = None;
    for cube in space.cubes() {
        match cube.first_excluding_field(flow) {
            None => return LineMatch::Match,
            Some(field) => {
                if blocker.map_or(true, |b| field > b) {
                    blocker = Some(field);
                }
            }
        }
    }
    LineMatch::NoMatch {
        // An empty space excludes the flow at its first field.
        field: blocker.unwrap_or(HeaderField::SrcIp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::parse_line;
    use crate::objects::ObjectGroups;
    use crate::resolve::resolve;
    use pretty_assertions::assert_eq;
    use sonic_acl_types::IpProtocol;
    use std::net::Ipv4Addr;

    fn resolution(text: &str) -> Resolution {
        let objects = ObjectGroups::new()
            .with_port_group("LOOP", &["group:LOOP"])
            .unwrap();
        resolve(&parse_line(text).unwrap().1, &objects)
    }

    fn dns() -> Flow {
        Flow::new(
            Ipv4Addr::new(1, 0, 1, 2),
            Ipv4Addr::new(2, 128, 0, 101),
            IpProtocol::UDP,
        )
        .with_ports(49152, 53)
    }

    #[test]
    fn test_explain_match() {
        assert_eq!(explain(&dns(), &resolution("permit udp any any eq 53")), LineMatch::Match);
        assert!(matches(&dns(), resolution("permit ip any any").space().unwrap()));
    }

    #[test]
    fn test_explain_first_excluding_field() {
        assert_eq!(
            explain(&dns(), &resolution("deny tcp any any eq 80")),
            LineMatch::NoMatch {
                field: HeaderField::IpProtocol
            }
        );
        assert_eq!(
            explain(&dns(), &resolution("permit udp any any eq 123")),
            LineMatch::NoMatch {
                field: HeaderField::DstPort
            }
        );
        assert_eq!(
            explain(&dns(), &resolution("permit ip 10.0.0.0/8 any")),
            LineMatch::NoMatch {
                field: HeaderField::SrcIp
            }
        );
    }

    #[test]
    fn test_explain_indeterminate() {
        let result = explain(&dns(), &resolution("permit udp any any portgroup LOOP"));
        assert_eq!(
            result,
            LineMatch::Indeterminate {
                reason: "circular reference LOOP -> LOOP".to_string()
            }
        );
        assert!(!result.is_match());
    }
}
