//! Named object groups and reference resolution.
//!
//! A node may define address groups and port groups. Members are literals
//! (`10.0.0.0/8`, `host 1.2.3.4`, `80`, `8000-8080`) or references to another
//! group of the same kind (`group:NAME`). Groups are expanded on demand;
//! references that name nothing, or that loop back on themselves, are
//! reported instead of expanded.

use crate::error::AclCheckError;
use crate::line::{parse_address_text, AddressMatch};
use serde::{Deserialize, Serialize};
use sonic_acl_types::{PortRange, MAX_PORT};
use sonic_headerspace::{HeaderField, IntervalSet};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const GROUP_PREFIX: &str = "group:";

/// Why a reference could not be expanded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ReferenceError {
    #[error("undefined reference '{name}'")]
    Undefined { name: String },

    /// `path` starts and ends with the same group.
    #[error("circular reference {}", .path.join(" -> "))]
    Circular { path: Vec<String> },
}

impl ReferenceError {
    /// The offending name, or the cycle as `a -> b -> a`.
    pub fn reference(&self) -> String {
        match self {
            ReferenceError::Undefined { name } => name.clone(),
            ReferenceError::Circular { path } => path.join(" -> "),
        }
    }
}

/// One member of an address group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressMember {
    text: String,
    address: AddressMatch,
}

impl FromStr for AddressMember {
    type Err = AclCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_string();
        let address = match text.strip_prefix(GROUP_PREFIX) {
            Some(name) if !name.is_empty() => AddressMatch::Group(name.to_string()),
            _ => parse_address_text(&text)?,
        };
        Ok(Self { text, address })
    }
}

impl TryFrom<String> for AddressMember {
    type Error = AclCheckError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AddressMember> for String {
    fn from(member: AddressMember) -> Self {
        member.text
    }
}

/// One member of a port group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortMember {
    Range(PortRange),
    Group(String),
}

impl FromStr for PortMember {
    type Err = AclCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.strip_prefix(GROUP_PREFIX) {
            Some(name) if !name.is_empty() => Ok(PortMember::Group(name.to_string())),
            _ => trimmed
                .parse::<PortRange>()
                .map(PortMember::Range)
                .map_err(|e| AclCheckError::Snapshot(format!("port group member: {}", e))),
        }
    }
}

impl fmt::Display for PortMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortMember::Range(range) => write!(f, "{}", range),
            PortMember::Group(name) => write!(f, "{}{}", GROUP_PREFIX, name),
        }
    }
}

impl TryFrom<String> for PortMember {
    type Error = AclCheckError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortMember> for String {
    fn from(member: PortMember) -> Self {
        member.to_string()
    }
}

trait GroupMember {
    fn reference(&self) -> Option<&str>;
    fn literal(&self) -> IntervalSet;
}

impl GroupMember for AddressMember {
    fn reference(&self) -> Option<&str> {
        match &self.address {
            AddressMatch::Group(name) => Some(name),
            _ => None,
        }
    }

    fn literal(&self) -> IntervalSet {
        self.address
            .literal_set()
            .unwrap_or_else(|| IntervalSet::empty(HeaderField::SrcIp.domain_max()))
    }
}

impl GroupMember for PortMember {
    fn reference(&self) -> Option<&str> {
        match self {
            PortMember::Group(name) => Some(name),
            PortMember::Range(_) => None,
        }
    }

    fn literal(&self) -> IntervalSet {
        match self {
            PortMember::Range(range) => IntervalSet::range(
                u32::from(MAX_PORT),
                u32::from(range.min),
                u32::from(range.max),
            ),
            PortMember::Group(_) => IntervalSet::empty(u32::from(MAX_PORT)),
        }
    }
}

/// Named groups defined on one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectGroups {
    #[serde(default)]
    pub address_groups: BTreeMap<String, Vec<AddressMember>>,
    #[serde(default)]
    pub port_groups: BTreeMap<String, Vec<PortMember>>,
}

impl ObjectGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an address group. Members use the snapshot syntax.
    pub fn with_address_group(mut self, name: &str, members: &[&str]) -> Result<Self, AclCheckError> {
        let members = members
            .iter()
            .map(|m| m.parse())
            .collect::<Result<Vec<AddressMember>, _>>()?;
        self.address_groups.insert(name.to_string(), members);
        Ok(self)
    }

    /// Adds or replaces a port group. Members use the snapshot syntax.
    pub fn with_port_group(mut self, name: &str, members: &[&str]) -> Result<Self, AclCheckError> {
        let members = members
            .iter()
            .map(|m| m.parse())
            .collect::<Result<Vec<PortMember>, _>>()?;
        self.port_groups.insert(name.to_string(), members);
        Ok(self)
    }

    /// Every address matched by the named address group.
    pub fn address_set(&self, name: &str) -> Result<IntervalSet, ReferenceError> {
        expand(
            &self.address_groups,
            HeaderField::SrcIp.domain_max(),
            name,
            &mut Vec::new(),
        )
    }

    /// Every port matched by the named port group.
    pub fn port_set(&self, name: &str) -> Result<IntervalSet, ReferenceError> {
        expand(
            &self.port_groups,
            u32::from(MAX_PORT),
            name,
            &mut Vec::new(),
        )
    }
}

/// Depth-first expansion; `path` holds the groups currently being expanded.
fn expand<M: GroupMember>(
    groups: &BTreeMap<String, Vec<M>>,
    max: u32,
    name: &str,
    path: &mut Vec<String>,
) -> Result<IntervalSet, ReferenceError> {
    if let Some(start) = path.iter().position(|seen| seen == name) {
        let mut cycle = path[start..].to_vec();
        cycle.push(name.to_string());
        return Err(ReferenceError::Circular { path: cycle });
    }
    let members = groups.get(name).ok_or_else(|| ReferenceError::Undefined {
        name: name.to_string(),
    })?;

    path.push(name.to_string());
    let mut set = IntervalSet::empty(max);
    for member in members {
        let part = match member.reference() {
            Some(inner) => expand(groups, max, inner, path)?,
            None => member.literal(),
        };
        set = set.union(&part);
    }
    path.pop();
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    fn addr(a: u8, b: u8, c: u8, d: u8) -> u32 {
        u32::from(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_address_group_expansion() {
        let groups = ObjectGroups::new()
            .with_address_group("INSIDE", &["10.0.0.0/8", "group:DMZ"])
            .unwrap()
            .with_address_group("DMZ", &["host 192.168.1.1", "172.16.0.0 0.0.255.255"])
            .unwrap();

        let set = groups.address_set("INSIDE").unwrap();
        assert!(set.contains(addr(10, 1, 2, 3)));
        assert!(set.contains(addr(192, 168, 1, 1)));
        assert!(set.contains(addr(172, 16, 9, 9)));
        assert!(!set.contains(addr(192, 168, 1, 2)));
    }

    #[test]
    fn test_port_group_expansion() {
        let groups = ObjectGroups::new()
            .with_port_group("WEB", &["80", "https", "8000-8080"])
            .unwrap();
        let set = groups.port_set("WEB").unwrap();
        assert_eq!(set.len(), 2 + 81);
        assert!(set.contains(443));
    }

    #[test]
    fn test_undefined_reference() {
        let groups = ObjectGroups::new()
            .with_address_group("A", &["group:MISSING"])
            .unwrap();
        assert_eq!(
            groups.address_set("A").unwrap_err(),
            ReferenceError::Undefined {
                name: "MISSING".to_string()
            }
        );
        assert_eq!(
            groups.port_set("A").unwrap_err(),
            ReferenceError::Undefined {
                name: "A".to_string()
            }
        );
    }

    #[test]
    fn test_circular_reference() {
        let groups = ObjectGroups::new()
            .with_port_group("A", &["22", "group:B"])
            .unwrap()
            .with_port_group("B", &["group:A"])
            .unwrap();
        let err = groups.port_set("A").unwrap_err();
        assert_eq!(
            err,
            ReferenceError::Circular {
                path: vec!["A".to_string(), "B".to_string(), "A".to_string()]
            }
        );
        assert_eq!(err.reference(), "A -> B -> A");
        assert_eq!(err.to_string(), "circular reference A -> B -> A");
    }

    #[test]
    fn test_shared_subgroup_is_not_a_cycle() {
        let groups = ObjectGroups::new()
            .with_port_group("TOP", &["group:X", "group:Y"])
            .unwrap()
            .with_port_group("X", &["group:Z"])
            .unwrap()
            .with_port_group("Y", &["group:Z"])
            .unwrap()
            .with_port_group("Z", &["53"])
            .unwrap();
        assert_eq!(groups.port_set("TOP").unwrap().ranges(), &[(53, 53)]);
    }

    #[test]
    fn test_empty_group() {
        let groups = ObjectGroups::new().with_address_group("NONE", &[]).unwrap();
        assert!(groups.address_set("NONE").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_members() {
        assert!("10.0.0.0/33".parse::<AddressMember>().is_err());
        assert!("eighty".parse::<PortMember>().is_err());
        assert!("group:".parse::<PortMember>().is_err());
    }

    #[test]
    fn test_members_deserialize_from_yaml() {
        let yaml = r#"
address_groups:
  INSIDE: ["10.0.0.0/8", "group:DMZ"]
port_groups:
  WEB: ["80", "8000-8080"]
"#;
        let groups: ObjectGroups = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(groups.address_groups["INSIDE"].len(), 2);
        assert_eq!(
            groups.port_groups["WEB"][1],
            PortMember::Range(PortRange::new(8000, 8080).unwrap())
        );
        assert_eq!(String::from(groups.port_groups["WEB"][0].clone()), "80");
    }
}
