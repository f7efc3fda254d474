//! Snapshot loading: nodes, their object groups and their filters.
//!
//! ```yaml
//! nodes:
//!   - name: as1border1
//!     address_groups: { INSIDE: ["10.0.0.0/8", "group:DMZ"] }
//!     port_groups: { WEB: ["80", "443", "8000-8080"] }
//!     filters:
//!       - name: "101"
//!         default_action: deny
//!         lines: ["permit ip 2.128.0.0/16 any", "deny ip any any"]
//! ```

use crate::action::LineAction;
use crate::error::{AclCheckError, Result};
use crate::filter::Filter;
use crate::objects::{AddressMember, ObjectGroups, PortMember};
use crate::resolve::ResolvedFilter;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default)]
    pub address_groups: BTreeMap<String, Vec<AddressMember>>,
    #[serde(default)]
    pub port_groups: BTreeMap<String, Vec<PortMember>>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_action: Option<LineAction>,
    #[serde(default)]
    pub lines: Vec<String>,
}

/// One device: its object groups and filters, keyed by name.
///
/// Filters with a line that does not parse are kept apart in `broken`, with
/// the parse error, so that they surface as per-filter failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: String,
    objects: ObjectGroups,
    filters: BTreeMap<String, Filter>,
    broken: BTreeMap<String, String>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn objects(&self) -> &ObjectGroups {
        &self.objects
    }

    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }

    /// Names of every filter on the node, loaded or not, in name order.
    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters
            .keys()
            .merge(self.broken.keys())
            .map(String::as_str)
    }

    /// Why the named filter failed to load, if it did.
    pub fn load_error(&self, name: &str) -> Option<&str> {
        self.broken.get(name).map(String::as_str)
    }

    /// Looks up a loaded filter, reporting a load failure as an error.
    fn loaded_filter(&self, name: &str) -> Result<Option<&Filter>> {
        if let Some(reason) = self.load_error(name) {
            return Err(AclCheckError::FilterLoad {
                node: self.name.clone(),
                filter: name.to_string(),
                reason: reason.to_string(),
            });
        }
        Ok(self.filters.get(name))
    }
}

/// All nodes of a network, parsed and validated. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    nodes: BTreeMap<String, Node>,
}

impl Snapshot {
    /// Loads a snapshot file; `.json` is read as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>, default_action: LineAction) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let file: SnapshotFile = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                AclCheckError::Snapshot(format!("{}: {}", path.display(), e))
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                AclCheckError::Snapshot(format!("{}: {}", path.display(), e))
            })?
        };

        let snapshot = Self::from_file(file, default_action)?;
        info!(
            path = %path.display(),
            nodes = snapshot.nodes.len(),
            filters = snapshot.filter_count(),
            broken = snapshot.broken_count(),
            "aclcheck: loaded snapshot"
        );
        Ok(snapshot)
    }

    /// Parses a YAML snapshot.
    pub fn from_yaml(content: &str, default_action: LineAction) -> Result<Self> {
        let file: SnapshotFile = serde_yaml::from_str(content)
            .map_err(|e| AclCheckError::Snapshot(e.to_string()))?;
        Self::from_file(file, default_action)
    }

    /// Parses every filter line. `default_action` applies to filters that do
    /// not set their own.
    pub fn from_file(file: SnapshotFile, default_action: LineAction) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        for node in file.nodes {
            if nodes.contains_key(&node.name) {
                return Err(AclCheckError::Snapshot(format!(
                    "duplicate node '{}'",
                    node.name
                )));
            }

            let mut filters = BTreeMap::new();
            let mut broken = BTreeMap::new();
            for filter in node.filters {
                if filters.contains_key(&filter.name) || broken.contains_key(&filter.name) {
                    return Err(AclCheckError::Snapshot(format!(
                        "duplicate filter '{}' on node '{}'",
                        filter.name, node.name
                    )));
                }
                match Filter::parse(
                    &node.name,
                    &filter.name,
                    &filter.lines,
                    filter.default_action.unwrap_or(default_action),
                ) {
                    Ok(parsed) => {
                        filters.insert(filter.name, parsed);
                    }
                    Err(e) => {
                        warn!(
                            node = %node.name,
                            filter = %filter.name,
                            error = %e,
                            "aclcheck: filter failed to load"
                        );
                        broken.insert(filter.name, e.to_string());
                    }
                }
            }

            let objects = ObjectGroups {
                address_groups: node.address_groups,
                port_groups: node.port_groups,
            };
            nodes.insert(
                node.name.clone(),
                Node {
                    name: node.name,
                    objects,
                    filters,
                    broken,
                },
            );
        }
        Ok(Self { nodes })
    }

    /// Nodes in name order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Looks up a filter by node and filter name.
    ///
    /// # Errors
    ///
    /// [`AclCheckError::FilterLoad`] if the filter exists but failed to
    /// parse, [`AclCheckError::UndefinedFilter`] if it does not exist.
    pub fn filter(&self, node: &str, filter: &str) -> Result<&Filter> {
        self.lookup(node, filter).map(|(_, f)| f)
    }

    /// Looks up a filter and resolves its lines against its node's groups.
    pub fn resolve_filter(&self, node: &str, filter: &str) -> Result<ResolvedFilter<'_>> {
        let (n, f) = self.lookup(node, filter)?;
        Ok(ResolvedFilter::new(f, &n.objects))
    }

    fn lookup(&self, node: &str, filter: &str) -> Result<(&Node, &Filter)> {
        let found = match self.node(node) {
            Some(n) => n.loaded_filter(filter)?.map(|f| (n, f)),
            None => None,
        };
        found.ok_or_else(|| AclCheckError::UndefinedFilter {
            node: node.to_string(),
            filter: filter.to_string(),
        })
    }

    /// Number of filters that loaded.
    pub fn filter_count(&self) -> usize {
        self.nodes.values().map(|n| n.filters.len()).sum()
    }

    /// Number of filters kept out because a line failed to parse.
    pub fn broken_count(&self) -> usize {
        self.nodes.values().map(|n| n.broken.len()).sum()
    }
}
