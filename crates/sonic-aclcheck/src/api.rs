//! Request and response types of the two questions the engine answers.
//!
//! Everything here serialises with camelCase keys.

use crate::action::LineAction;
use crate::classifier::{ClassificationResult, FlowSpec, Outcome, TraceEntry};
use serde::{Deserialize, Serialize};
use sonic_headerspace::Flow;
use std::fmt;

/// Which lines of which filters match the given flows first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<FlowSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_regex: Option<String>,
}

impl ClassifyRequest {
    pub fn new(flow: FlowSpec) -> Self {
        Self {
            flow: Some(flow),
            ..Self::default()
        }
    }

    pub fn nodes(mut self, pattern: &str) -> Self {
        self.node_regex = Some(pattern.to_string());
        self
    }

    pub fn filters(mut self, pattern: &str) -> Self {
        self.filter_regex = Some(pattern.to_string());
        self
    }

    /// `flow` followed by `flows`.
    pub fn all_flows(&self) -> impl Iterator<Item = &FlowSpec> {
        self.flow.iter().chain(self.flows.iter())
    }
}

/// Which lines of the selected filters are unreachable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReachabilityRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl_regex: Option<String>,
}

/// A (node, filter) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AclSource {
    pub node: String,
    pub filter: String,
}

impl AclSource {
    pub fn new(node: &str, filter: &str) -> Self {
        Self {
            node: node.to_string(),
            filter: filter.to_string(),
        }
    }
}

impl fmt::Display for AclSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.node, self.filter)
    }
}

/// A (node, filter) pair whose analysis failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRow {
    pub node: String,
    pub filter: String,
    pub error: String,
}

/// One flow classified against one filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRow {
    pub node: String,
    pub filter_name: String,
    pub flow: Flow,
    /// `None` when the scan stopped at an unresolvable line.
    pub action: Option<LineAction>,
    pub line_number: usize,
    pub line_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indeterminate_reason: Option<String>,
    pub trace: Vec<TraceEntry>,
}

impl From<ClassificationResult> for ClassifyRow {
    fn from(result: ClassificationResult) -> Self {
        let indeterminate_reason = match &result.outcome {
            Outcome::Indeterminate { reason, .. } => Some(reason.clone()),
            _ => None,
        };
        Self {
            node: result.node,
            filter_name: result.filter,
            flow: result.flow,
            action: result.outcome.action(),
            line_number: result.outcome.index(),
            line_content: result.line_content,
            indeterminate_reason,
            trace: result.trace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    BlockingLines,
    IndependentlyUnmatchable,
    UndefinedReference,
    CircularReference,
}

/// One non-reachable line, shared by every filter with identical lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReachabilityRow {
    /// Sorted.
    pub acl_sources: Vec<AclSource>,
    pub lines: Vec<String>,
    pub blocked_line_num: usize,
    pub blocking_line_nums: Vec<usize>,
    pub different_action: bool,
    pub reason: Reason,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyResponse {
    pub rows: Vec<ClassifyRow>,
    pub errors: Vec<ErrorRow>,
    /// The deadline expired before every pair was classified.
    pub incomplete: bool,
    pub pending: Vec<AclSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReachabilityResponse {
    pub rows: Vec<ReachabilityRow>,
    pub errors: Vec<ErrorRow>,
    /// The deadline expired before every pair was analyzed.
    pub incomplete: bool,
    pub pending: Vec<AclSource>,
}
