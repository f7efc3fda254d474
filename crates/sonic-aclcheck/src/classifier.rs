//! Flow classification: which line of a filter matches a flow first.

use crate::action::LineAction;
use crate::config::FlowDefaults;
use crate::error::{AclCheckError, Result};
use crate::filter::Filter;
use crate::matcher::{explain, LineMatch};
use crate::objects::ObjectGroups;
use crate::resolve::ResolvedFilter;
use serde::{Deserialize, Serialize};
use sonic_acl_types::{IpProtocol, TcpFlags};
use sonic_headerspace::{Flow, HeaderField};
use std::net::Ipv4Addr;
use tracing::debug;

/// A caller's description of a flow. Unset fields take configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSpec {
    #[serde(alias = "src")]
    pub src_ip: Option<String>,
    #[serde(alias = "dst")]
    pub dst_ip: Option<String>,
    #[serde(alias = "protocol")]
    pub ip_protocol: Option<String>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub tcp_flags: Option<String>,
    pub icmp_type: Option<u8>,
    pub icmp_code: Option<u8>,
    pub packet_length: Option<u16>,
    pub fragment_offset: Option<u16>,
}

impl FlowSpec {
    pub fn new(src_ip: &str, dst_ip: &str) -> Self {
        Self {
            src_ip: Some(src_ip.to_string()),
            dst_ip: Some(dst_ip.to_string()),
            ..Self::default()
        }
    }

    pub fn protocol(mut self, protocol: &str) -> Self {
        self.ip_protocol = Some(protocol.to_string());
        self
    }

    pub fn ports(mut self, src_port: Option<u16>, dst_port: Option<u16>) -> Self {
        self.src_port = src_port;
        self.dst_port = dst_port;
        self
    }

    pub fn tcp_flags(mut self, flags: &str) -> Self {
        self.tcp_flags = Some(flags.to_string());
        self
    }

    pub fn icmp(mut self, icmp_type: u8, icmp_code: u8) -> Self {
        self.icmp_type = Some(icmp_type);
        self.icmp_code = Some(icmp_code);
        self
    }

    /// Fills defaults and checks that the result is a well-formed packet.
    ///
    /// # Errors
    ///
    /// Returns [`AclCheckError::MalformedFlow`] naming the first offending
    /// field.
    pub fn to_flow(&self, defaults: &FlowDefaults) -> Result<Flow> {
        let src = parse_address(HeaderField::SrcIp, self.src_ip.as_deref())?;
        let dst = parse_address(HeaderField::DstIp, self.dst_ip.as_deref())?;
        let protocol = match &self.ip_protocol {
            Some(text) => text
                .parse::<IpProtocol>()
                .map_err(|e| malformed(HeaderField::IpProtocol, e.to_string()))?,
            None => defaults.protocol,
        };
        let mut flow = Flow::new(src, dst, protocol);

        if protocol.has_ports() {
            flow = flow.with_ports(
                self.src_port.unwrap_or(defaults.src_port),
                self.dst_port.unwrap_or(defaults.dst_port),
            );
        } else if self.src_port.is_some() {
            return Err(malformed(HeaderField::SrcPort, ports_reason(protocol)));
        } else if self.dst_port.is_some() {
            return Err(malformed(HeaderField::DstPort, ports_reason(protocol)));
        }

        if let Some(text) = &self.tcp_flags {
            if !protocol.is_tcp() {
                return Err(malformed(
                    HeaderField::TcpFlags,
                    format!("TCP flags given for protocol {}", protocol),
                ));
            }
            let flags: TcpFlags = text
                .parse()
                .map_err(|e: sonic_acl_types::ParseError| {
                    malformed(HeaderField::TcpFlags, e.to_string())
                })?;
            flow = flow.with_tcp_flags(flags);
        }

        if protocol.is_icmp() {
            flow = flow.with_icmp(
                self.icmp_type.unwrap_or(defaults.icmp_type),
                self.icmp_code.unwrap_or(defaults.icmp_code),
            );
        } else if self.icmp_type.is_some() || self.icmp_code.is_some() {
            let field = if self.icmp_type.is_some() {
                HeaderField::IcmpType
            } else {
                HeaderField::IcmpCode
            };
            return Err(malformed(
                field,
                format!("ICMP type/code given for protocol {}", protocol),
            ));
        }

        let fragment_offset = self.fragment_offset.unwrap_or(0);
        if u32::from(fragment_offset) > HeaderField::FragmentOffset.domain_max() {
            return Err(malformed(
                HeaderField::FragmentOffset,
                format!(
                    "{} exceeds {}",
                    fragment_offset,
                    HeaderField::FragmentOffset.domain_max()
                ),
            ));
        }

        Ok(flow
            .with_packet_length(self.packet_length.unwrap_or(defaults.packet_length))
            .with_fragment_offset(fragment_offset))
    }
}

fn malformed(field: HeaderField, reason: impl Into<String>) -> AclCheckError {
    AclCheckError::malformed_flow(&field.to_string(), reason)
}

fn ports_reason(protocol: IpProtocol) -> String {
    format!("ports given for protocol {} (only TCP and UDP carry ports)", protocol)
}

fn parse_address(field: HeaderField, text: Option<&str>) -> Result<Ipv4Addr> {
    let text = text.ok_or_else(|| malformed(field, "missing"))?;
    text.trim()
        .parse()
        .map_err(|_| malformed(field, format!("invalid IPv4 address '{}'", text)))
}

/// Where the first-match scan stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Outcome {
    Matched { index: usize, action: LineAction },
    /// No explicit line matched; `index` is the synthetic trailing line.
    DefaultAction { index: usize, action: LineAction },
    /// The scan reached a line whose references cannot be resolved.
    Indeterminate { index: usize, reason: String },
}

impl Outcome {
    pub fn index(&self) -> usize {
        match self {
            Outcome::Matched { index, .. }
            | Outcome::DefaultAction { index, .. }
            | Outcome::Indeterminate { index, .. } => *index,
        }
    }

    pub fn action(&self) -> Option<LineAction> {
        match self {
            Outcome::Matched { action, .. } | Outcome::DefaultAction { action, .. } => {
                Some(*action)
            }
            Outcome::Indeterminate { .. } => None,
        }
    }
}

/// One examined line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub index: usize,
    pub line: String,
    #[serde(flatten)]
    pub result: LineMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub node: String,
    pub filter: String,
    pub flow: Flow,
    pub outcome: Outcome,
    pub line_content: String,
    pub trace: Vec<TraceEntry>,
}

/// First-match classification of `flow` against `filter`.
pub fn classify(flow: &Flow, filter: &Filter, objects: &ObjectGroups) -> ClassificationResult {
    classify_resolved(flow, &ResolvedFilter::new(filter, objects))
}

/// Same as [`classify`], reusing already resolved lines.
pub fn classify_resolved(flow: &Flow, resolved: &ResolvedFilter<'_>) -> ClassificationResult {
    let filter = resolved.filter();
    let mut trace = Vec::new();
    let mut outcome = None;

    for (line, resolution) in resolved.lines() {
        let result = explain(flow, resolution);
        trace.push(TraceEntry {
            index: line.index(),
            line: line.text().to_string(),
            result: result.clone(),
        });
        match result {
            LineMatch::Match => {
                outcome = Some(Outcome::Matched {
                    index: line.index(),
                    action: line.action(),
                });
                break;
            }
            LineMatch::Indeterminate { reason } => {
                outcome = Some(Outcome::Indeterminate {
                    index: line.index(),
                    reason,
                });
                break;
            }
            LineMatch::NoMatch { .. } => {}
        }
    }

    let outcome = outcome.unwrap_or(Outcome::DefaultAction {
        index: filter.default_index(),
        action: filter.default_action(),
    });
    debug!(
        node = %filter.node(),
        filter = %filter.name(),
        flow = %flow,
        index = outcome.index(),
        "classified flow"
    );

    ClassificationResult {
        node: filter.node().to_string(),
        filter: filter.name().to_string(),
        flow: *flow,
        line_content: filter.line_text(outcome.index()).to_string(),
        outcome,
        trace,
    }
}
