//! ACL line reachability and flow classification
//!
//! Answers two questions about the packet filters of a network snapshot:
//!
//! - **Reachability**: which lines of a filter can never be the first line
//!   to match any packet, and which earlier lines shadow them.
//! - **Classification**: which line of each filter a concrete flow hits
//!   first, with the action it receives and a per-line trace.
//!
//! Lines are turned into symbolic header spaces
//! ([`sonic_headerspace::HeaderSpace`]), so both answers are exact over the
//! whole packet space rather than sampled.
//!
//! ```text
//! snapshot ─► Filter ─► resolve ─► HeaderSpace per line
//!                                   ├─► reachability::analyze
//!                                   └─► classifier::classify
//! BatchRunner fans (node, filter) units out and aggregates rows.
//! ```

pub mod action;
pub mod aggregator;
pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod filter;
pub mod line;
pub mod matcher;
pub mod objects;
pub mod reachability;
pub mod resolve;
pub mod runner;
pub mod snapshot;

pub use action::LineAction;
pub use aggregator::{render_message, select_filters, NamePattern};
pub use api::{
    AclSource, ClassifyRequest, ClassifyResponse, ClassifyRow, ErrorRow, ReachabilityRequest,
    ReachabilityResponse, ReachabilityRow, Reason,
};
pub use classifier::{classify, ClassificationResult, FlowSpec, Outcome, TraceEntry};
pub use config::{AclCheckConfig, FlowDefaults, DEFAULT_CONFIG_PATH};
pub use error::{AclCheckError, Result};
pub use filter::{Filter, FilterLine};
pub use line::{parse_line, MatchSpec};
pub use matcher::{explain, LineMatch};
pub use objects::{ObjectGroups, ReferenceError};
pub use reachability::{analyze, AnalysisLimits, LineFinding, LineReachability, ReachabilityResult};
pub use resolve::{resolve, Resolution, ResolvedFilter};
pub use runner::BatchRunner;
pub use snapshot::{Node, Snapshot};
