//! Error types for aclcheck

use crate::objects::ReferenceError;
use sonic_headerspace::SpaceError;
use thiserror::Error;

/// ACL analysis errors
#[derive(Error, Debug)]
pub enum AclCheckError {
    /// A named node/filter does not exist, or the name patterns select nothing
    #[error("Undefined filter: node '{node}', filter '{filter}'")]
    UndefinedFilter { node: String, filter: String },

    /// A flow description is contradictory or unparseable
    #[error("Malformed flow: {field}: {reason}")]
    MalformedFlow { field: String, reason: String },

    /// A line refers to an object group that is undefined or circular
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(#[from] ReferenceError),

    /// A node or filter name pattern is not a valid regex
    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// Snapshot file is malformed or inconsistent
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// An ACL line does not follow the line grammar
    #[error("Cannot parse ACL line '{line}': {reason}")]
    LineSyntax { line: String, reason: String },

    /// A snapshot filter was kept out of analysis because a line failed to parse
    #[error("Filter '{filter}' on node '{node}' failed to load: {reason}")]
    FilterLoad {
        node: String,
        filter: String,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Header space grew past the configured bound
    #[error("Header space error: {0}")]
    Space(#[from] SpaceError),

    /// Analysis stopped because the batch deadline expired
    #[error("Analysis cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted
    #[error("Worker task failed: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AclCheckError {
    pub(crate) fn malformed_flow(field: &str, reason: impl Into<String>) -> Self {
        AclCheckError::MalformedFlow {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for aclcheck operations
pub type Result<T> = std::result::Result<T, AclCheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AclCheckError::UndefinedFilter {
            node: "as1border1".to_string(),
            filter: "101".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Undefined filter: node 'as1border1', filter '101'"
        );
    }

    #[test]
    fn test_error_malformed_flow() {
        let err = AclCheckError::malformed_flow("dstPort", "ports require TCP or UDP");
        assert_eq!(
            err.to_string(),
            "Malformed flow: dstPort: ports require TCP or UDP"
        );
    }

    #[test]
    fn test_error_from_reference() {
        let err: AclCheckError = ReferenceError::Undefined {
            name: "WEB".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Unresolved reference: undefined reference 'WEB'");
    }
}
