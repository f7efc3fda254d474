//! Line actions.

use crate::error::AclCheckError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a filter does with a matching packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LineAction {
    Accept,
    Reject,
}

impl LineAction {
    /// Keyword used in line text (`permit` / `deny`).
    pub const fn keyword(&self) -> &'static str {
        match self {
            LineAction::Accept => "permit",
            LineAction::Reject => "deny",
        }
    }

    /// Text shown for the implicit trailing line of a filter.
    pub const fn default_line_text(&self) -> &'static str {
        match self {
            LineAction::Accept => "default-permit",
            LineAction::Reject => "default-deny",
        }
    }
}

impl fmt::Display for LineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineAction::Accept => write!(f, "ACCEPT"),
            LineAction::Reject => write!(f, "REJECT"),
        }
    }
}

impl FromStr for LineAction {
    type Err = AclCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "permit" | "accept" => Ok(LineAction::Accept),
            "deny" | "reject" => Ok(LineAction::Reject),
            other => Err(AclCheckError::Config(format!("unknown action '{}'", other))),
        }
    }
}

impl TryFrom<String> for LineAction {
    type Error = AclCheckError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LineAction> for String {
    fn from(action: LineAction) -> Self {
        action.to_string()
    }
}
