//! Filters (ordered ACL lines) and their lines.

use crate::action::LineAction;
use crate::error::Result;
use crate::line::{parse_line, MatchSpec};
use std::fmt;

/// One parsed ACL line. Immutable after loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterLine {
    index: usize,
    action: LineAction,
    spec: MatchSpec,
    text: String,
}

impl FilterLine {
    /// Parses `text` as the line at `index`.
    pub fn parse(index: usize, text: &str) -> Result<Self> {
        let (action, spec) = parse_line(text)?;
        Ok(Self {
            index,
            action,
            spec,
            text: text.trim().to_string(),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn action(&self) -> LineAction {
        self.action
    }

    pub fn spec(&self) -> &MatchSpec {
        &self.spec
    }

    /// The line as written.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for FilterLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[index {}] {}", self.index, self.text)
    }
}

/// An ordered list of lines on one node, with an implicit trailing default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    node: String,
    name: String,
    lines: Vec<FilterLine>,
    default_action: LineAction,
}

impl Filter {
    pub fn new(
        node: impl Into<String>,
        name: impl Into<String>,
        lines: Vec<FilterLine>,
        default_action: LineAction,
    ) -> Self {
        Self {
            node: node.into(),
            name: name.into(),
            lines,
            default_action,
        }
    }

    /// Parses every line of a filter. Line indices follow the input order.
    pub fn parse<S: AsRef<str>>(
        node: &str,
        name: &str,
        lines: &[S],
        default_action: LineAction,
    ) -> Result<Self> {
        let lines = lines
            .iter()
            .enumerate()
            .map(|(index, text)| FilterLine::parse(index, text.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(node, name, lines, default_action))
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> &[FilterLine] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&FilterLine> {
        self.lines.get(index)
    }

    pub fn default_action(&self) -> LineAction {
        self.default_action
    }

    /// Index of the synthetic default line.
    pub fn default_index(&self) -> usize {
        self.lines.len()
    }

    /// Text of the line at `index`, including the default line.
    pub fn line_text(&self, index: usize) -> &str {
        match self.lines.get(index) {
            Some(line) => line.text(),
            None => self.default_action.default_line_text(),
        }
    }

    /// Texts of all explicit lines.
    pub fn texts(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.text.clone()).collect()
    }
}
