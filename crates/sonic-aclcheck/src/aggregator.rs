//! Selecting filters by name and shaping results into response rows.

use crate::api::{AclSource, ClassifyRow, Reason, ReachabilityRow};
use crate::classifier::ClassificationResult;
use crate::error::{AclCheckError, Result};
use crate::objects::ReferenceError;
use crate::reachability::{LineReachability, ReachabilityResult};
use crate::snapshot::Snapshot;
use itertools::Itertools;
use regex::{Regex, RegexBuilder};

/// A full-match, case-insensitive name pattern. No pattern matches all.
#[derive(Debug, Clone)]
pub struct NamePattern {
    pattern: Option<String>,
    regex: Option<Regex>,
}

impl NamePattern {
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        let Some(pattern) = pattern else {
            return Ok(Self::any());
        };
        let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
            .case_insensitive(true)
            .build()
            .map_err(|e| AclCheckError::InvalidRegex {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            pattern: Some(pattern.to_string()),
            regex: Some(regex),
        })
    }

    pub fn any() -> Self {
        Self {
            pattern: None,
            regex: None,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.as_ref().map_or(true, |r| r.is_match(name))
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_deref().unwrap_or(".*")
    }
}

/// Filters on nodes matching `nodes` whose names match `filters`, sorted by
/// node then filter. Filters that failed to load are selected too.
///
/// # Errors
///
/// Returns [`AclCheckError::UndefinedFilter`] if nothing is selected.
pub fn select_filters(
    snapshot: &Snapshot,
    nodes: &NamePattern,
    filters: &NamePattern,
) -> Result<Vec<AclSource>> {
    let selected: Vec<AclSource> = snapshot
        .nodes()
        .filter(|node| nodes.matches(node.name()))
        .flat_map(|node| {
            node.filter_names()
                .filter(move |name| filters.matches(name))
                .map(move |name| AclSource::new(node.name(), name))
        })
        .collect();
    if selected.is_empty() {
        return Err(AclCheckError::UndefinedFilter {
            node: nodes.as_str().to_string(),
            filter: filters.as_str().to_string(),
        });
    }
    Ok(selected)
}

/// Rows sorted by node then filter; flows keep request order.
pub fn classify_rows(results: Vec<ClassificationResult>) -> Vec<ClassifyRow> {
    let mut rows: Vec<ClassifyRow> = results.into_iter().map(ClassifyRow::from).collect();
    rows.sort_by(|a, b| (&a.node, &a.filter_name).cmp(&(&b.node, &b.filter_name)));
    rows
}

struct Group<'a> {
    lines: &'a [String],
    index: usize,
    outcome: &'a LineReachability,
    sources: Vec<AclSource>,
}

/// One row per distinct (line texts, line, outcome), listing every filter
/// that shares it.
pub fn reachability_rows(results: &[ReachabilityResult]) -> Vec<ReachabilityRow> {
    let mut sorted: Vec<&ReachabilityResult> = results.iter().collect();
    sorted.sort_by(|a, b| (&a.node, &a.filter).cmp(&(&b.node, &b.filter)));

    let mut groups: Vec<Group<'_>> = Vec::new();
    for result in sorted {
        let source = AclSource::new(&result.node, &result.filter);
        for finding in &result.findings {
            let existing = groups.iter_mut().find(|g| {
                g.index == finding.index
                    && g.outcome == &finding.outcome
                    && g.lines == result.lines.as_slice()
            });
            match existing {
                Some(group) => group.sources.push(source.clone()),
                None => groups.push(Group {
                    lines: &result.lines,
                    index: finding.index,
                    outcome: &finding.outcome,
                    sources: vec![source.clone()],
                }),
            }
        }
    }

    groups.into_iter().filter_map(build_row).collect()
}

fn build_row(mut group: Group<'_>) -> Option<ReachabilityRow> {
    group.sources.sort();
    let (blocking, different_action, reason) = match group.outcome {
        LineReachability::Reachable => return None,
        LineReachability::Unreachable {
            blocking,
            different_action,
        } => (blocking.clone(), *different_action, Reason::BlockingLines),
        LineReachability::Unmatchable => (Vec::new(), false, Reason::IndependentlyUnmatchable),
        LineReachability::Indeterminate {
            reason: ReferenceError::Undefined { .. },
        } => (Vec::new(), false, Reason::UndefinedReference),
        LineReachability::Indeterminate {
            reason: ReferenceError::Circular { .. },
        } => (Vec::new(), false, Reason::CircularReference),
    };
    let message = render_message(&group.sources, group.lines, group.index, group.outcome);
    Some(ReachabilityRow {
        acl_sources: group.sources,
        lines: group.lines.to_vec(),
        blocked_line_num: group.index,
        blocking_line_nums: blocking,
        different_action,
        reason,
        message,
    })
}

/// Human-readable explanation of one finding. Lines are joined with `\n`
/// without a trailing newline.
pub fn render_message(
    sources: &[AclSource],
    lines: &[String],
    index: usize,
    outcome: &LineReachability,
) -> String {
    let text = |i: usize| lines.get(i).map(String::as_str).unwrap_or_default();
    let header = format!("ACLs {{ {} }}", sources.iter().join(", "));
    let line = format!("  [index {}] {}", index, text(index));

    match outcome {
        LineReachability::Reachable => format!("{} contain a reachable line:\n{}", header, line),
        LineReachability::Unreachable { blocking, .. } => {
            let mut out = vec![
                format!("{} contain an unreachable line:", header),
                line,
                "Blocking line(s):".to_string(),
            ];
            out.extend(
                blocking
                    .iter()
                    .map(|&b| format!("  [index {}] {}", b, text(b))),
            );
            out.join("\n")
        }
        LineReachability::Unmatchable => {
            format!("{} contain an unmatchable line:\n{}", header, line)
        }
        LineReachability::Indeterminate { reason } => {
            let kind = match reason {
                ReferenceError::Undefined { .. } => "an undefined reference",
                ReferenceError::Circular { .. } => "a circular reference",
            };
            format!(
                "{} contain a line with {}:\n{}\nReference: {}",
                header,
                kind,
                line,
                reason.reference()
            )
        }
    }
}
