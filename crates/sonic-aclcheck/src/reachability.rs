//! Line reachability: which lines can never be the first match.
//!
//! Lines are processed in order while the union of all earlier line spaces
//! (`covered`) is maintained. A line whose space minus `covered` is empty is
//! unreachable. For each unreachable line a small set of earlier lines that
//! together cover it is reported as the blocking lines.

use crate::config::AclCheckConfig;
use crate::error::{AclCheckError, Result};
use crate::filter::Filter;
use crate::objects::{ObjectGroups, ReferenceError};
use crate::resolve::ResolvedFilter;
use serde::{Deserialize, Serialize};
use sonic_headerspace::HeaderSpace;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Resource bounds for one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    /// Largest header space (in cubes) a single subtraction may produce.
    pub max_cubes: usize,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self { max_cubes: 100_000 }
    }
}

impl From<&AclCheckConfig> for AnalysisLimits {
    fn from(config: &AclCheckConfig) -> Self {
        Self {
            max_cubes: config.engine.max_cubes,
        }
    }
}

/// Reachability of one line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum LineReachability {
    Reachable,
    /// Every packet the line matches is matched by an earlier line.
    #[serde(rename_all = "camelCase")]
    Unreachable {
        /// Ascending line indices.
        blocking: Vec<usize>,
        different_action: bool,
    },
    /// The line matches no packet at all.
    Unmatchable,
    /// The line refers to groups that cannot be expanded.
    Indeterminate { reason: ReferenceError },
}

/// A line that is not plainly reachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineFinding {
    pub index: usize,
    pub outcome: LineReachability,
}

/// Analysis result for one filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachabilityResult {
    pub node: String,
    pub filter: String,
    /// Texts of all explicit lines.
    pub lines: Vec<String>,
    /// Non-reachable lines, ascending by index.
    pub findings: Vec<LineFinding>,
}

impl ReachabilityResult {
    /// Reachability of the line at `index`.
    pub fn line(&self, index: usize) -> LineReachability {
        self.findings
            .iter()
            .find(|f| f.index == index)
            .map(|f| f.outcome.clone())
            .unwrap_or(LineReachability::Reachable)
    }
}

/// Analyzes every line of `filter`.
///
/// # Errors
///
/// Returns [`AclCheckError::Cancelled`] if `cancel` fires before the last
/// line, and [`AclCheckError::Space`] if a subtraction exceeds
/// `limits.max_cubes`.
pub fn analyze(
    filter: &Filter,
    objects: &ObjectGroups,
    limits: AnalysisLimits,
    cancel: &CancellationToken,
) -> Result<ReachabilityResult> {
    analyze_resolved(&ResolvedFilter::new(filter, objects), limits, cancel)
}

/// Same as [`analyze`], reusing already resolved lines.
pub fn analyze_resolved(
    resolved: &ResolvedFilter<'_>,
    limits: AnalysisLimits,
    cancel: &CancellationToken,
) -> Result<ReachabilityResult> {
    let filter = resolved.filter();
    let mut covered = HeaderSpace::empty();
    let mut earlier: Vec<(usize, &HeaderSpace)> = Vec::new();
    let mut findings = Vec::new();

    for (line, resolution) in resolved.lines() {
        if cancel.is_cancelled() {
            debug!(
                node = %filter.node(),
                filter = %filter.name(),
                line = line.index(),
                "analysis cancelled"
            );
            return Err(AclCheckError::Cancelled);
        }

        let Some(space) = resolution.space() else {
            if let Some(reason) = resolution.problem() {
                warn!(
                    node = %filter.node(),
                    filter = %filter.name(),
                    line = line.index(),
                    %reason,
                    "line has an unresolvable reference"
                );
                findings.push(LineFinding {
                    index: line.index(),
                    outcome: LineReachability::Indeterminate { reason },
                });
            }
            continue;
        };

        if space.is_empty() {
            warn!(
                node = %filter.node(),
                filter = %filter.name(),
                line = line.index(),
                text = %line.text(),
                "line matches no packets"
            );
            findings.push(LineFinding {
                index: line.index(),
                outcome: LineReachability::Unmatchable,
            });
            continue;
        }

        let reachable = space.subtract_bounded(&covered, limits.max_cubes)?;
        if reachable.is_empty() {
            let blocking = blocking_lines(space, &earlier, limits)?;
            let different_action = blocking
                .iter()
                .filter_map(|&i| filter.line(i))
                .any(|blocker| blocker.action() != line.action());
            debug!(
                node = %filter.node(),
                filter = %filter.name(),
                line = line.index(),
                ?blocking,
                "line is unreachable"
            );
            findings.push(LineFinding {
                index: line.index(),
                outcome: LineReachability::Unreachable {
                    blocking,
                    different_action,
                },
            });
        }

        covered = covered.union(space);
        earlier.push((line.index(), space));
    }

    Ok(ReachabilityResult {
        node: filter.node().to_string(),
        filter: filter.name().to_string(),
        lines: filter.texts(),
        findings,
    })
}

/// Picks earlier lines that together cover `blocked`.
///
/// Greedy: repeatedly take the line covering the largest part of what is
/// still uncovered (lower index on ties), then drop picks the others make
/// redundant. Result is ascending.
fn blocking_lines(
    blocked: &HeaderSpace,
    earlier: &[(usize, &HeaderSpace)],
    limits: AnalysisLimits,
) -> Result<Vec<usize>> {
    let candidates: Vec<(usize, &HeaderSpace)> = earlier
        .iter()
        .filter(|(_, space)| space.intersects(blocked))
        .copied()
        .collect();

    let mut chosen: Vec<(usize, &HeaderSpace)> = Vec::new();
    let mut uncovered = blocked.clone();
    while !uncovered.is_empty() {
        let mut best: Option<(usize, &HeaderSpace, f64)> = None;
        for &(index, space) in &candidates {
            if chosen.iter().any(|(picked, _)| *picked == index) {
                continue;
            }
            let gain = uncovered.intersect(space).volume();
            if gain > 0.0 && best.map_or(true, |(_, _, top)| gain > top) {
                best = Some((index, space, gain));
            }
        }
        let Some((index, space, _)) = best else {
            break;
        };
        uncovered = uncovered.subtract_bounded(space, limits.max_cubes)?;
        chosen.push((index, space));
    }

    let mut k = chosen.len();
    while k > 0 && chosen.len() > 1 {
        k -= 1;
        let others = chosen
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != k)
            .fold(HeaderSpace::empty(), |acc, (_, (_, space))| acc.union(space));
        if blocked
            .subtract_bounded(&others, limits.max_cubes)?
            .is_empty()
        {
            chosen.remove(k);
        }
    }

    let mut indices: Vec<usize> = chosen.into_iter().map(|(index, _)| index).collect();
    indices.sort_unstable();
    Ok(indices)
}
