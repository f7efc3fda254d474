//! Parallel fan-out of analysis units over a snapshot.
//!
//! Every selected (node, filter) pair is one unit of work, run on the
//! blocking thread pool behind a semaphore of `workers` permits. Results are
//! fanned back in through a `JoinSet`. When the deadline expires the shared
//! cancellation token fires: analyses stop at their next line, queued units
//! never start, and both are reported as pending.

use crate::aggregator::{classify_rows, reachability_rows, select_filters, NamePattern};
use crate::api::{
    AclSource, ClassifyRequest, ClassifyResponse, ErrorRow, ReachabilityRequest,
    ReachabilityResponse,
};
use crate::classifier::{classify_resolved, ClassificationResult};
use crate::config::{AclCheckConfig, FlowDefaults};
use crate::error::{AclCheckError, Result};
use crate::reachability::{analyze_resolved, AnalysisLimits, ReachabilityResult};
use crate::snapshot::Snapshot;
use sonic_headerspace::Flow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to every unit of one batch.
struct FanIn<T> {
    done: Vec<T>,
    errors: Vec<ErrorRow>,
    pending: Vec<AclSource>,
}

/// Runs classification and reachability batches against a shared snapshot.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    snapshot: Arc<Snapshot>,
    workers: usize,
    deadline: Option<Duration>,
    limits: AnalysisLimits,
    flow_defaults: FlowDefaults,
}

impl BatchRunner {
    pub fn new(snapshot: Arc<Snapshot>, config: &AclCheckConfig) -> Self {
        Self {
            snapshot,
            workers: config.workers(),
            deadline: config.deadline(),
            limits: AnalysisLimits::from(config),
            flow_defaults: config.flow_defaults.clone(),
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Classifies every requested flow against every selected filter.
    ///
    /// # Errors
    ///
    /// Fails as a whole on a malformed flow, an invalid name pattern, or a
    /// selection that matches no filter. Per-filter failures become
    /// [`ErrorRow`]s.
    pub async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse> {
        let flows: Vec<Flow> = request
            .all_flows()
            .map(|spec| spec.to_flow(&self.flow_defaults))
            .collect::<Result<_>>()?;
        if flows.is_empty() {
            return Err(AclCheckError::malformed_flow("flow", "no flow given"));
        }
        let units = self.select(request.node_regex.as_deref(), request.filter_regex.as_deref())?;
        info!(
            flows = flows.len(),
            filters = units.len(),
            "aclcheck: classifying flows"
        );

        let flows = Arc::new(flows);
        let snapshot = Arc::clone(&self.snapshot);
        let fan_in = self
            .fan_out(units, move |unit, cancel| {
                let resolved = snapshot.resolve_filter(&unit.node, &unit.filter)?;
                let mut results: Vec<ClassificationResult> = Vec::with_capacity(flows.len());
                for flow in flows.iter() {
                    if cancel.is_cancelled() {
                        return Err(AclCheckError::Cancelled);
                    }
                    results.push(classify_resolved(flow, &resolved));
                }
                Ok(results)
            })
            .await;

        Ok(ClassifyResponse {
            rows: classify_rows(fan_in.done.into_iter().flatten().collect()),
            errors: fan_in.errors,
            incomplete: !fan_in.pending.is_empty(),
            pending: fan_in.pending,
        })
    }

    /// Analyzes line reachability of every selected filter.
    ///
    /// # Errors
    ///
    /// Fails as a whole on an invalid name pattern or a selection that
    /// matches no filter. Per-filter failures become [`ErrorRow`]s.
    pub async fn reachability(&self, request: &ReachabilityRequest) -> Result<ReachabilityResponse> {
        let units = self.select(request.node_regex.as_deref(), request.acl_regex.as_deref())?;
        info!(filters = units.len(), "aclcheck: analyzing line reachability");

        let snapshot = Arc::clone(&self.snapshot);
        let limits = self.limits;
        let fan_in = self
            .fan_out(units, move |unit, cancel| {
                let resolved = snapshot.resolve_filter(&unit.node, &unit.filter)?;
                analyze_resolved(&resolved, limits, cancel)
            })
            .await;

        let results: Vec<ReachabilityResult> = fan_in.done;
        Ok(ReachabilityResponse {
            rows: reachability_rows(&results),
            errors: fan_in.errors,
            incomplete: !fan_in.pending.is_empty(),
            pending: fan_in.pending,
        })
    }

    fn select(&self, nodes: Option<&str>, filters: Option<&str>) -> Result<Vec<AclSource>> {
        let nodes = NamePattern::new(nodes)?;
        let filters = NamePattern::new(filters)?;
        select_filters(&self.snapshot, &nodes, &filters)
    }

    async fn fan_out<T, F>(&self, units: Vec<AclSource>, work: F) -> FanIn<T>
    where
        T: Send + 'static,
        F: Fn(&AclSource, &CancellationToken) -> Result<T> + Send + Sync + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers.max(1)));
        let cancel = CancellationToken::new();
        let work = Arc::new(work);
        let mut set = JoinSet::new();

        for unit in units {
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let work = Arc::clone(&work);
            set.spawn(async move {
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit,
                    _ = cancel.cancelled() => return (unit, None),
                };
                let Ok(_permit) = permit else {
                    return (unit, None);
                };
                if cancel.is_cancelled() {
                    return (unit, None);
                }
                let task_unit = unit.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || (work.as_ref())(&task_unit, &cancel)).await;
                let outcome = outcome.unwrap_or_else(|e| Err(AclCheckError::Task(e.to_string())));
                (unit, Some(outcome))
            });
        }

        let deadline = self.deadline;
        let expiry = async move {
            match deadline {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        let mut done = BTreeMap::new();
        let mut errors = Vec::new();
        let mut pending = Vec::new();
        let mut expired = false;

        loop {
            tokio::select! {
                joined = set.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((unit, Some(Ok(value)))) => {
                            debug!(node = %unit.node, filter = %unit.filter, "aclcheck: unit finished");
                            done.insert(unit, value);
                        }
                        Ok((unit, Some(Err(AclCheckError::Cancelled)))) | Ok((unit, None)) => {
                            pending.push(unit);
                        }
                        Ok((unit, Some(Err(e)))) => {
                            warn!(node = %unit.node, filter = %unit.filter, error = %e, "aclcheck: unit failed");
                            errors.push(ErrorRow {
                                node: unit.node,
                                filter: unit.filter,
                                error: e.to_string(),
                            });
                        }
                        Err(e) => error!(error = %e, "aclcheck: fan-out task failed"),
                    }
                }
                _ = &mut expiry, if !expired => {
                    expired = true;
                    warn!(
                        deadline = ?deadline,
                        "aclcheck: deadline expired, cancelling outstanding units"
                    );
                    cancel.cancel();
                }
            }
        }

        pending.sort();
        errors.sort_by(|a: &ErrorRow, b: &ErrorRow| (&a.node, &a.filter).cmp(&(&b.node, &b.filter)));
        FanIn {
            done: done.into_values().collect(),
            errors,
            pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::LineAction;
    use crate::classifier::FlowSpec;
    use pretty_assertions::assert_eq;

    const SNAPSHOT: &str = r#"
nodes:
  - name: r1
    filters:
      - name: acl
        lines: ["permit ip any any", "deny tcp any any"]
  - name: r2
    filters:
      - name: acl
        lines: ["permit ip any any", "deny tcp any any"]
      - name: other
        lines: ["permit udp any any eq 53"]
"#;

    fn runner() -> BatchRunner {
        let snapshot = Snapshot::from_yaml(SNAPSHOT, LineAction::Reject).unwrap();
        BatchRunner::new(Arc::new(snapshot), &AclCheckConfig::default()).with_workers(2)
    }

    #[tokio::test]
    async fn test_reachability_batch() {
        let response = runner()
            .reachability(&ReachabilityRequest::default())
            .await
            .unwrap();
        assert!(!response.incomplete);
        assert!(response.errors.is_empty());
        assert_eq!(response.rows.len(), 1);
        assert_eq!(
            response.rows[0].acl_sources,
            vec![AclSource::new("r1", "acl"), AclSource::new("r2", "acl")]
        );
    }

    #[tokio::test]
    async fn test_classify_batch() {
        let request = ClassifyRequest::new(
            FlowSpec::new("1.0.1.2", "2.128.0.101").protocol("udp").ports(None, Some(53)),
        )
        .nodes("r2");
        let response = runner().classify(&request).await.unwrap();
        let rows: Vec<(&str, &str, usize)> = response
            .rows
            .iter()
            .map(|r| (r.node.as_str(), r.filter_name.as_str(), r.line_number))
            .collect();
        assert_eq!(rows, vec![("r2", "acl", 0), ("r2", "other", 0)]);
    }

    #[tokio::test]
    async fn test_classify_rejects_malformed_flow() {
        let request = ClassifyRequest::new(
            FlowSpec::new("1.0.1.2", "2.128.0.101").protocol("icmp").ports(Some(1), None),
        );
        let err = runner().classify(&request).await.unwrap_err();
        assert!(matches!(err, AclCheckError::MalformedFlow { .. }));
    }

    #[tokio::test]
    async fn test_no_selection_is_undefined_filter() {
        let request = ReachabilityRequest {
            node_regex: Some("r9".to_string()),
            acl_regex: None,
        };
        let err = runner().reachability(&request).await.unwrap_err();
        assert!(matches!(err, AclCheckError::UndefinedFilter { .. }));
    }

    #[tokio::test]
    async fn test_expired_deadline_reports_pending() {
        let runner = runner().with_deadline(Some(Duration::ZERO)).with_workers(1);
        let units = vec![AclSource::new("r1", "acl"), AclSource::new("r2", "acl")];
        let fan_in = runner
            .fan_out(units, |_unit, cancel| {
                // Runs until cancelled.
                while !cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err::<(), _>(AclCheckError::Cancelled)
            })
            .await;
        assert!(fan_in.done.is_empty());
        assert_eq!(
            fan_in.pending,
            vec![AclSource::new("r1", "acl"), AclSource::new("r2", "acl")]
        );
    }

    const PARTLY_BROKEN: &str = r#"
nodes:
  - name: r1
    filters:
      - name: good
        lines: ["permit udp any any eq 53", "deny udp any any eq 53"]
      - name: bad
        lines: ["permit ip any"]
"#;

    fn partly_broken_runner() -> BatchRunner {
        let snapshot = Snapshot::from_yaml(PARTLY_BROKEN, LineAction::Reject).unwrap();
        BatchRunner::new(Arc::new(snapshot), &AclCheckConfig::default())
    }

    #[tokio::test]
    async fn test_broken_filter_does_not_stop_siblings() {
        let response = partly_broken_runner()
            .reachability(&ReachabilityRequest::default())
            .await
            .unwrap();
        assert!(!response.incomplete);
        assert_eq!(response.rows.len(), 1);
        assert_eq!(response.rows[0].acl_sources, vec![AclSource::new("r1", "good")]);
        assert_eq!(response.rows[0].blocked_line_num, 1);

        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].filter, "bad");
        assert!(response.errors[0].error.contains("permit ip any"));
    }

    #[tokio::test]
    async fn test_broken_filter_classification_error_row() {
        let request = ClassifyRequest::new(
            FlowSpec::new("1.0.1.2", "2.128.0.101").protocol("udp").ports(None, Some(53)),
        );
        let response = partly_broken_runner().classify(&request).await.unwrap();
        let rows: Vec<(&str, usize)> = response
            .rows
            .iter()
            .map(|r| (r.filter_name.as_str(), r.line_number))
            .collect();
        assert_eq!(rows, vec![("good", 0)]);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].node, "r1");
        assert_eq!(response.errors[0].filter, "bad");
    }

    #[tokio::test]
    async fn test_unit_errors_become_rows() {
        let units = vec![AclSource::new("r1", "missing"), AclSource::new("r1", "acl")];
        let snapshot = Arc::clone(&runner().snapshot);
        let fan_in = runner()
            .fan_out(units, move |unit, _cancel| {
                snapshot.filter(&unit.node, &unit.filter).map(|f| f.lines().len())
            })
            .await;
        assert_eq!(fan_in.done, vec![2]);
        assert_eq!(fan_in.errors.len(), 1);
        assert_eq!(fan_in.errors[0].filter, "missing");
        assert!(fan_in.pending.is_empty());
    }
}
