//! Batch runner tests driven from configuration and snapshot files on disk

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use sonic_aclcheck::{
        AclCheckConfig, AclCheckError, BatchRunner, ClassifyRequest, FlowSpec, LineAction,
        ReachabilityRequest, Snapshot,
    };
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
[engine]
workers = 2
deadline_ms = 60000
max_cubes = 5000

[flow_defaults]
protocol = "udp"
dst_port = 53

[analysis]
default_action = "permit"
"#;

    const SNAPSHOT: &str = r#"
nodes:
  - name: edge1
    address_groups:
      SERVERS: ["10.1.0.0/16", "group:DNS"]
      DNS: ["10.2.0.53"]
      LOOP_A: ["group:LOOP_B"]
      LOOP_B: ["group:LOOP_A"]
    port_groups:
      NAME_SERVICE: ["53"]
    filters:
      - name: inbound
        lines:
          - permit udp any addrgroup SERVERS portgroup NAME_SERVICE
          - deny ip any addrgroup LOOP_A
          - permit udp any host 10.2.0.53 eq 53
          - deny ip any any
      - name: strict
        default_action: deny
        lines:
          - permit tcp any any eq 22
"#;

    fn write_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn load() -> (AclCheckConfig, BatchRunner) {
        let config_file = write_file(".toml", CONFIG);
        let snapshot_file = write_file(".yaml", SNAPSHOT);

        let config = AclCheckConfig::load_or_default(config_file.path()).unwrap();
        let snapshot = Snapshot::load(snapshot_file.path(), config.analysis.default_action).unwrap();
        let runner = BatchRunner::new(Arc::new(snapshot), &config);
        (config, runner)
    }

    #[test]
    fn test_config_file_values() {
        let (config, _) = load();
        assert_eq!(config.workers(), 2);
        assert_eq!(config.deadline(), Some(Duration::from_secs(60)));
        assert_eq!(config.engine.max_cubes, 5000);
        assert_eq!(config.flow_defaults.dst_port, 53);
        // unset keys keep their defaults
        assert_eq!(config.flow_defaults.src_port, 49152);
        assert_eq!(config.analysis.default_action, LineAction::Accept);
    }

    #[test]
    fn test_default_action_from_config_and_filter() {
        let (_, runner) = load();
        let snapshot = runner.snapshot();
        assert_eq!(
            snapshot.filter("edge1", "inbound").unwrap().default_action(),
            LineAction::Accept
        );
        assert_eq!(
            snapshot.filter("edge1", "strict").unwrap().default_action(),
            LineAction::Reject
        );
    }

    #[tokio::test]
    async fn test_reachability_reports_every_category() {
        let (_, runner) = load();
        let request = ReachabilityRequest {
            node_regex: None,
            acl_regex: Some("inbound".to_string()),
        };
        let response = runner.reachability(&request).await.unwrap();
        assert!(!response.incomplete);
        assert!(response.pending.is_empty());

        let messages: Vec<&str> = response.rows.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "ACLs { edge1: inbound } contain a line with a circular reference:\n  \
                 [index 1] deny ip any addrgroup LOOP_A\nReference: LOOP_A -> LOOP_B -> LOOP_A",
                "ACLs { edge1: inbound } contain an unreachable line:\n  \
                 [index 2] permit udp any host 10.2.0.53 eq 53\nBlocking line(s):\n  \
                 [index 0] permit udp any addrgroup SERVERS portgroup NAME_SERVICE",
            ]
        );
        assert_eq!(response.rows[1].blocking_line_nums, vec![0]);
        assert!(!response.rows[1].different_action);
    }

    #[tokio::test]
    async fn test_classify_fills_configured_defaults() {
        let (_, runner) = load();
        let request = ClassifyRequest::new(FlowSpec::new("192.0.2.1", "10.2.0.53")).filters("inbound");
        let response = runner.classify(&request).await.unwrap();

        assert_eq!(response.rows.len(), 1);
        let row = &response.rows[0];
        assert_eq!(row.flow.dst_port(), 53);
        assert_eq!(row.line_number, 0);
        assert_eq!(row.action, Some(LineAction::Accept));
    }

    #[tokio::test]
    async fn test_classify_reports_indeterminate_line() {
        let (_, runner) = load();
        let request = ClassifyRequest::new(FlowSpec::new("192.0.2.1", "10.9.9.9")).filters("inbound");
        let response = runner.classify(&request).await.unwrap();

        let row = &response.rows[0];
        assert_eq!(row.action, None);
        assert_eq!(row.line_number, 1);
        assert_eq!(
            row.indeterminate_reason.as_deref(),
            Some("circular reference LOOP_A -> LOOP_B -> LOOP_A")
        );
    }

    #[tokio::test]
    async fn test_space_limit_becomes_error_row() {
        let snapshot = Snapshot::from_yaml(SNAPSHOT, LineAction::Reject).unwrap();
        let mut config = AclCheckConfig::default();
        config.engine.max_cubes = 1;
        let runner = BatchRunner::new(Arc::new(snapshot), &config);

        let response = runner
            .reachability(&ReachabilityRequest::default())
            .await
            .unwrap();
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].filter, "inbound");
        assert!(response.errors[0].error.contains("limit"));
    }

    #[tokio::test]
    async fn test_invalid_regex_fails_the_batch() {
        let (_, runner) = load();
        let request = ReachabilityRequest {
            node_regex: Some("edge(".to_string()),
            acl_regex: None,
        };
        assert!(matches!(
            runner.reachability(&request).await,
            Err(AclCheckError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AclCheckConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AclCheckConfig::default());
    }
}
