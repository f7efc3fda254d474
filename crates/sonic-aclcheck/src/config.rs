//! Configuration file support for aclcheck
//!
//! Loads and validates engine configuration from TOML files.
//! Default location: /etc/sonic/aclcheck.toml

use crate::action::LineAction;
use crate::error::{AclCheckError, Result};
use serde::{Deserialize, Serialize};
use sonic_acl_types::IpProtocol;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/aclcheck.toml";

/// Batch engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Concurrent analysis units; 0 means one per available CPU
    #[serde(default)]
    pub workers: usize,

    /// Batch deadline in milliseconds; 0 disables the deadline
    #[serde(default)]
    pub deadline_ms: u64,

    /// Largest header space (in cubes) a single subtraction may produce
    #[serde(default = "default_max_cubes")]
    pub max_cubes: usize,
}

/// Values filled into flows that leave fields unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefaults {
    #[serde(default = "default_protocol")]
    pub protocol: IpProtocol,

    /// Applies to TCP and UDP only
    #[serde(default = "default_src_port")]
    pub src_port: u16,

    /// Applies to TCP and UDP only
    #[serde(default = "default_dst_port")]
    pub dst_port: u16,

    /// Applies to ICMP only
    #[serde(default = "default_icmp_type")]
    pub icmp_type: u8,

    /// Applies to ICMP only
    #[serde(default)]
    pub icmp_code: u8,

    #[serde(default)]
    pub packet_length: u16,
}

/// Analysis behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Action of the implicit last line for filters that do not set one
    #[serde(default = "default_action")]
    pub default_action: LineAction,
}

/// Complete aclcheck configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AclCheckConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub flow_defaults: FlowDefaults,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn default_max_cubes() -> usize {
    100_000
}

fn default_protocol() -> IpProtocol {
    IpProtocol::TCP
}

// first IANA ephemeral port
fn default_src_port() -> u16 {
    49152
}

fn default_dst_port() -> u16 {
    80
}

// echo request
fn default_icmp_type() -> u8 {
    8
}

fn default_action() -> LineAction {
    LineAction::Reject
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            deadline_ms: 0,
            max_cubes: default_max_cubes(),
        }
    }
}

impl Default for FlowDefaults {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            src_port: default_src_port(),
            dst_port: default_dst_port(),
            icmp_type: default_icmp_type(),
            icmp_code: 0,
            packet_length: 0,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_action: default_action(),
        }
    }
}

impl AclCheckConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AclCheckError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| match e {
                AclCheckError::Config(msg) => {
                    AclCheckError::Config(format!("{}: {}", path.display(), msg))
                }
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "aclcheck: config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(AclCheckError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AclCheckError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Number of concurrent units, resolving 0 to the CPU count
    pub fn workers(&self) -> usize {
        match self.engine.workers {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }

    /// Batch deadline, if any
    pub fn deadline(&self) -> Option<Duration> {
        match self.engine.deadline_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_cubes == 0 {
            return Err(AclCheckError::Config("max_cubes must be > 0".to_string()));
        }

        if self.engine.workers > 4096 {
            return Err(AclCheckError::Config(
                "workers must be 0-4096".to_string(),
            ));
        }

        if self.flow_defaults.packet_length > 0 && self.flow_defaults.packet_length < 20 {
            return Err(AclCheckError::Config(
                "packet_length must be 0 or at least 20 (IPv4 header)".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = AclCheckConfig::default();
        assert_eq!(config.engine.max_cubes, 100_000);
        assert_eq!(config.flow_defaults.protocol, IpProtocol::TCP);
        assert_eq!(config.flow_defaults.src_port, 49152);
        assert_eq!(config.flow_defaults.dst_port, 80);
        assert_eq!(config.flow_defaults.icmp_type, 8);
        assert_eq!(config.analysis.default_action, LineAction::Reject);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_workers_and_deadline() {
        let mut config = AclCheckConfig::default();
        assert!(config.workers() >= 1);
        assert_eq!(config.deadline(), None);

        config.engine.workers = 3;
        config.engine.deadline_ms = 250;
        assert_eq!(config.workers(), 3);
        assert_eq!(config.deadline(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[engine]
workers = 2
deadline_ms = 5000

[flow_defaults]
protocol = "udp"
dst_port = 53

[analysis]
default_action = "permit"
"#;
        let config = AclCheckConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.engine.workers, 2);
        assert_eq!(config.flow_defaults.protocol, IpProtocol::UDP);
        assert_eq!(config.flow_defaults.dst_port, 53);
        assert_eq!(config.analysis.default_action, LineAction::Accept);
        // Unspecified values should use defaults
        assert_eq!(config.engine.max_cubes, 100_000);
        assert_eq!(config.flow_defaults.src_port, 49152);
    }

    #[test]
    fn test_toml_numeric_protocol() {
        let config = AclCheckConfig::from_toml("[flow_defaults]\nprotocol = 47\n").unwrap();
        assert_eq!(config.flow_defaults.protocol, IpProtocol::new(47));
    }

    #[test]
    fn test_validate_invalid_max_cubes() {
        let mut config = AclCheckConfig::default();
        config.engine.max_cubes = 0;
        assert!(config.validate().is_err());
        assert!(AclCheckConfig::from_toml("[engine]\nmax_cubes = 0\n").is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AclCheckConfig::from_toml("[analysis]\ndefault_action = \"drop\"\n").unwrap_err();
        assert!(matches!(err, AclCheckError::Config(_)));
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = AclCheckConfig::load_or_default("/nonexistent/aclcheck.toml").unwrap();
        assert_eq!(config, AclCheckConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aclcheck.toml");
        let mut config = AclCheckConfig::default();
        config.engine.workers = 4;
        config.analysis.default_action = LineAction::Accept;
        config.save(&path).unwrap();

        let reloaded = AclCheckConfig::load_or_default(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
