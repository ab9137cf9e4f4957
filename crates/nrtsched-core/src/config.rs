//! Configuration types for nrtsched

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

/// Main scheduler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Scoring configuration
    pub scoring: ScoringConfig,
    /// Topology source configuration
    pub topology: TopologyConfig,
    /// API server configuration
    pub api: ApiConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl SchedulerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::NrtError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::NrtError::Config(format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::NrtError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Scoring configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Scoring strategy
    pub strategy: ScoringStrategy,
    /// How per-zone scores are reduced to a node score
    pub reduction: ScoreReduction,
    /// Per-resource weights; unlisted resources weigh 1
    pub resources: Vec<ResourceWeightConfig>,
}

impl ScoringConfig {
    /// Weight table keyed by resource name
    pub fn weight_table(&self) -> BTreeMap<String, i64> {
        self.resources
            .iter()
            .map(|r| (r.name.clone(), r.weight))
            .collect()
    }
}

/// Weight of one resource in least/most-allocatable scoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceWeightConfig {
    pub name: String,
    pub weight: i64,
}

/// Per-zone scoring strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScoringStrategy {
    /// Favor zones left with the least headroom (tight packing)
    #[default]
    LeastAllocatable,
    /// Favor zones left with the most headroom
    MostAllocatable,
    /// Favor zones whose usage ratios are uniform across resources
    BalancedAllocation,
}

impl ScoringStrategy {
    /// Resolve a strategy name, falling back to least-allocatable
    pub fn from_name(name: &str) -> Self {
        match name {
            "least-allocatable" | "leastAllocatable" => ScoringStrategy::LeastAllocatable,
            "most-allocatable" | "mostAllocatable" => ScoringStrategy::MostAllocatable,
            "balanced-allocation" | "balancedAllocation" => ScoringStrategy::BalancedAllocation,
            other => {
                warn!(strategy = %other, "Unknown scoring strategy, using least-allocatable");
                ScoringStrategy::LeastAllocatable
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringStrategy::LeastAllocatable => "least-allocatable",
            ScoringStrategy::MostAllocatable => "most-allocatable",
            ScoringStrategy::BalancedAllocation => "balanced-allocation",
        }
    }
}

impl From<String> for ScoringStrategy {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<ScoringStrategy> for String {
    fn from(strategy: ScoringStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

impl std::fmt::Display for ScoringStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduction of per-zone scores into one node score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreReduction {
    /// Minimum that skips zero-scoring zones unless every zone scores zero
    #[default]
    ZeroAvoidance,
    /// Plain minimum over all zones. Deprecated: a single zone that cannot
    /// fit drags the whole node to zero.
    PlainMinimum,
}

/// Topology source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// File or directory holding node resource topology objects (JSON)
    pub path: Option<PathBuf>,
    /// Namespaces searched, in order, for a node's topology
    pub namespaces: Vec<String>,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            path: None,
            namespaces: vec!["default".to_string()],
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind the REST API server
    pub rest_address: String,
    /// Port for the REST API server
    pub rest_port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rest_address: "0.0.0.0".to_string(),
            rest_port: 9095,
            cors_enabled: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_scheduler_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.api.rest_port, 9095);
        assert_eq!(config.scoring.strategy, ScoringStrategy::LeastAllocatable);
        assert_eq!(config.scoring.reduction, ScoreReduction::ZeroAvoidance);
        assert_eq!(config.topology.namespaces, vec!["default".to_string()]);
    }

    #[test]
    fn test_scheduler_config_parse() {
        let toml_str = r#"
[scoring]
strategy = "balanced-allocation"

[[scoring.resources]]
name = "cpu"
weight = 3

[[scoring.resources]]
name = "memory"
weight = 1

[topology]
path = "/etc/nrtsched/topologies"
namespaces = ["numa-system", "default"]

[logging]
level = "debug"
"#;
        let config: SchedulerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scoring.strategy, ScoringStrategy::BalancedAllocation);
        assert_eq!(config.scoring.weight_table().get("cpu"), Some(&3));
        assert_eq!(config.topology.namespaces.len(), 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "text");
        assert_eq!(config.api.rest_port, 9095);
    }

    #[test]
    fn test_unknown_strategy_falls_back() {
        let config: ScoringConfig = toml::from_str("strategy = \"random\"").unwrap();
        assert_eq!(config.strategy, ScoringStrategy::LeastAllocatable);
    }

    #[test]
    fn test_legacy_strategy_names() {
        assert_eq!(
            ScoringStrategy::from_name("mostAllocatable"),
            ScoringStrategy::MostAllocatable
        );
        assert_eq!(
            ScoringStrategy::from_name("balancedAllocation"),
            ScoringStrategy::BalancedAllocation
        );
    }

    #[test]
    fn test_plain_minimum_reduction_parse() {
        let config: ScoringConfig = toml::from_str("reduction = \"plain-minimum\"").unwrap();
        assert_eq!(config.reduction, ScoreReduction::PlainMinimum);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nrest_port = 8088").unwrap();

        let config = SchedulerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api.rest_port, 8088);
    }

    #[test]
    fn test_from_file_missing() {
        let result = SchedulerConfig::from_file(std::path::Path::new("/nonexistent/nrtsched.toml"));
        assert!(matches!(result, Err(crate::NrtError::Config(_))));
    }
}
