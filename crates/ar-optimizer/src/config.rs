//! Session configuration.

use ar_types::{config_error, ArResult, LatencyStatistic};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::retry::RetryPolicy;
use crate::strategy::Strategy;

/// How the coordinate-descent midpoint is derived from the arrangement length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MidpointRule {
    #[default]
    Floor,
    Ceil,
}

impl MidpointRule {
    pub fn midpoint(&self, len: usize) -> usize {
        match self {
            MidpointRule::Floor => len / 2,
            MidpointRule::Ceil => len.div_ceil(2),
        }
    }
}

/// Top-level configuration for one optimization session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cube under optimization.
    pub name: String,

    /// Queries timed per evaluation. The first one is the primary query used
    /// for single-metric comparisons.
    pub queries: Vec<String>,

    /// Optional side workload timed per evaluation.
    pub process: Option<String>,

    /// Number of timed runs per query and process.
    pub repetitions: usize,

    /// Retry policy for absolute memory reads.
    pub retry: RetryPolicy,

    /// Aggregate used when comparing latencies.
    pub statistic: LatencyStatistic,

    pub midpoint: MidpointRule,

    /// Seed for stochastic strategies; entropy when absent.
    pub seed: Option<u64>,

    /// Strategies to run after the baseline.
    pub strategies: Vec<Strategy>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            queries: Vec::new(),
            process: None,
            repetitions: 15,
            retry: RetryPolicy::default(),
            statistic: LatencyStatistic::Median,
            midpoint: MidpointRule::Floor,
            seed: None,
            strategies: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn new(name: impl Into<String>, primary_query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queries: vec![primary_query.into()],
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.queries.push(query.into());
        self
    }

    pub fn with_process(mut self, process: impl Into<String>) -> Self {
        self.process = Some(process.into());
        self
    }

    pub fn with_repetitions(mut self, n: usize) -> Self {
        self.repetitions = n;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_statistic(mut self, statistic: LatencyStatistic) -> Self {
        self.statistic = statistic;
        self
    }

    pub fn with_midpoint(mut self, midpoint: MidpointRule) -> Self {
        self.midpoint = midpoint;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn primary_query(&self) -> Option<&str> {
        self.queries.first().map(String::as_str)
    }

    pub fn validate(&self) -> ArResult<()> {
        if self.queries.is_empty() {
            return Err(config_error!("at least one query must be configured"));
        }
        if self.queries.iter().any(|q| q.trim().is_empty()) {
            return Err(config_error!("query names must not be blank"));
        }
        if self.repetitions == 0 {
            return Err(config_error!("repetitions must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(config_error!("retry.max_attempts must be at least 1"));
        }
        for strategy in &self.strategies {
            strategy.validate()?;
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> ArResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ArResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{CoordinateDescentParams, HillClimbingParams};
    use ar_types::ArError;
    use std::time::Duration;

    #[test]
    fn midpoint_rules() {
        assert_eq!(MidpointRule::Floor.midpoint(5), 2);
        assert_eq!(MidpointRule::Ceil.midpoint(5), 3);
        assert_eq!(MidpointRule::Floor.midpoint(6), 3);
        assert_eq!(MidpointRule::Ceil.midpoint(6), 3);
    }

    #[test]
    fn builder_chain_and_defaults() {
        let config = SessionConfig::new("Sales", "Default")
            .with_query("Detail")
            .with_process("load.sales")
            .with_repetitions(5)
            .with_seed(11)
            .with_strategy(Strategy::Sparsity)
            .with_strategy(Strategy::HillClimbing(HillClimbingParams::default()));

        assert_eq!(config.primary_query(), Some("Default"));
        assert_eq!(config.statistic, LatencyStatistic::Median);
        assert_eq!(config.midpoint, MidpointRule::Floor);
        assert_eq!(config.retry.backoff, Duration::from_secs(15));
        assert_eq!(config.strategies.len(), 2);
        config.validate().unwrap();
    }

    #[test]
    fn validation_rejects_missing_queries_and_zero_repetitions() {
        let no_queries = SessionConfig::default();
        assert!(matches!(no_queries.validate(), Err(ArError::Config(_))));

        let zero = SessionConfig::new("Sales", "Default").with_repetitions(0);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn parses_json_with_tagged_strategies() {
        let json = r#"{
            "name": "Sales",
            "queries": ["Default"],
            "repetitions": 3,
            "midpoint": "ceil",
            "statistic": "mean",
            "strategies": [
                {"kind": "sparsity"},
                {"kind": "coordinate_descent", "fast": true, "excluded": ["Version"]},
                {"kind": "random_sampling", "max_count": 20}
            ]
        }"#;
        let config = SessionConfig::from_json_str(json).unwrap();
        assert_eq!(config.midpoint, MidpointRule::Ceil);
        assert_eq!(config.statistic, LatencyStatistic::Mean);
        assert_eq!(config.repetitions, 3);
        match &config.strategies[1] {
            Strategy::CoordinateDescent(CoordinateDescentParams { fast, excluded, .. }) => {
                assert!(*fast);
                assert_eq!(excluded[0].as_str(), "Version");
            }
            other => panic!("unexpected strategy: {other:?}"),
        }
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"name": "Sales", "queries": ["Default"]}"#).unwrap();
        let config = SessionConfig::from_json_file(&path).unwrap();
        assert_eq!(config.repetitions, 15);

        assert!(matches!(
            SessionConfig::from_json_file(dir.path().join("missing.json")),
            Err(ArError::Io(_))
        ));
    }
}
