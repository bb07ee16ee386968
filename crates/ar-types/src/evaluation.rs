//! Evaluation outcomes recorded once per oracle round-trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::arrangement::Arrangement;
use crate::errors::{ArError, ArResult};

/// Measured durations in seconds, keyed by query or process name, in
/// execution order.
pub type Samples = BTreeMap<String, Vec<f64>>;

/// Which search strategy produced an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyTag {
    Baseline,
    CoordinateDescent,
    HillClimbing,
    Sparsity,
    RandomSampling,
    PositionalBuild,
}

impl StrategyTag {
    /// Label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyTag::Baseline => "Original Order",
            StrategyTag::CoordinateDescent => "Coordinate Descent",
            StrategyTag::HillClimbing => "Hill Climbing",
            StrategyTag::Sparsity => "Sparsity",
            StrategyTag::RandomSampling => "Random Sampling",
            StrategyTag::PositionalBuild => "Positional Build",
        }
    }
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Statistic used to collapse repeated latency samples into one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyStatistic {
    #[default]
    Median,
    Mean,
}

/// Median of `values`; `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Arithmetic mean of `values`; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

impl LatencyStatistic {
    /// Column prefix used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            LatencyStatistic::Median => "Median",
            LatencyStatistic::Mean => "Mean",
        }
    }

    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        match self {
            LatencyStatistic::Median => median(values),
            LatencyStatistic::Mean => mean(values),
        }
    }
}

/// Outcome of evaluating one arrangement.
///
/// Immutable once recorded, apart from `is_selected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub sequence_id: u64,
    pub strategy: StrategyTag,
    pub arrangement: Arrangement,
    /// Name of the query used for single-metric comparisons.
    pub primary_query: String,
    pub latency_samples: Samples,
    pub process_samples: Option<Samples>,
    /// Resolved absolute memory footprint in bytes.
    pub memory_bytes: f64,
    /// Percentage change reported by the oracle; 0 for absolute reads.
    pub memory_delta_pct: f64,
    pub is_selected: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Primary query latency under `statistic`.
    ///
    /// A zero value means the query finished too fast to be measured and is
    /// reported as [`ArError::DegenerateMeasurement`].
    pub fn primary_latency(&self, statistic: LatencyStatistic) -> ArResult<f64> {
        self.query_latency(&self.primary_query, statistic)
    }

    pub fn query_latency(&self, query: &str, statistic: LatencyStatistic) -> ArResult<f64> {
        let samples = self
            .latency_samples
            .get(query)
            .ok_or_else(|| ArError::MissingSamples {
                name: query.to_string(),
            })?;
        let value = statistic
            .apply(samples)
            .ok_or_else(|| ArError::MissingSamples {
                name: query.to_string(),
            })?;
        if value <= 0.0 {
            return Err(ArError::DegenerateMeasurement {
                query: query.to_string(),
            });
        }
        Ok(value)
    }

    pub fn median_latency(&self) -> ArResult<f64> {
        self.primary_latency(LatencyStatistic::Median)
    }

    /// Median duration of `process`, or `None` when no process was measured.
    pub fn median_process_time(&self, process: &str) -> Option<f64> {
        self.process_samples
            .as_ref()
            .and_then(|samples| samples.get(process))
            .and_then(|values| median(values))
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_bytes / (1024.0 * 1024.0 * 1024.0)
    }
}
