//! Sequential log of evaluation outcomes.
//!
//! The store owns the run's sequence counter and its running memory
//! baseline. Oracles report memory as a percentage change against the
//! previously applied arrangement, so each resolved value depends on the one
//! recorded right before it and results must be recorded in evaluation order.

use ar_types::{ArError, ArResult, EvaluationResult};
use serde::{Deserialize, Serialize};

/// Memory figure as reported by the oracle for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MemoryReading {
    /// Absolute footprint in bytes.
    Absolute(f64),
    /// Percentage change relative to the previous resolved footprint.
    Delta(f64),
}

/// Results are appended only by the session evaluating them. Code outside
/// this crate can read the log:
///
/// ```
/// fn count(store: &ar_optimizer::ResultStore) -> usize {
///     store.results().len()
/// }
/// ```
///
/// but cannot append to it or edit recorded results:
///
/// ```compile_fail
/// fn append(store: &mut ar_optimizer::ResultStore, result: ar_types::EvaluationResult) {
///     store.record(result);
/// }
/// ```
///
/// ```compile_fail
/// fn select_all(store: &mut ar_optimizer::ResultStore) {
///     for result in store.results_mut() {
///         result.is_selected = true;
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultStore {
    results: Vec<EvaluationResult>,
    next_sequence: u64,
    running_memory: Option<f64>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            next_sequence: 1,
            running_memory: None,
        }
    }

    /// Restart numbering at 1. Only allowed before anything was recorded.
    pub fn reset_sequence(&mut self) -> ArResult<()> {
        if !self.results.is_empty() {
            return Err(ArError::Internal(format!(
                "cannot reset sequence after {} evaluations were recorded",
                self.results.len()
            )));
        }
        self.next_sequence = 1;
        Ok(())
    }

    /// Last resolved memory footprint, if any evaluation established one.
    pub fn running_memory(&self) -> Option<f64> {
        self.running_memory
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Absolute footprint for `reading`, chained from the running baseline.
    pub fn resolve(&self, reading: MemoryReading) -> ArResult<f64> {
        match reading {
            MemoryReading::Absolute(bytes) => Ok(bytes),
            MemoryReading::Delta(pct) => {
                let previous = self.running_memory.ok_or_else(|| {
                    ArError::Internal(
                        "memory delta reported before an absolute baseline was read".to_string(),
                    )
                })?;
                Ok(previous + previous * pct / 100.0)
            }
        }
    }

    /// Append `result`, assigning its sequence id and advancing the running
    /// memory baseline to its resolved footprint.
    pub(crate) fn record(&mut self, mut result: EvaluationResult) -> &EvaluationResult {
        result.sequence_id = self.next_sequence;
        self.next_sequence += 1;
        self.running_memory = Some(result.memory_bytes);
        self.results.push(result);
        &self.results[self.results.len() - 1]
    }

    pub fn results(&self) -> &[EvaluationResult] {
        &self.results
    }

    pub(crate) fn results_mut(&mut self) -> &mut [EvaluationResult] {
        &mut self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_results(self) -> Vec<EvaluationResult> {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_types::{Arrangement, Samples, StrategyTag};
    use chrono::Utc;

    fn result(memory_bytes: f64) -> EvaluationResult {
        EvaluationResult {
            sequence_id: 0,
            strategy: StrategyTag::RandomSampling,
            arrangement: Arrangement::from_names(["A", "B"]).unwrap(),
            primary_query: "q".into(),
            latency_samples: Samples::new(),
            process_samples: None,
            memory_bytes,
            memory_delta_pct: 0.0,
            is_selected: false,
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn delta_without_baseline_is_rejected() {
        let store = ResultStore::new();
        assert!(store.resolve(MemoryReading::Delta(5.0)).is_err());
        assert_eq!(store.resolve(MemoryReading::Absolute(10.0)).unwrap(), 10.0);
    }

    #[test]
    fn deltas_chain_from_previous_resolved_value() {
        let mut store = ResultStore::new();
        store.record(result(100.0));

        let mut expected = 100.0;
        for pct in [10.0, -50.0, 20.0] {
            let resolved = store.resolve(MemoryReading::Delta(pct)).unwrap();
            expected *= 1.0 + pct / 100.0;
            assert!((resolved - expected).abs() < 1e-9);
            store.record(result(resolved));
        }
        // 100 * 1.1 * 0.5 * 1.2, not 100 * (1 + 0.1 - 0.5 + 0.2)
        assert!((store.running_memory().unwrap() - 66.0).abs() < 1e-9);
    }

    #[test]
    fn sequence_ids_increase_and_reset_only_when_empty() {
        let mut store = ResultStore::new();
        store.reset_sequence().unwrap();
        assert_eq!(store.record(result(1.0)).sequence_id, 1);
        assert_eq!(store.record(result(1.0)).sequence_id, 2);
        assert!(store.reset_sequence().is_err());
        assert_eq!(store.next_sequence(), 3);
    }
}
