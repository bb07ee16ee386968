//! Run context threading the result store through every evaluation.

use ar_types::{
    Arrangement, ArError, ArResult, EvaluationResult, OracleError, Samples, StrategyTag,
};
use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::oracle::Oracle;
use crate::retry::{Sleeper, ThreadSleeper};
use crate::store::{MemoryReading, ResultStore};

/// Unique session identifier.
pub type SessionId = Uuid;

/// State of one optimization session against one cube.
///
/// A session evaluates arrangements strictly one after another: the oracle
/// mutates the live cube on every call and the store's running memory
/// baseline is chained through each result in order.
///
/// The store is read-only outside this crate:
///
/// ```compile_fail
/// fn bypass(session: &mut ar_optimizer::Session) {
///     session.store_mut().reset_sequence();
/// }
/// ```
#[derive(Debug)]
pub struct Session<S: Sleeper = ThreadSleeper> {
    id: SessionId,
    config: SessionConfig,
    dimensions: Arrangement,
    store: ResultStore,
    rng: ChaCha8Rng,
    sleeper: S,
}

impl Session<ThreadSleeper> {
    pub fn new(config: SessionConfig, dimensions: Arrangement) -> ArResult<Self> {
        Self::with_sleeper(config, dimensions, ThreadSleeper)
    }
}

impl<S: Sleeper> Session<S> {
    /// `dimensions` is the cube's full dimension set; every evaluated
    /// arrangement must be a reordering of it.
    pub fn with_sleeper(config: SessionConfig, dimensions: Arrangement, sleeper: S) -> ArResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            id: Uuid::new_v4(),
            config,
            dimensions,
            store: ResultStore::new(),
            rng,
            sleeper,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn dimensions(&self) -> &Arrangement {
        &self.dimensions
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut ResultStore {
        &mut self.store
    }

    pub fn results(&self) -> &[EvaluationResult] {
        self.store.results()
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn into_store(self) -> ResultStore {
        self.store
    }

    pub fn primary_query(&self) -> &str {
        // validate() guarantees at least one query
        &self.config.queries[0]
    }

    /// Apply `arrangement`, time the configured queries and process, resolve
    /// memory and record the outcome.
    ///
    /// An absolute memory read is forced when `force_absolute` is set or
    /// when no baseline exists yet; otherwise the oracle's percentage delta
    /// is chained onto the running baseline.
    pub fn evaluate<O: Oracle + ?Sized>(
        &mut self,
        oracle: &mut O,
        arrangement: &Arrangement,
        strategy: StrategyTag,
        force_absolute: bool,
    ) -> ArResult<EvaluationResult> {
        arrangement.ensure_permutation_of(&self.dimensions)?;

        let delta = oracle.apply_and_get_memory_delta(arrangement)?;

        let repetitions = self.config.repetitions;
        let mut latency_samples = Samples::new();
        for query in &self.config.queries {
            let durations = oracle.measure_latency(query, repetitions)?;
            if durations.len() != repetitions {
                return Err(OracleError::InvalidResponse {
                    operation: "measure_latency".to_string(),
                    message: format!(
                        "expected {repetitions} samples for '{query}', got {}",
                        durations.len()
                    ),
                }
                .into());
            }
            latency_samples.insert(
                query.clone(),
                durations.iter().map(|d| d.as_secs_f64()).collect(),
            );
        }

        let process_samples = match &self.config.process {
            Some(process) => {
                let runs = oracle.measure_process(process, repetitions)?;
                if let Some((run, failed)) = runs
                    .iter()
                    .enumerate()
                    .find(|(_, r)| !r.status.is_success())
                {
                    return Err(ArError::ProcessExecutionFailed {
                        process: process.clone(),
                        run: run + 1,
                        status: failed.status.to_string(),
                    });
                }
                let mut samples = Samples::new();
                samples.insert(
                    process.clone(),
                    runs.iter().map(|r| r.duration.as_secs_f64()).collect(),
                );
                Some(samples)
            }
            None => None,
        };

        let reading = if force_absolute || self.store.running_memory().is_none() {
            MemoryReading::Absolute(self.read_absolute_memory(oracle)?)
        } else {
            // A delta of -100% or below would leave nothing to chain from.
            if !delta.is_finite() || delta <= -100.0 {
                return Err(OracleError::InvalidResponse {
                    operation: "apply_and_get_memory_delta".to_string(),
                    message: format!("memory delta {delta}% for {arrangement} is not usable"),
                }
                .into());
            }
            MemoryReading::Delta(delta)
        };
        let memory_bytes = self.store.resolve(reading)?;

        let result = EvaluationResult {
            sequence_id: self.store.next_sequence(),
            strategy,
            arrangement: arrangement.clone(),
            primary_query: self.primary_query().to_string(),
            latency_samples,
            process_samples,
            memory_bytes,
            memory_delta_pct: match reading {
                MemoryReading::Absolute(_) => 0.0,
                MemoryReading::Delta(pct) => pct,
            },
            is_selected: false,
            evaluated_at: Utc::now(),
        };
        let latency = result.primary_latency(self.config.statistic)?;

        let recorded = self.store.record(result);
        debug!(
            session = %self.id,
            sequence_id = recorded.sequence_id,
            strategy = %strategy,
            arrangement = %recorded.arrangement,
            latency,
            memory_bytes,
            "evaluated arrangement"
        );
        Ok(recorded.clone())
    }

    fn read_absolute_memory<O: Oracle + ?Sized>(&mut self, oracle: &mut O) -> ArResult<f64> {
        let policy = self.config.retry;
        let value = policy.run(&mut self.sleeper, |_| {
            oracle
                .measure_memory_absolute()
                .map(|reading| reading.filter(|bytes| *bytes > 0.0))
        })?;
        value.ok_or(ArError::MonitoringNotEnabled {
            attempts: policy.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FixtureOracle;
    use crate::retry::RecordingSleeper;
    use std::time::Duration;

    fn session(oracle: &FixtureOracle) -> Session<RecordingSleeper> {
        let config = SessionConfig::new("Sales", "Default").with_repetitions(3);
        Session::with_sleeper(config, oracle.current.clone(), RecordingSleeper::default()).unwrap()
    }

    #[test]
    fn first_evaluation_reads_absolute_memory() {
        let mut oracle = FixtureOracle::new(&["A", "B", "C"]).with_baseline_memory(100.0);
        let mut session = session(&oracle);
        let start = oracle.current.clone();

        let result = session
            .evaluate(&mut oracle, &start, StrategyTag::Baseline, false)
            .unwrap();
        assert_eq!(result.memory_bytes, 100.0);
        assert_eq!(result.sequence_id, 1);
        assert_eq!(result.latency_samples["Default"].len(), 3);
        assert_eq!(oracle.absolute_reads, 1);
    }

    #[test]
    fn later_evaluations_chain_deltas() {
        let mut oracle = FixtureOracle::new(&["A", "B", "C"])
            .with_baseline_memory(100.0)
            .with_delta(|_| 10.0);
        let mut session = session(&oracle);
        let start = oracle.current.clone();

        session
            .evaluate(&mut oracle, &start, StrategyTag::Baseline, true)
            .unwrap();
        let second = session
            .evaluate(&mut oracle, &start.swapped(0, 1), StrategyTag::RandomSampling, false)
            .unwrap();
        let third = session
            .evaluate(&mut oracle, &start.swapped(1, 2), StrategyTag::RandomSampling, false)
            .unwrap();

        assert!((second.memory_bytes - 110.0).abs() < 1e-9);
        assert!((third.memory_bytes - 121.0).abs() < 1e-9);
        assert_eq!(third.memory_delta_pct, 10.0);
        assert_eq!(oracle.absolute_reads, 1);
    }

    #[test]
    fn invalid_arrangement_is_rejected_before_any_oracle_call() {
        let mut oracle = FixtureOracle::new(&["A", "B", "C"]);
        let mut session = session(&oracle);
        let foreign = Arrangement::from_names(["A", "B", "X"]).unwrap();

        let err = session
            .evaluate(&mut oracle, &foreign, StrategyTag::Baseline, true)
            .unwrap_err();
        assert!(matches!(err, ArError::InvalidArrangement { .. }));
        assert!(oracle.applied.is_empty());
    }

    #[test]
    fn empty_memory_reads_fail_after_four_attempts_and_three_waits() {
        let mut oracle = FixtureOracle::new(&["A", "B"]).with_memory_reads(vec![None; 4]);
        let mut session = session(&oracle);
        let start = oracle.current.clone();

        let err = session
            .evaluate(&mut oracle, &start, StrategyTag::Baseline, true)
            .unwrap_err();
        assert!(matches!(err, ArError::MonitoringNotEnabled { attempts: 4 }));
        assert_eq!(oracle.absolute_reads, 4);
        assert_eq!(session.sleeper().waits, vec![Duration::from_secs(15); 3]);
        assert!(session.results().is_empty());
    }

    #[test]
    fn zero_reading_counts_as_empty() {
        let mut oracle = FixtureOracle::new(&["A", "B"])
            .with_memory_reads(vec![Some(0.0), None, Some(64.0)]);
        let mut session = session(&oracle);
        let start = oracle.current.clone();

        let result = session
            .evaluate(&mut oracle, &start, StrategyTag::Baseline, true)
            .unwrap();
        assert_eq!(result.memory_bytes, 64.0);
        assert_eq!(session.sleeper().waits.len(), 2);
    }

    #[test]
    fn failing_process_aborts_evaluation() {
        let mut oracle = FixtureOracle::new(&["A", "B"]).with_failing_process_run(2);
        let config = SessionConfig::new("Sales", "Default")
            .with_repetitions(3)
            .with_process("load.sales");
        let mut session =
            Session::with_sleeper(config, oracle.current.clone(), RecordingSleeper::default())
                .unwrap();
        let start = oracle.current.clone();

        let err = session
            .evaluate(&mut oracle, &start, StrategyTag::Baseline, true)
            .unwrap_err();
        match err {
            ArError::ProcessExecutionFailed { process, run, .. } => {
                assert_eq!(process, "load.sales");
                assert_eq!(run, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_latency_is_fatal() {
        let mut oracle = FixtureOracle::new(&["A", "B"]).with_latency(|_| 0.0);
        let mut session = session(&oracle);
        let start = oracle.current.clone();

        let err = session
            .evaluate(&mut oracle, &start, StrategyTag::Baseline, true)
            .unwrap_err();
        assert!(matches!(err, ArError::DegenerateMeasurement { .. }));
    }

    #[test]
    fn oracle_failures_propagate_unchanged() {
        let mut oracle = FixtureOracle::new(&["A", "B"]).with_apply_failure("lock timeout");
        let mut session = session(&oracle);
        let start = oracle.current.clone();

        let err = session
            .evaluate(&mut oracle, &start, StrategyTag::Baseline, true)
            .unwrap_err();
        match err {
            ArError::Oracle(OracleError::RequestFailed { message, .. }) => {
                assert_eq!(message, "lock timeout")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unusable_memory_deltas_are_rejected() {
        for bad in [f64::NAN, f64::INFINITY, -100.0, -250.0] {
            let mut oracle = FixtureOracle::new(&["A", "B", "C"]).with_delta(move |_| bad);
            let mut session = session(&oracle);
            let start = oracle.current.clone();
            session
                .evaluate(&mut oracle, &start, StrategyTag::Baseline, true)
                .unwrap();

            let err = session
                .evaluate(&mut oracle, &start.swapped(0, 1), StrategyTag::RandomSampling, false)
                .unwrap_err();
            assert!(matches!(
                err,
                ArError::Oracle(OracleError::InvalidResponse { .. })
            ));
            assert_eq!(session.results().len(), 1);
            assert_eq!(session.store().running_memory(), Some(1_000_000.0));
        }
    }

    #[test]
    fn delta_ignored_when_absolute_read_is_forced() {
        let mut oracle = FixtureOracle::new(&["A", "B"])
            .with_baseline_memory(80.0)
            .with_delta(|_| f64::NAN);
        let mut session = session(&oracle);
        let start = oracle.current.clone();

        let result = session
            .evaluate(&mut oracle, &start, StrategyTag::Baseline, true)
            .unwrap();
        assert_eq!(result.memory_bytes, 80.0);
    }
}
