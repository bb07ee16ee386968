//! Scripted oracle for unit tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use ar_types::{Arrangement, Dimension, OracleError, OracleResult};

use crate::oracle::{ElementKind, Oracle, ProcessRun, ProcessStatus};

type CostFn = Box<dyn Fn(&Arrangement) -> f64>;

pub(crate) struct FixtureOracle {
    pub current: Arrangement,
    pub applied: Vec<Arrangement>,
    pub absolute_reads: usize,
    original: Arrangement,
    baseline_memory: f64,
    memory_reads: VecDeque<Option<f64>>,
    latency: CostFn,
    delta: CostFn,
    string_dimensions: HashSet<Dimension>,
    leaf_counts: HashMap<Dimension, usize>,
    sparsity: HashMap<Dimension, f64>,
    failing_process_run: Option<usize>,
    apply_failure: Option<String>,
}

impl FixtureOracle {
    pub fn new(names: &[&str]) -> Self {
        let original = Arrangement::from_names(names.iter().copied()).unwrap();
        let weights = original.clone();
        Self {
            current: original.clone(),
            applied: Vec::new(),
            absolute_reads: 0,
            original,
            baseline_memory: 1_000_000.0,
            memory_reads: VecDeque::new(),
            // Later dimensions of the initial order are costlier the further
            // right they sit.
            latency: Box::new(move |arrangement| {
                0.1 + arrangement
                    .iter()
                    .enumerate()
                    .map(|(position, d)| {
                        let weight = weights.position_of(d).unwrap_or(0) + 1;
                        (position + 1) as f64 * weight as f64 * 0.001
                    })
                    .sum::<f64>()
            }),
            delta: Box::new(|_| 1.0),
            string_dimensions: HashSet::new(),
            leaf_counts: HashMap::new(),
            sparsity: HashMap::new(),
            failing_process_run: None,
            apply_failure: None,
        }
    }

    pub fn with_baseline_memory(mut self, bytes: f64) -> Self {
        self.baseline_memory = bytes;
        self
    }

    /// Scripted absolute-memory answers, consumed one per read. Once
    /// exhausted, reads return the baseline memory.
    pub fn with_memory_reads(mut self, reads: Vec<Option<f64>>) -> Self {
        self.memory_reads = reads.into();
        self
    }

    pub fn with_latency(mut self, f: impl Fn(&Arrangement) -> f64 + 'static) -> Self {
        self.latency = Box::new(f);
        self
    }

    pub fn with_delta(mut self, f: impl Fn(&Arrangement) -> f64 + 'static) -> Self {
        self.delta = Box::new(f);
        self
    }

    pub fn with_string_dimension(mut self, name: &str) -> Self {
        self.string_dimensions.insert(Dimension::new(name));
        self
    }

    pub fn with_leaf_counts(mut self, counts: &[(&str, usize)]) -> Self {
        for (name, count) in counts {
            self.leaf_counts.insert(Dimension::new(*name), *count);
        }
        self
    }

    pub fn with_sparsity(mut self, ratios: &[(&str, f64)]) -> Self {
        for (name, ratio) in ratios {
            self.sparsity.insert(Dimension::new(*name), *ratio);
        }
        self
    }

    /// Make the 1-based `run` of every process measurement abort.
    pub fn with_failing_process_run(mut self, run: usize) -> Self {
        self.failing_process_run = Some(run);
        self
    }

    pub fn with_apply_failure(mut self, message: &str) -> Self {
        self.apply_failure = Some(message.to_string());
        self
    }

    fn known(&self, dimension: &Dimension) -> OracleResult<()> {
        if self.original.contains(dimension) {
            Ok(())
        } else {
            Err(OracleError::UnknownDimension {
                dimension: dimension.to_string(),
            })
        }
    }
}

impl Oracle for FixtureOracle {
    fn current_arrangement(&self) -> OracleResult<Arrangement> {
        Ok(self.current.clone())
    }

    fn apply_and_get_memory_delta(&mut self, arrangement: &Arrangement) -> OracleResult<f64> {
        if let Some(message) = &self.apply_failure {
            return Err(OracleError::request_failed("apply", message.clone()));
        }
        self.current = arrangement.clone();
        self.applied.push(arrangement.clone());
        Ok((self.delta)(arrangement))
    }

    fn measure_memory_absolute(&mut self) -> OracleResult<Option<f64>> {
        self.absolute_reads += 1;
        Ok(self
            .memory_reads
            .pop_front()
            .unwrap_or(Some(self.baseline_memory)))
    }

    fn measure_latency(&mut self, _query: &str, repetitions: usize) -> OracleResult<Vec<Duration>> {
        let seconds = (self.latency)(&self.current);
        Ok(vec![Duration::from_secs_f64(seconds); repetitions])
    }

    fn measure_process(
        &mut self,
        _process: &str,
        repetitions: usize,
    ) -> OracleResult<Vec<ProcessRun>> {
        Ok((1..=repetitions)
            .map(|run| ProcessRun {
                duration: Duration::from_millis(20),
                status: if Some(run) == self.failing_process_run {
                    ProcessStatus::Aborted
                } else {
                    ProcessStatus::Completed
                },
            })
            .collect())
    }

    fn leaf_count(&self, dimension: &Dimension) -> OracleResult<usize> {
        self.known(dimension)?;
        Ok(self.leaf_counts.get(dimension).copied().unwrap_or(10))
    }

    fn sparsity_ratio(&self, dimension: &Dimension, _others: &[Dimension]) -> OracleResult<f64> {
        self.known(dimension)?;
        Ok(self.sparsity.get(dimension).copied().unwrap_or(0.5))
    }

    fn element_kinds(&self, dimension: &Dimension) -> OracleResult<BTreeMap<String, ElementKind>> {
        self.known(dimension)?;
        let mut kinds = BTreeMap::new();
        kinds.insert("Total".to_string(), ElementKind::Consolidated);
        kinds.insert("Leaf 1".to_string(), ElementKind::Numeric);
        if self.string_dimensions.contains(dimension) {
            kinds.insert("Comment".to_string(), ElementKind::String);
        }
        Ok(kinds)
    }
}
