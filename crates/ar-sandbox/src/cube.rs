//! Simulated cube for sandbox mode.
//!
//! Applies arrangements locally and derives memory and latency from a
//! deterministic cost model, so whole sessions can run without a server.

use ar_optimizer::{ElementKind, Oracle, ProcessRun, ProcessStatus};
use ar_types::{validation_error, ArResult, Arrangement, Dimension, OracleError, OracleResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// One dimension of the simulated cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    pub name: String,
    pub leaf_count: usize,
    /// Fraction of leaves populated, in `[0, 1]`.
    #[serde(default = "default_density")]
    pub density: f64,
    /// Whether the dimension carries string members besides numeric ones.
    #[serde(default)]
    pub string_elements: bool,
}

fn default_density() -> f64 {
    0.5
}

impl DimensionSpec {
    pub fn new(name: impl Into<String>, leaf_count: usize, density: f64) -> Self {
        Self {
            name: name.into(),
            leaf_count,
            density,
            string_elements: false,
        }
    }

    pub fn with_string_elements(mut self) -> Self {
        self.string_elements = true;
        self
    }
}

/// Process run that aborts: run `run` of the `measurement`-th process
/// measurement (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessFailure {
    pub measurement: usize,
    pub run: usize,
}

/// Configuration for the simulated cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedCubeConfig {
    pub name: String,
    /// Dimensions in their initial storage order.
    pub dimensions: Vec<DimensionSpec>,
    pub base_memory_bytes: f64,
    pub base_latency_secs: f64,
    pub process_duration_secs: f64,
    /// Whether memory monitoring starts enabled.
    pub monitoring_enabled: bool,
    /// Empty memory reads after monitoring is enabled before values appear.
    pub monitoring_warmup_reads: usize,
    pub process_failure: Option<ProcessFailure>,
}

impl Default for SimulatedCubeConfig {
    fn default() -> Self {
        Self {
            name: "Sandbox".to_string(),
            dimensions: Vec::new(),
            base_memory_bytes: 512.0 * 1024.0 * 1024.0,
            base_latency_secs: 0.2,
            process_duration_secs: 1.5,
            monitoring_enabled: false,
            monitoring_warmup_reads: 1,
            process_failure: None,
        }
    }
}

impl SimulatedCubeConfig {
    /// A small sales cube with a trailing string-bearing measure dimension.
    pub fn demo() -> Self {
        Self {
            name: "Sales".to_string(),
            dimensions: vec![
                DimensionSpec::new("Year", 10, 0.9),
                DimensionSpec::new("Region", 50, 0.6),
                DimensionSpec::new("Product", 2000, 0.05),
                DimensionSpec::new("Channel", 8, 0.7),
                DimensionSpec::new("Version", 3, 0.95),
                DimensionSpec::new("Measure", 12, 1.0).with_string_elements(),
            ],
            ..Self::default()
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ArResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ArResult<()> {
        if self.dimensions.is_empty() {
            return Err(validation_error!("cube '{}' has no dimensions", self.name));
        }
        let mut seen = HashSet::new();
        for spec in &self.dimensions {
            if !seen.insert(spec.name.as_str()) {
                return Err(validation_error!("duplicate dimension '{}'", spec.name));
            }
            if spec.leaf_count == 0 {
                return Err(validation_error!("dimension '{}' has no leaves", spec.name));
            }
            if !(0.0..=1.0).contains(&spec.density) {
                return Err(validation_error!(
                    "density of '{}' must be within [0, 1], got {}",
                    spec.name,
                    spec.density
                ));
            }
        }
        if self.base_memory_bytes <= 0.0 || self.base_latency_secs <= 0.0 {
            return Err(validation_error!("base memory and latency must be positive"));
        }
        Ok(())
    }
}

/// In-process cube implementing [`Oracle`].
#[derive(Debug)]
pub struct SimulatedCube {
    config: SimulatedCubeConfig,
    specs: BTreeMap<Dimension, DimensionSpec>,
    current: Arrangement,
    monitoring_enabled: bool,
    warmup_remaining: usize,
    memory_reads: usize,
    process_measurements: usize,
    applied: Vec<Arrangement>,
}

impl SimulatedCube {
    pub fn new(config: SimulatedCubeConfig) -> ArResult<Self> {
        config.validate()?;
        let current = Arrangement::from_names(config.dimensions.iter().map(|d| d.name.as_str()))?;
        let specs = config
            .dimensions
            .iter()
            .map(|spec| (Dimension::new(spec.name.as_str()), spec.clone()))
            .collect();
        let monitoring_enabled = config.monitoring_enabled;
        let warmup_remaining = if monitoring_enabled {
            0
        } else {
            config.monitoring_warmup_reads
        };
        Ok(Self {
            config,
            specs,
            current,
            monitoring_enabled,
            warmup_remaining,
            memory_reads: 0,
            process_measurements: 0,
            applied: Vec::new(),
        })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ArResult<Self> {
        Self::new(SimulatedCubeConfig::from_json_file(path)?)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SimulatedCubeConfig {
        &self.config
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring_enabled
    }

    /// Toggle memory monitoring and return the previous setting. Enabling
    /// restarts the warm-up period.
    pub fn set_monitoring(&mut self, enabled: bool) -> bool {
        let previous = self.monitoring_enabled;
        if enabled && !previous {
            self.warmup_remaining = self.config.monitoring_warmup_reads;
        }
        self.monitoring_enabled = enabled;
        info!(cube = %self.config.name, enabled, "memory monitoring toggled");
        previous
    }

    /// Arrangements applied so far, in order.
    pub fn applied(&self) -> &[Arrangement] {
        &self.applied
    }

    pub fn memory_reads(&self) -> usize {
        self.memory_reads
    }

    /// Modelled memory footprint of `arrangement` in bytes.
    ///
    /// Sparse dimensions early in storage order inflate memory, and a
    /// string-bearing dimension anywhere but last is penalised.
    pub fn memory_of(&self, arrangement: &Arrangement) -> f64 {
        let n = arrangement.len();
        let span = (n.max(2) - 1) as f64;
        let mut factor = 1.0;
        for (position, dimension) in arrangement.iter().enumerate() {
            let Some(spec) = self.specs.get(dimension) else {
                continue;
            };
            let earliness = (n - 1 - position) as f64 / span;
            factor += 0.5 * (1.0 - spec.density) * earliness / n as f64;
            if spec.string_elements && position + 1 != n {
                factor *= 1.5;
            }
        }
        self.config.base_memory_bytes * factor
    }

    /// Modelled primary latency of `arrangement` in seconds.
    ///
    /// Large dimensions late in storage order slow queries down.
    pub fn latency_of(&self, arrangement: &Arrangement) -> f64 {
        let n = arrangement.len() as f64;
        let mut factor = 1.0;
        for (position, dimension) in arrangement.iter().enumerate() {
            if let Some(spec) = self.specs.get(dimension) {
                factor += (1.0 + spec.leaf_count as f64).ln() * position as f64 / (n * 10.0);
            }
        }
        self.config.base_latency_secs * factor
    }

    fn spec(&self, dimension: &Dimension) -> OracleResult<&DimensionSpec> {
        self.specs
            .get(dimension)
            .ok_or_else(|| OracleError::UnknownDimension {
                dimension: dimension.to_string(),
            })
    }

    fn jitter(run: usize) -> f64 {
        1.0 + 0.002 * (run % 5) as f64
    }
}

impl Oracle for SimulatedCube {
    fn current_arrangement(&self) -> OracleResult<Arrangement> {
        Ok(self.current.clone())
    }

    fn apply_and_get_memory_delta(&mut self, arrangement: &Arrangement) -> OracleResult<f64> {
        if !arrangement.is_permutation_of(&self.current) {
            return Err(OracleError::request_failed(
                "apply",
                format!("{arrangement} does not reorder the dimensions of '{}'", self.config.name),
            ));
        }
        let before = self.memory_of(&self.current);
        let after = self.memory_of(arrangement);
        self.current = arrangement.clone();
        self.applied.push(arrangement.clone());
        let delta = (after / before - 1.0) * 100.0;
        debug!(arrangement = %arrangement, delta, "applied arrangement");
        Ok(delta)
    }

    fn measure_memory_absolute(&mut self) -> OracleResult<Option<f64>> {
        self.memory_reads += 1;
        if !self.monitoring_enabled {
            return Ok(None);
        }
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return Ok(Some(0.0));
        }
        Ok(Some(self.memory_of(&self.current)))
    }

    fn measure_latency(&mut self, _query: &str, repetitions: usize) -> OracleResult<Vec<Duration>> {
        let seconds = self.latency_of(&self.current);
        Ok((0..repetitions)
            .map(|run| Duration::from_secs_f64(seconds * Self::jitter(run)))
            .collect())
    }

    fn measure_process(
        &mut self,
        _process: &str,
        repetitions: usize,
    ) -> OracleResult<Vec<ProcessRun>> {
        self.process_measurements += 1;
        let scale = self.latency_of(&self.current) / self.config.base_latency_secs;
        let seconds = self.config.process_duration_secs * scale;
        let failing = self
            .config
            .process_failure
            .filter(|f| f.measurement == self.process_measurements)
            .map(|f| f.run);

        Ok((1..=repetitions)
            .map(|run| ProcessRun {
                duration: Duration::from_secs_f64(seconds * Self::jitter(run)),
                status: if Some(run) == failing {
                    ProcessStatus::Aborted
                } else {
                    ProcessStatus::Completed
                },
            })
            .collect())
    }

    fn leaf_count(&self, dimension: &Dimension) -> OracleResult<usize> {
        Ok(self.spec(dimension)?.leaf_count)
    }

    fn sparsity_ratio(&self, dimension: &Dimension, others: &[Dimension]) -> OracleResult<f64> {
        for other in others {
            self.spec(other)?;
        }
        Ok(self.spec(dimension)?.density)
    }

    fn element_kinds(&self, dimension: &Dimension) -> OracleResult<BTreeMap<String, ElementKind>> {
        let spec = self.spec(dimension)?;
        let mut kinds = BTreeMap::new();
        kinds.insert(format!("Total {}", spec.name), ElementKind::Consolidated);
        for leaf in 1..=spec.leaf_count.min(3) {
            kinds.insert(format!("{} {leaf}", spec.name), ElementKind::Numeric);
        }
        if spec.string_elements {
            kinds.insert(format!("{} Note", spec.name), ElementKind::String);
        }
        Ok(kinds)
    }
}
