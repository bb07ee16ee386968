//! Search strategies.
//!
//! Each strategy is one variant of the closed [`Strategy`] enum and runs to
//! completion against a [`Session`] before the next one starts.

mod coordinate_descent;
mod hill_climbing;
mod positional_build;
mod random_sampling;
mod sparsity;

use ar_types::{config_error, Arrangement, ArError, ArResult, EvaluationResult, StrategyTag};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::oracle::Oracle;
use crate::retry::Sleeper;
use crate::session::Session;

pub use coordinate_descent::{visit_order, CoordinateDescentParams};
pub use hill_climbing::HillClimbingParams;
pub use random_sampling::RandomSamplingParams;

/// A configured search strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Evaluate the arrangement currently in effect with an absolute memory
    /// read, establishing the running memory baseline.
    Baseline,
    /// Fix positions from both ends toward the midpoint, one swap sweep per
    /// position.
    CoordinateDescent(CoordinateDescentParams),
    /// Random pairwise swaps accepted only on strict latency improvement.
    HillClimbing(HillClimbingParams),
    /// Single arrangement ordered densest dimension first.
    Sparsity,
    /// Uniformly random arrangements, evaluated unconditionally.
    RandomSampling(RandomSamplingParams),
    /// Build the arrangement left to right, fastest occupant per position.
    PositionalBuild,
}

/// What a strategy run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub strategy: StrategyTag,
    /// Results the strategy reports, in evaluation order.
    pub results: Vec<EvaluationResult>,
    /// Arrangement the strategy converged to, if it converges.
    pub best: Option<Arrangement>,
    /// Positions fixed by positional strategies, in visit order.
    pub positions: Vec<usize>,
}

impl StrategyOutcome {
    fn new(strategy: StrategyTag) -> Self {
        Self {
            strategy,
            results: Vec::new(),
            best: None,
            positions: Vec::new(),
        }
    }
}

impl Strategy {
    pub fn tag(&self) -> StrategyTag {
        match self {
            Strategy::Baseline => StrategyTag::Baseline,
            Strategy::CoordinateDescent(_) => StrategyTag::CoordinateDescent,
            Strategy::HillClimbing(_) => StrategyTag::HillClimbing,
            Strategy::Sparsity => StrategyTag::Sparsity,
            Strategy::RandomSampling(_) => StrategyTag::RandomSampling,
            Strategy::PositionalBuild => StrategyTag::PositionalBuild,
        }
    }

    /// Ordering key within a session: strategies more likely to spike memory
    /// run first so the worst-case peak stays bounded.
    pub fn memory_risk_rank(&self) -> u8 {
        match self {
            Strategy::Baseline => 0,
            Strategy::Sparsity => 1,
            Strategy::RandomSampling(_) => 2,
            Strategy::HillClimbing(_) => 3,
            Strategy::PositionalBuild => 4,
            Strategy::CoordinateDescent(_) => 5,
        }
    }

    pub fn validate(&self) -> ArResult<()> {
        match self {
            Strategy::HillClimbing(params) if params.max_iterations == 0 => {
                Err(config_error!("hill_climbing.max_iterations must be at least 1"))
            }
            Strategy::RandomSampling(params) if params.max_count == 0 => {
                Err(config_error!("random_sampling.max_count must be at least 1"))
            }
            _ => Ok(()),
        }
    }

    /// Run the strategy from `start`, recording every evaluation in the
    /// session's store.
    pub fn run<O, S>(
        &self,
        session: &mut Session<S>,
        oracle: &mut O,
        start: &Arrangement,
    ) -> ArResult<StrategyOutcome>
    where
        O: Oracle + ?Sized,
        S: Sleeper,
    {
        info!(strategy = %self.tag(), start = %start, "running strategy");
        let outcome = match self {
            Strategy::Baseline => {
                let mut outcome = StrategyOutcome::new(StrategyTag::Baseline);
                let result = session.evaluate(oracle, start, StrategyTag::Baseline, true)?;
                outcome.best = Some(result.arrangement.clone());
                outcome.results.push(result);
                outcome
            }
            Strategy::CoordinateDescent(params) => {
                coordinate_descent::run(params, session, oracle, start)?
            }
            Strategy::HillClimbing(params) => hill_climbing::run(params, session, oracle, start)?,
            Strategy::Sparsity => sparsity::run(session, oracle, start)?,
            Strategy::RandomSampling(params) => {
                random_sampling::run(params, session, oracle, start)?
            }
            Strategy::PositionalBuild => positional_build::run(session, oracle, start)?,
        };
        info!(
            strategy = %self.tag(),
            evaluations = outcome.results.len(),
            best = ?outcome.best.as_ref().map(ToString::to_string),
            "strategy finished"
        );
        Ok(outcome)
    }
}

/// Index of the first result with the lowest primary latency.
fn fastest<S: Sleeper>(session: &Session<S>, results: &[EvaluationResult]) -> ArResult<usize> {
    let statistic = session.config().statistic;
    let mut best: Option<(usize, f64)> = None;
    for (i, result) in results.iter().enumerate() {
        let latency = result.primary_latency(statistic)?;
        if best.map_or(true, |(_, b)| latency < b) {
            best = Some((i, latency));
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| ArError::Internal("no candidates to compare".to_string()))
}

/// Index of the first result with the lowest resolved memory.
fn leanest(results: &[EvaluationResult]) -> ArResult<usize> {
    results
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.memory_bytes.total_cmp(&b.1.memory_bytes))
        .map(|(i, _)| i)
        .ok_or_else(|| ArError::Internal("no candidates to compare".to_string()))
}
