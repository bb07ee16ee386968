//! Stochastic hill climbing over random pairwise swaps.

use ar_types::{Arrangement, ArResult, StrategyTag};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use super::StrategyOutcome;
use crate::oracle::Oracle;
use crate::retry::Sleeper;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HillClimbingParams {
    /// Number of swap attempts, including ones skipped as already seen.
    pub max_iterations: usize,
}

impl Default for HillClimbingParams {
    fn default() -> Self {
        Self {
            max_iterations: 100,
        }
    }
}

/// Seeds with the dimensions sorted by ascending leaf count, then repeatedly
/// swaps two random positions of the incumbent. A candidate replaces the
/// incumbent only when its primary latency is strictly lower. No
/// arrangement is evaluated twice.
pub(super) fn run<O, S>(
    params: &HillClimbingParams,
    session: &mut Session<S>,
    oracle: &mut O,
    start: &Arrangement,
) -> ArResult<StrategyOutcome>
where
    O: Oracle + ?Sized,
    S: Sleeper,
{
    let mut outcome = StrategyOutcome::new(StrategyTag::HillClimbing);
    let statistic = session.config().statistic;

    let mut by_size = Vec::with_capacity(start.len());
    for dimension in start.iter() {
        by_size.push((oracle.leaf_count(dimension)?, dimension.clone()));
    }
    by_size.sort_by_key(|(leaves, _)| *leaves);
    let seed = Arrangement::new(by_size.into_iter().map(|(_, d)| d).collect())?;
    info!(seed = %seed, "hill climbing seeded smallest dimension first");

    let mut incumbent = session.evaluate(oracle, &seed, StrategyTag::HillClimbing, false)?;
    let mut incumbent_latency = incumbent.primary_latency(statistic)?;
    let mut evaluated: HashSet<Arrangement> = HashSet::new();
    evaluated.insert(seed);
    outcome.results.push(incumbent.clone());

    for iteration in 0..params.max_iterations {
        let Some(candidate) = incumbent.arrangement.swapped_random(session.rng()) else {
            break;
        };
        if evaluated.contains(&candidate) {
            debug!(iteration, arrangement = %candidate, "skipping known arrangement");
            continue;
        }

        let result = session.evaluate(oracle, &candidate, StrategyTag::HillClimbing, false)?;
        evaluated.insert(candidate);
        let latency = result.primary_latency(statistic)?;

        if latency < incumbent_latency {
            debug!(
                iteration,
                latency,
                previous = incumbent_latency,
                "accepted improving swap"
            );
            incumbent_latency = latency;
            incumbent = result;
            outcome.results.push(incumbent.clone());
        }
    }

    outcome.best = Some(incumbent.arrangement);
    Ok(outcome)
}
