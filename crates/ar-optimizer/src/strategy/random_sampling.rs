//! Uniform random sampling of arrangements for exploratory analysis.

use ar_types::{Arrangement, ArResult, StrategyTag};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::StrategyOutcome;
use crate::oracle::{is_numeric_only, Oracle};
use crate::retry::Sleeper;
use crate::session::Session;

const PROGRESS_INTERVAL: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomSamplingParams {
    /// Number of random arrangements to evaluate.
    pub max_count: usize,
    /// Keep the trailing measure dimension in place when it holds
    /// non-numeric leaves.
    pub pin_non_numeric_measure: bool,
}

impl Default for RandomSamplingParams {
    fn default() -> Self {
        Self {
            max_count: 100,
            pin_non_numeric_measure: true,
        }
    }
}

pub(super) fn run<O, S>(
    params: &RandomSamplingParams,
    session: &mut Session<S>,
    oracle: &mut O,
    start: &Arrangement,
) -> ArResult<StrategyOutcome>
where
    O: Oracle + ?Sized,
    S: Sleeper,
{
    let mut outcome = StrategyOutcome::new(StrategyTag::RandomSampling);
    let keep_last = params.pin_non_numeric_measure && !is_numeric_only(&*oracle, start.last())?;

    for done in 0..params.max_count {
        if done > 0 && done % PROGRESS_INTERVAL == 0 {
            info!(
                completed = done,
                percent = done * 100 / params.max_count,
                "random sampling progress"
            );
        }
        let candidate = start.shuffled(session.rng(), keep_last);
        let result = session.evaluate(oracle, &candidate, StrategyTag::RandomSampling, false)?;
        outcome.results.push(result);
    }

    info!(completed = params.max_count, percent = 100, "random sampling done");
    Ok(outcome)
}
