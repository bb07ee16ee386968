//! One-shot arrangement ordered by density.
//!
//! Denser dimensions go first in storage order, which lowers the number of
//! cells typical queries have to traverse. The result can raise memory
//! usage for a while, so this runs before the bulk strategies.

use ar_types::{Arrangement, ArResult, Dimension, OracleError, StrategyTag};
use tracing::info;

use super::StrategyOutcome;
use crate::oracle::Oracle;
use crate::retry::Sleeper;
use crate::session::Session;

pub(super) fn run<O, S>(
    session: &mut Session<S>,
    oracle: &mut O,
    start: &Arrangement,
) -> ArResult<StrategyOutcome>
where
    O: Oracle + ?Sized,
    S: Sleeper,
{
    let mut outcome = StrategyOutcome::new(StrategyTag::Sparsity);

    let mut ratios: Vec<(f64, Dimension)> = Vec::with_capacity(start.len());
    for dimension in start.iter() {
        let others: Vec<Dimension> = start.iter().filter(|d| *d != dimension).cloned().collect();
        let ratio = oracle.sparsity_ratio(dimension, &others)?;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(OracleError::InvalidResponse {
                operation: "sparsity_ratio".to_string(),
                message: format!("ratio {ratio} for '{dimension}' is outside [0, 1]"),
            }
            .into());
        }
        info!(dimension = %dimension, ratio, "sparsity ratio");
        ratios.push((ratio, dimension.clone()));
    }

    // Densest first; ties keep their current relative order.
    ratios.sort_by(|a, b| b.0.total_cmp(&a.0));
    let order = Arrangement::new(ratios.into_iter().map(|(_, d)| d).collect())?;
    info!(arrangement = %order, "determined density order");

    let result = session.evaluate(oracle, &order, StrategyTag::Sparsity, false)?;
    outcome.best = Some(order);
    outcome.results.push(result);
    Ok(outcome)
}
