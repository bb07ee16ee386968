//! Greedy left-to-right build.
//!
//! For each position every dimension not placed yet is tried as its
//! occupant, with the remaining dimensions kept in their current relative
//! order behind it. The fastest candidate's occupant is fixed and the build
//! moves one position right.

use ar_types::{Arrangement, ArResult, Dimension, StrategyTag};
use tracing::info;

use super::{fastest, StrategyOutcome};
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
    let mut outcome = StrategyOutcome::new(StrategyTag::PositionalBuild);
    let mut placed: Vec<Dimension> = Vec::with_capacity(start.len());
    let mut remaining: Vec<Dimension> = start.dimensions().to_vec();

    for position in 0..start.len() {
        // A single dimension left has nowhere else to go.
        if remaining.len() == 1 {
            placed.append(&mut remaining);
            break;
        }

        let mut candidates = Vec::with_capacity(remaining.len());
        for k in 0..remaining.len() {
            // Bring the k-th remaining dimension to the front; the others
            // keep their relative order behind it.
            let mut tail = remaining.clone();
            tail[..=k].rotate_right(1);
            let mut dimensions = placed.clone();
            dimensions.extend(tail);
            let candidate = Arrangement::new(dimensions)?;
            candidates.push(session.evaluate(
                oracle,
                &candidate,
                StrategyTag::PositionalBuild,
                false,
            )?);
        }

        let winner = candidates[fastest(session, &candidates)?].arrangement.clone();
        let fixed = winner.dimensions()[position].clone();
        info!(position, dimension = %fixed, "placed dimension");
        placed.push(fixed);
        remaining = winner.dimensions()[position + 1..].to_vec();
        outcome.positions.push(position);
        outcome.results.extend(candidates);
    }

    let built = Arrangement::new(placed)?;
    outcome.best = Some(built);
    Ok(outcome)
}
