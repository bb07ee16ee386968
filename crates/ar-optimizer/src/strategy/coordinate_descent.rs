//! Positional coordinate descent.
//!
//! Positions are visited from the outside in, alternating between the
//! innermost storage position and the outermost one (`n-1, 0, n-2, 1, ...`).
//! At every visited position each still-movable dimension is swapped in and
//! evaluated. Positions past the midpoint keep the candidate with the lowest
//! memory footprint, the others the one with the lowest primary-query
//! latency. The winner's dimension is then fixed at that position.

use ar_types::{Arrangement, ArResult, Dimension, StrategyTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::{fastest, leanest, StrategyOutcome};
use crate::oracle::{is_numeric_only, Oracle};
use crate::retry::Sleeper;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateDescentParams {
    /// Stop after the first two visited positions.
    pub fast: bool,
    /// Dimensions that never move; positions they occupy are not visited.
    pub excluded: Vec<Dimension>,
    /// Keep the trailing measure dimension in place when it holds
    /// non-numeric leaves.
    pub pin_non_numeric_measure: bool,
}

impl Default for CoordinateDescentParams {
    fn default() -> Self {
        Self {
            fast: false,
            excluded: Vec::new(),
            pin_non_numeric_measure: true,
        }
    }
}

impl CoordinateDescentParams {
    pub fn fast() -> Self {
        Self {
            fast: true,
            ..Self::default()
        }
    }

    pub fn with_excluded(mut self, dimension: impl Into<Dimension>) -> Self {
        self.excluded.push(dimension.into());
        self
    }
}

/// Outer-to-inner alternating visit order over `span` positions:
/// `span-1, 0, span-2, 1, ...`.
pub fn visit_order(span: usize) -> impl Iterator<Item = usize> {
    (0..span).map(move |k| if k % 2 == 0 { span - 1 - k / 2 } else { k / 2 })
}

pub(super) fn run<O, S>(
    params: &CoordinateDescentParams,
    session: &mut Session<S>,
    oracle: &mut O,
    start: &Arrangement,
) -> ArResult<StrategyOutcome>
where
    O: Oracle + ?Sized,
    S: Sleeper,
{
    let mut outcome = StrategyOutcome::new(StrategyTag::CoordinateDescent);
    let n = start.len();
    let last = n - 1;
    let midpoint = session.config().midpoint.midpoint(n);
    let budget = if params.fast { 2 } else { n.div_ceil(2) };

    let mut numeric = HashMap::with_capacity(n);
    for dimension in start.iter() {
        numeric.insert(dimension.clone(), is_numeric_only(&*oracle, dimension)?);
    }

    let measure = start.last().clone();
    let pin_measure = params.pin_non_numeric_measure && !numeric[&measure];
    let span = if pin_measure { last } else { n };

    let mut working = start.clone();
    let mut pool: Vec<Dimension> = start
        .iter()
        .filter(|d| !params.excluded.contains(d))
        .filter(|d| !(pin_measure && **d == measure))
        .cloned()
        .collect();

    for position in visit_order(span) {
        if position == midpoint || outcome.positions.len() == budget {
            break;
        }
        outcome.positions.push(position);

        let occupant = working.dimensions()[position].clone();
        if !pool.contains(&occupant) {
            debug!(position, dimension = %occupant, "position held by an excluded dimension");
            continue;
        }

        let mut candidates = Vec::new();
        for dimension in pool.iter().filter(|d| **d != occupant) {
            let from = working.position_of(dimension).unwrap_or(position);
            // Non-numeric dimensions neither enter nor leave the last position.
            if (position == last || from == last) && !(numeric[dimension] && numeric[&occupant]) {
                debug!(position, dimension = %dimension, "skipping swap across last position");
                continue;
            }

            let candidate = working.swapped(position, from);
            candidates.push(session.evaluate(
                oracle,
                &candidate,
                StrategyTag::CoordinateDescent,
                false,
            )?);
        }

        if candidates.is_empty() {
            pool.retain(|d| *d != occupant);
            info!(position, dimension = %occupant, "no movable candidates, keeping occupant");
            continue;
        }

        let winner = if position > midpoint {
            leanest(&candidates)?
        } else {
            fastest(session, &candidates)?
        };
        working = candidates[winner].arrangement.clone();
        let fixed = working.dimensions()[position].clone();
        pool.retain(|d| *d != fixed);
        info!(
            position,
            dimension = %fixed,
            by_memory = position > midpoint,
            "fixed dimension at position"
        );

        outcome.results.extend(candidates);
    }

    outcome.best = Some(working);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MidpointRule, SessionConfig};
    use crate::fixtures::FixtureOracle;
    use crate::retry::RecordingSleeper;
    use crate::strategy::Strategy;

    fn session_for(
        oracle: &FixtureOracle,
        midpoint: MidpointRule,
    ) -> Session<RecordingSleeper> {
        let config = SessionConfig::new("Sales", "Default")
            .with_repetitions(3)
            .with_midpoint(midpoint);
        Session::with_sleeper(config, oracle.current.clone(), RecordingSleeper::default()).unwrap()
    }

    fn baseline(session: &mut Session<RecordingSleeper>, oracle: &mut FixtureOracle) {
        let start = oracle.current.clone();
        Strategy::Baseline.run(session, oracle, &start).unwrap();
    }

    #[test]
    fn visit_order_alternates_from_the_outside_in() {
        assert_eq!(visit_order(5).collect::<Vec<_>>(), vec![4, 0, 3, 1, 2]);
        assert_eq!(visit_order(4).collect::<Vec<_>>(), vec![3, 0, 2, 1]);
        assert_eq!(visit_order(1).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn pinned_measure_stops_at_midpoint() {
        // [A, B, C, D, M] with string leaves in M: span 4, midpoint 2.
        let mut oracle = FixtureOracle::new(&["A", "B", "C", "D", "M"])
            .with_string_dimension("M")
            .with_baseline_memory(100.0);
        let mut session = session_for(&oracle, MidpointRule::Floor);
        baseline(&mut session, &mut oracle);
        let start = oracle.current.clone();

        let outcome = Strategy::CoordinateDescent(CoordinateDescentParams::default())
            .run(&mut session, &mut oracle, &start)
            .unwrap();

        assert_eq!(outcome.positions, vec![3, 0]);
        // Position 3: A, B, C swapped in. Position 0: the three pool
        // dimensions left, minus the occupant.
        assert_eq!(outcome.results.len(), 5);
        for result in &outcome.results {
            assert_eq!(result.arrangement.last().as_str(), "M");
            assert!(result.arrangement.is_permutation_of(&start));
        }
        assert_eq!(outcome.best.as_ref().unwrap().last().as_str(), "M");
        assert_eq!(session.results().len(), 6);
    }

    #[test]
    fn far_positions_pick_lowest_memory_near_positions_lowest_latency() {
        // Memory drops only when B sits at position 3; latency is lowest with
        // C first.
        let mut oracle = FixtureOracle::new(&["A", "B", "C", "D", "M"])
            .with_string_dimension("M")
            .with_delta(|a| if a.dimensions()[3].as_str() == "B" { -10.0 } else { 5.0 })
            .with_latency(|a| if a.dimensions()[0].as_str() == "C" { 0.1 } else { 0.5 });
        let mut session = session_for(&oracle, MidpointRule::Floor);
        baseline(&mut session, &mut oracle);
        let start = oracle.current.clone();

        let outcome = Strategy::CoordinateDescent(CoordinateDescentParams::default())
            .run(&mut session, &mut oracle, &start)
            .unwrap();
        let best = outcome.best.unwrap();
        assert_eq!(best.dimensions()[3].as_str(), "B");
        assert_eq!(best.dimensions()[0].as_str(), "C");
    }

    #[test]
    fn unpinned_measure_is_never_moved_out_of_last_position() {
        let mut oracle =
            FixtureOracle::new(&["A", "B", "C", "D", "M"]).with_string_dimension("M");
        let mut session = session_for(&oracle, MidpointRule::Floor);
        baseline(&mut session, &mut oracle);
        let start = oracle.current.clone();

        let params = CoordinateDescentParams {
            pin_non_numeric_measure: false,
            ..CoordinateDescentParams::default()
        };
        let outcome = Strategy::CoordinateDescent(params)
            .run(&mut session, &mut oracle, &start)
            .unwrap();

        // Visits 4, 0, 3 (capped at ceil(5/2)); position 4 has no legal swap.
        assert_eq!(outcome.positions, vec![4, 0, 3]);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.arrangement.last().as_str() == "M"));
        // Position 0: B, C, D. Position 3: two of the three left in the pool.
        assert_eq!(outcome.results.len(), 5);
    }

    #[test]
    fn string_dimension_never_enters_last_position() {
        let mut oracle = FixtureOracle::new(&["A", "S", "C", "D", "M"])
            .with_string_dimension("S");
        let mut session = session_for(&oracle, MidpointRule::Floor);
        baseline(&mut session, &mut oracle);
        let start = oracle.current.clone();

        let outcome = Strategy::CoordinateDescent(CoordinateDescentParams::default())
            .run(&mut session, &mut oracle, &start)
            .unwrap();

        // M is numeric here, so position 4 is visited; S is skipped there.
        assert_eq!(outcome.positions[0], 4);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.arrangement.last().as_str() != "S"));
    }

    #[test]
    fn fast_mode_visits_at_most_two_positions() {
        let names = ["A", "B", "C", "D", "E", "F", "G", "H"];
        let mut oracle = FixtureOracle::new(&names);
        let mut session = session_for(&oracle, MidpointRule::Ceil);
        baseline(&mut session, &mut oracle);
        let start = oracle.current.clone();

        let outcome = Strategy::CoordinateDescent(CoordinateDescentParams::fast())
            .run(&mut session, &mut oracle, &start)
            .unwrap();
        assert_eq!(outcome.positions, vec![7, 0]);
        assert_eq!(outcome.results.len(), 7 + 6);
    }

    #[test]
    fn visited_positions_never_exceed_half_rounded_up() {
        for n in 2..9usize {
            for rule in [MidpointRule::Floor, MidpointRule::Ceil] {
                let names: Vec<String> = (0..n).map(|i| format!("D{i}")).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                let mut oracle = FixtureOracle::new(&refs);
                let mut session = session_for(&oracle, rule);
                baseline(&mut session, &mut oracle);
                let start = oracle.current.clone();

                let outcome = Strategy::CoordinateDescent(CoordinateDescentParams::default())
                    .run(&mut session, &mut oracle, &start)
                    .unwrap();
                assert!(outcome.positions.len() <= n.div_ceil(2), "n={n} rule={rule:?}");
                assert!(!outcome.positions.contains(&rule.midpoint(n)));
                assert!(outcome.best.unwrap().is_permutation_of(&start));
            }
        }
    }

    #[test]
    fn excluded_dimension_stays_in_place() {
        let mut oracle = FixtureOracle::new(&["A", "B", "C", "D", "E", "F"]);
        let mut session = session_for(&oracle, MidpointRule::Floor);
        baseline(&mut session, &mut oracle);
        let start = oracle.current.clone();

        let params = CoordinateDescentParams::default().with_excluded("F");
        let outcome = Strategy::CoordinateDescent(params)
            .run(&mut session, &mut oracle, &start)
            .unwrap();

        assert_eq!(outcome.positions[0], 5);
        for result in &outcome.results {
            assert_eq!(result.arrangement.last().as_str(), "F");
        }
    }
}
