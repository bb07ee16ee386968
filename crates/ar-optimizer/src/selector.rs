//! Post-hoc choice of the best-balanced arrangement.

use ar_types::{ArResult, EvaluationResult, LatencyStatistic};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Relative tolerances above each metric's minimum, tried in order.
pub const BALANCE_THRESHOLDS: [f64; 9] = [0.01, 0.025, 0.05, 0.075, 0.1, 0.125, 0.15, 0.2, 0.25];

/// Outcome of the balance sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    /// First result within `threshold` of both minima.
    Balanced { sequence_id: u64, threshold: f64 },
    /// No result is close enough to both minima; pick manually.
    NoneFound,
}

impl Selection {
    pub fn sequence_id(&self) -> Option<u64> {
        match self {
            Selection::Balanced { sequence_id, .. } => Some(*sequence_id),
            Selection::NoneFound => None,
        }
    }
}

/// Sweep [`BALANCE_THRESHOLDS`] and return the first result, in result
/// order, whose memory and primary latency both lie within the threshold's
/// share of their range above the minimum.
pub fn select_balanced(
    results: &[EvaluationResult],
    statistic: LatencyStatistic,
) -> ArResult<Selection> {
    if results.is_empty() {
        return Ok(Selection::NoneFound);
    }

    let mut points = Vec::with_capacity(results.len());
    for result in results {
        points.push((result.memory_bytes, result.primary_latency(statistic)?));
    }

    let (min_ram, max_ram) = bounds(points.iter().map(|p| p.0));
    let (min_latency, max_latency) = bounds(points.iter().map(|p| p.1));

    for threshold in BALANCE_THRESHOLDS {
        let ram_limit = min_ram + threshold * (max_ram - min_ram);
        let latency_limit = min_latency + threshold * (max_latency - min_latency);
        if let Some(i) = points
            .iter()
            .position(|(ram, latency)| *ram <= ram_limit && *latency <= latency_limit)
        {
            let sequence_id = results[i].sequence_id;
            info!(sequence_id, threshold, "selected balanced arrangement");
            return Ok(Selection::Balanced {
                sequence_id,
                threshold,
            });
        }
    }

    info!("no arrangement balances memory and latency, pick manually from the report");
    Ok(Selection::NoneFound)
}

/// Flag the selected result and clear the flag everywhere else.
pub fn mark_selected(results: &mut [EvaluationResult], selection: &Selection) {
    let chosen = selection.sequence_id();
    for result in results.iter_mut() {
        result.is_selected = Some(result.sequence_id) == chosen;
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}
