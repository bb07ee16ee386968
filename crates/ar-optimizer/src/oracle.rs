//! Evaluation oracle abstraction.
//!
//! An oracle applies storage arrangements to a live cube and reports what
//! they cost. Implementations may talk to a real server or simulate a cube
//! locally. Every call may mutate the target system, so the engine only ever
//! drives one oracle call at a time.

use ar_types::{Arrangement, Dimension, OracleResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Kind of a dimension member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Numeric,
    String,
    Consolidated,
}

/// Completion status of one side-workload run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Completed,
    CompletedWithMessages,
    Aborted,
    Failed(String),
}

impl ProcessStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessStatus::Completed)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Completed => write!(f, "Completed"),
            ProcessStatus::CompletedWithMessages => write!(f, "CompletedWithMessages"),
            ProcessStatus::Aborted => write!(f, "Aborted"),
            ProcessStatus::Failed(reason) => write!(f, "Failed: {reason}"),
        }
    }
}

/// One timed run of a side workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRun {
    pub duration: Duration,
    pub status: ProcessStatus,
}

/// Core oracle interface consumed by the search strategies.
pub trait Oracle {
    /// Storage arrangement currently in effect on the target.
    fn current_arrangement(&self) -> OracleResult<Arrangement>;

    /// Reorder the target's storage to `arrangement` and return the
    /// percentage change in memory footprint relative to the arrangement
    /// previously in effect.
    fn apply_and_get_memory_delta(&mut self, arrangement: &Arrangement) -> OracleResult<f64>;

    /// Absolute memory footprint in bytes. `Ok(None)` (or a zero reading)
    /// means the monitoring subsystem has not populated the value yet.
    fn measure_memory_absolute(&mut self) -> OracleResult<Option<f64>>;

    /// Run `query` `repetitions` times sequentially, returning per-run
    /// wall-clock durations in execution order.
    fn measure_latency(&mut self, query: &str, repetitions: usize) -> OracleResult<Vec<Duration>>;

    /// Run the named side workload `repetitions` times.
    fn measure_process(&mut self, process: &str, repetitions: usize)
        -> OracleResult<Vec<ProcessRun>>;

    /// Number of leaf members of `dimension`.
    fn leaf_count(&self, dimension: &Dimension) -> OracleResult<usize>;

    /// Fraction in `[0, 1]` of `dimension`'s leaves that are populated when
    /// every dimension in `others` is pinned to its default member.
    fn sparsity_ratio(&self, dimension: &Dimension, others: &[Dimension]) -> OracleResult<f64>;

    /// Kind of every member of `dimension`.
    fn element_kinds(&self, dimension: &Dimension) -> OracleResult<BTreeMap<String, ElementKind>>;
}

/// True when every non-consolidated member of `dimension` is numeric.
pub fn is_numeric_only<O: Oracle + ?Sized>(oracle: &O, dimension: &Dimension) -> OracleResult<bool> {
    let kinds = oracle.element_kinds(dimension)?;
    Ok(kinds
        .values()
        .filter(|kind| **kind != ElementKind::Consolidated)
        .all(|kind| *kind == ElementKind::Numeric))
}
