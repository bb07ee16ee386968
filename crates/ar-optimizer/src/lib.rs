//! # ar-optimizer
//!
//! Storage-order search for Arranger.
//!
//! Drives an [`Oracle`] through a session of search strategies (coordinate
//! descent, hill climbing, sparsity ordering, random sampling and positional
//! build), chains memory readings through a result store, and picks the
//! arrangement that best balances memory footprint against query latency.

mod config;
mod oracle;
mod report;
mod retry;
mod run;
mod selector;
mod session;
mod store;
mod strategy;

#[cfg(test)]
mod fixtures;

pub use config::{MidpointRule, SessionConfig};
pub use oracle::{is_numeric_only, ElementKind, Oracle, ProcessRun, ProcessStatus};
pub use report::{ReportRow, SessionReport};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, ThreadSleeper};
pub use run::{execution_plan, run_session, SessionFailure};
pub use selector::{mark_selected, select_balanced, Selection, BALANCE_THRESHOLDS};
pub use session::{Session, SessionId};
pub use store::{MemoryReading, ResultStore};
pub use strategy::{
    visit_order, CoordinateDescentParams, HillClimbingParams, RandomSamplingParams, Strategy,
    StrategyOutcome,
};
