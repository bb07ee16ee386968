//! Session driver: baseline, strategies, selection.

use ar_types::{ArError, ArResult};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::oracle::Oracle;
use crate::report::SessionReport;
use crate::retry::Sleeper;
use crate::selector::{mark_selected, select_balanced, Selection};
use crate::session::Session;
use crate::strategy::Strategy;

/// A session that stopped on a fatal error.
///
/// `report` holds every result recorded before the failure so the caller
/// can restore the cube and still write artifacts.
#[derive(Debug)]
pub struct SessionFailure {
    pub report: SessionReport,
    pub error: ArError,
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "session '{}' failed after {} evaluations: {}",
            self.report.name,
            self.report.results.len(),
            self.error
        )
    }
}

impl std::error::Error for SessionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Strategies in the order a session runs them: the baseline first, then
/// the configured strategies from most to least likely to spike memory.
pub fn execution_plan(config: &SessionConfig) -> Vec<Strategy> {
    let mut configured: Vec<Strategy> = config
        .strategies
        .iter()
        .filter(|s| !matches!(s, Strategy::Baseline))
        .cloned()
        .collect();
    configured.sort_by_key(Strategy::memory_risk_rank);

    let mut plan = Vec::with_capacity(configured.len() + 1);
    plan.push(Strategy::Baseline);
    plan.extend(configured);
    plan
}

/// Run a complete optimization session against `oracle`.
///
/// Every strategy starts from the arrangement in effect when the session
/// began. The oracle is left with whatever arrangement was evaluated last;
/// restoring the cube is the caller's job.
pub fn run_session<O, S>(
    config: SessionConfig,
    oracle: &mut O,
    sleeper: S,
) -> Result<SessionReport, SessionFailure>
where
    O: Oracle + ?Sized,
    S: Sleeper,
{
    let started_at = Utc::now();

    let start = match oracle.current_arrangement() {
        Ok(start) => start,
        Err(e) => return Err(not_started(&config, started_at, e.into())),
    };
    let mut session = match Session::with_sleeper(config.clone(), start.clone(), sleeper) {
        Ok(session) => session,
        Err(e) => return Err(not_started(&config, started_at, e)),
    };

    info!(
        session = %session.id(),
        cube = %config.name,
        start = %start,
        "starting optimization session"
    );

    let outcome = drive(&mut session, oracle);
    let session_id = session.id();
    let selection = outcome.as_ref().copied().unwrap_or(Selection::NoneFound);
    let report = SessionReport {
        session_id,
        name: config.name,
        process: config.process,
        statistic: config.statistic,
        results: session.into_store().into_results(),
        selection,
        started_at,
        finished_at: Utc::now(),
    };

    match outcome {
        Ok(_) => {
            info!(
                session = %session_id,
                evaluations = report.results.len(),
                selected = ?report.selection.sequence_id(),
                "optimization session finished"
            );
            Ok(report)
        }
        Err(error) => {
            error!(
                session = %session_id,
                evaluations = report.results.len(),
                error = %error,
                "optimization session failed"
            );
            Err(SessionFailure { report, error })
        }
    }
}

fn drive<O, S>(session: &mut Session<S>, oracle: &mut O) -> ArResult<Selection>
where
    O: Oracle + ?Sized,
    S: Sleeper,
{
    session.store_mut().reset_sequence()?;
    let start = session.dimensions().clone();

    for strategy in execution_plan(session.config()) {
        strategy.run(session, oracle, &start)?;
    }

    let selection = select_balanced(session.results(), session.config().statistic)?;
    mark_selected(session.store_mut().results_mut(), &selection);
    Ok(selection)
}

fn not_started(config: &SessionConfig, started_at: DateTime<Utc>, error: ArError) -> SessionFailure {
    SessionFailure {
        report: SessionReport {
            session_id: Uuid::new_v4(),
            name: config.name.clone(),
            process: config.process.clone(),
            statistic: config.statistic,
            results: Vec::new(),
            selection: Selection::NoneFound,
            started_at,
            finished_at: Utc::now(),
        },
        error,
    }
}
