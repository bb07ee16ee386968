//! Sandbox session runner.
//!
//! Wraps a session with the cube restoration contract: the storage order
//! and monitoring setting in effect before the run are put back afterwards,
//! whether the session succeeded or not. Report artifacts are written in
//! both cases.

use anyhow::{bail, Context, Result};
use ar_optimizer::{
    run_session, CoordinateDescentParams, HillClimbingParams, Oracle, RandomSamplingParams,
    RetryPolicy, SessionConfig, SessionReport, Sleeper, Strategy,
};
use ar_types::Arrangement;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cube::{SimulatedCube, SimulatedCubeConfig};

/// How a sandbox run is set up, usually read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxSettings {
    /// Session config JSON; the demo session when absent.
    pub config_path: Option<PathBuf>,
    /// Simulated cube JSON; the demo cube when absent.
    pub cube_path: Option<PathBuf>,
    pub options: RunOptions,
}

/// What happens around the session itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub results_dir: PathBuf,
    /// Keep the selected arrangement applied instead of restoring the
    /// original one after a successful run.
    pub apply_best: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            apply_best: false,
        }
    }
}

/// A finished sandbox run.
#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    pub report: SessionReport,
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
    /// Arrangement left in effect on the cube.
    pub final_arrangement: Arrangement,
}

impl SandboxSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let apply_best = match lookup("ARRANGER_APPLY_BEST") {
            Some(value) => parse_flag(&value).context("ARRANGER_APPLY_BEST")?,
            None => false,
        };
        Ok(Self {
            config_path: lookup("ARRANGER_CONFIG").map(PathBuf::from),
            cube_path: lookup("ARRANGER_CUBE").map(PathBuf::from),
            options: RunOptions {
                results_dir: lookup("ARRANGER_RESULTS")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("results")),
                apply_best,
            },
        })
    }

    pub fn load_cube(&self) -> Result<SimulatedCube> {
        let cube = match &self.cube_path {
            Some(path) => SimulatedCube::from_json_file(path)
                .with_context(|| format!("loading cube from {}", path.display()))?,
            None => SimulatedCube::new(SimulatedCubeConfig::demo())?,
        };
        Ok(cube)
    }

    pub fn load_config(&self, cube: &SimulatedCube) -> Result<SessionConfig> {
        match &self.config_path {
            Some(path) => SessionConfig::from_json_file(path)
                .with_context(|| format!("loading session config from {}", path.display())),
            None => Ok(demo_config(cube.name())),
        }
    }
}

/// Accepts `true`/`t`/`false`/`f` in any case.
pub fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" => Ok(true),
        "false" | "f" => Ok(false),
        other => bail!("expected true/t/false/f, got '{other}'"),
    }
}

/// Session exercising every strategy with short budgets.
pub fn demo_config(cube_name: &str) -> SessionConfig {
    SessionConfig::new(cube_name, "Default")
        .with_process("Load Actuals")
        .with_repetitions(5)
        .with_seed(7)
        .with_retry(RetryPolicy::new(4, Duration::from_secs(1)))
        .with_strategy(Strategy::Sparsity)
        .with_strategy(Strategy::RandomSampling(RandomSamplingParams {
            max_count: 20,
            ..RandomSamplingParams::default()
        }))
        .with_strategy(Strategy::HillClimbing(HillClimbingParams { max_iterations: 30 }))
        .with_strategy(Strategy::PositionalBuild)
        .with_strategy(Strategy::CoordinateDescent(CoordinateDescentParams::default()))
}

/// Run one session against `cube` and honour the restoration contract.
///
/// On failure the partial report is still written before the session error
/// is returned.
pub fn run_with_restore<S: Sleeper>(
    cube: &mut SimulatedCube,
    config: SessionConfig,
    options: &RunOptions,
    sleeper: S,
) -> Result<SandboxOutcome> {
    let original = cube.current_arrangement()?;
    let monitoring_before = cube.set_monitoring(true);
    info!(cube = %cube.name(), original = %original, "captured original arrangement");

    let outcome = run_session(config, cube, sleeper);
    let report = match &outcome {
        Ok(report) => report,
        Err(failure) => &failure.report,
    };

    let target = match report.selected() {
        Some(selected) if options.apply_best && outcome.is_ok() => selected.arrangement.clone(),
        _ => original.clone(),
    };
    let restored = restore(cube, &target, monitoring_before);

    let artifacts = write_artifacts(report, &options.results_dir);
    let (csv_path, json_path) = match (artifacts, &outcome) {
        (Ok(paths), _) => paths,
        (Err(e), Ok(_)) => return Err(e),
        (Err(e), Err(_)) => {
            // The session error below is the one worth reporting.
            warn!(error = %e, "failed to write partial report");
            Default::default()
        }
    };

    let report = outcome.map_err(anyhow::Error::new)?;
    restored?;
    Ok(SandboxOutcome {
        report,
        csv_path,
        json_path,
        final_arrangement: target,
    })
}

fn restore(cube: &mut SimulatedCube, target: &Arrangement, monitoring: bool) -> Result<()> {
    let applied = if cube.current_arrangement()? == *target {
        Ok(())
    } else {
        cube.apply_and_get_memory_delta(target)
            .map(|_| ())
            .with_context(|| format!("restoring arrangement {target}"))
    };
    cube.set_monitoring(monitoring);
    match &applied {
        Ok(()) => info!(arrangement = %target, "arrangement in effect after session"),
        Err(e) => error!(error = %e, "failed to restore arrangement"),
    }
    applied
}

fn write_artifacts(report: &SessionReport, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let base = dir.join(&report.name);
    let csv_path = base.join(format!("{}.csv", report.session_id));
    let json_path = base.join(format!("{}.json", report.session_id));
    report.write_csv(&csv_path)?;
    report.write_json(&json_path)?;
    Ok((csv_path, json_path))
}
