//! # ar-sandbox
//!
//! Simulated cube and sandbox driver for Arranger.
//!
//! Runs complete optimization sessions against an in-process cube with a
//! deterministic cost model. Useful for strategy development and for
//! exercising the restoration contract without a live server.

mod cube;
mod runner;

pub use cube::{DimensionSpec, ProcessFailure, SimulatedCube, SimulatedCubeConfig};
pub use runner::{
    demo_config, parse_flag, run_with_restore, RunOptions, SandboxOutcome, SandboxSettings,
};
