use anyhow::Result;
use ar_optimizer::ThreadSleeper;
use ar_sandbox::{run_with_restore, SandboxSettings};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = SandboxSettings::from_env()?;
    let mut cube = settings.load_cube()?;
    let config = settings.load_config(&cube)?;

    let outcome = run_with_restore(&mut cube, config, &settings.options, ThreadSleeper)?;

    match outcome.report.selected() {
        Some(selected) => info!(
            sequence_id = selected.sequence_id,
            arrangement = %selected.arrangement,
            memory_gib = selected.memory_gib(),
            "balanced arrangement found"
        ),
        None => info!("no balanced arrangement, pick one manually from the report"),
    }
    info!(
        csv = %outcome.csv_path.display(),
        json = %outcome.json_path.display(),
        in_effect = %outcome.final_arrangement,
        "sandbox session complete"
    );
    Ok(())
}
