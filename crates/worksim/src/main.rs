//! Headless colony simulation driving the work scheduler.
//!
//! Generates a seeded world, runs it for a fixed number of ticks (or until
//! SIGINT/SIGTERM), logs a summary and optionally writes a JSON report.

mod categories;
mod cli;
mod config;
mod logging;
mod report;
mod signals;
mod sim;
mod world;

use anyhow::anyhow;
use cli::CliArgs;
use config::AppConfig;
use report::RunReport;
use sim::Simulation;
use tokio::sync::watch;
use tracing::{error, info};

/// Applies CLI overrides on top of the file configuration.
fn apply_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(ticks) = args.ticks {
        config.simulation.ticks = ticks;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load_from_file(&args.config_path).await?;
    apply_overrides(&mut config, &args);
    config
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;

    logging::setup_logging(&config.logging, args.json_logs)?;

    info!(
        config = %args.config_path.display(),
        ticks = config.simulation.ticks,
        seed = config.simulation.seed,
        backend = ?config.scheduler.spatial.backend,
        "starting worksim"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = signals::wait_for_shutdown().await {
            error!("Signal handler failed: {e}");
        }
        let _ = shutdown_tx.send(true);
    });

    let mut simulation = Simulation::new(&config)?;
    let outcome = simulation.run(shutdown_rx).await;
    simulation.log_summary();

    if let Some(path) = &args.report_path {
        RunReport::new(config.simulation.seed, outcome, simulation.totals(), simulation.diagnostics())
            .write_to(path)
            .await?;
    }

    simulation.shutdown();
    info!("worksim exited cleanly");
    Ok(())
}
