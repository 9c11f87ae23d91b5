//! JSON run report.

use crate::sim::{RunOutcome, SimTotals};
use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use tracing::info;
use work_scheduler::Diagnostics;

/// Everything worth keeping from a finished run.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub seed: u64,
    pub ticks_run: u64,
    pub interrupted: bool,
    pub totals: &'a SimTotals,
    pub scheduler: Diagnostics,
}

impl<'a> RunReport<'a> {
    pub fn new(seed: u64, outcome: RunOutcome, totals: &'a SimTotals, scheduler: Diagnostics) -> Self {
        Self {
            seed,
            ticks_run: outcome.ticks_run,
            interrupted: outcome.interrupted,
            totals,
            scheduler,
        }
    }

    pub async fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::sim::Simulation;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_report_round_trips_through_disk() {
        let mut config = AppConfig::default();
        config.simulation.agents_per_partition = 4;
        config.simulation.targets_per_kind = 6;
        let mut sim = Simulation::new(&config).unwrap();
        for _ in 0..5 {
            sim.step();
        }

        let outcome = RunOutcome {
            ticks_run: 5,
            interrupted: false,
        };
        let report = RunReport::new(config.simulation.seed, outcome, sim.totals(), sim.diagnostics());

        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_to(&path).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["seed"], 42);
        assert_eq!(value["ticks_run"], 5);
        assert_eq!(value["scheduler"]["tick"], 5);
        assert!(value["totals"]["assignments"].is_object());
        assert_eq!(value["scheduler"]["categories"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_write_to_missing_directory_fails() {
        let totals = SimTotals::default();
        let sim = Simulation::new(&AppConfig::default()).unwrap();
        let report = RunReport::new(1, RunOutcome { ticks_run: 0, interrupted: true }, &totals, sim.diagnostics());

        let dir = tempdir().unwrap();
        let result = report.write_to(&dir.path().join("missing").join("report.json")).await;
        assert!(result.is_err());
    }
}
