//! Configuration management for the simulation driver.
//!
//! This module handles loading and validation of the driver configuration
//! from TOML files. The `[scheduler]` table is passed straight through to
//! the scheduler library.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use work_scheduler::SchedulerConfig;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// World and loop settings
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Scheduler settings, see [`SchedulerConfig`]
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_ticks() -> u64 {
    600
}

fn default_seed() -> u64 {
    42
}

fn default_partitions() -> u32 {
    2
}

fn default_world_size() -> f64 {
    250.0
}

fn default_agents_per_partition() -> u32 {
    40
}

fn default_targets_per_kind() -> u32 {
    60
}

fn default_index_rebuild_every() -> u64 {
    10
}

fn default_walls_per_partition() -> u32 {
    4
}

fn default_stockpiles_per_partition() -> u32 {
    3
}

fn default_agent_speed() -> f64 {
    2.0
}

fn default_haul_search_radius() -> f64 {
    80.0
}

/// World generation and tick loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Ticks to simulate before exiting
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Ticks per second (0 to run unpaced)
    #[serde(default)]
    pub tick_rate_hz: u32,
    /// World generation seed
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of independent partitions (maps)
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    #[serde(default = "default_world_size")]
    pub world_width: f64,
    #[serde(default = "default_world_size")]
    pub world_height: f64,
    #[serde(default = "default_agents_per_partition")]
    pub agents_per_partition: u32,
    /// Live targets kept per (partition, kind)
    #[serde(default = "default_targets_per_kind")]
    pub targets_per_kind: u32,
    /// Spatial indices are rebuilt every this many ticks
    #[serde(default = "default_index_rebuild_every")]
    pub index_rebuild_every: u64,
    /// Rectangular obstacles per partition
    #[serde(default = "default_walls_per_partition")]
    pub walls_per_partition: u32,
    /// Haul drop-off points per partition
    #[serde(default = "default_stockpiles_per_partition")]
    pub stockpiles_per_partition: u32,
    /// Distance an agent covers per tick
    #[serde(default = "default_agent_speed")]
    pub agent_speed: f64,
    /// Radius searched for a stockpile around a hauled item
    #[serde(default = "default_haul_search_radius")]
    pub haul_search_radius: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            tick_rate_hz: 0,
            seed: default_seed(),
            partitions: default_partitions(),
            world_width: default_world_size(),
            world_height: default_world_size(),
            agents_per_partition: default_agents_per_partition(),
            targets_per_kind: default_targets_per_kind(),
            index_rebuild_every: default_index_rebuild_every(),
            walls_per_partition: default_walls_per_partition(),
            stockpiles_per_partition: default_stockpiles_per_partition(),
            agent_speed: default_agent_speed(),
            haul_search_radius: default_haul_search_radius(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to the
    /// path and returns it.
    pub async fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let config: AppConfig =
                toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("writing default config to {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        let sim = &self.simulation;

        if sim.partitions == 0 {
            return Err("At least one partition is required".to_string());
        }
        if !(sim.world_width > 0.0 && sim.world_height > 0.0) {
            return Err(format!(
                "World size must be positive, got {}x{}",
                sim.world_width, sim.world_height
            ));
        }
        if sim.index_rebuild_every == 0 {
            return Err("index_rebuild_every must be at least 1".to_string());
        }
        if !(sim.agent_speed > 0.0) {
            return Err(format!("agent_speed must be positive, got {}", sim.agent_speed));
        }
        if !(sim.haul_search_radius > 0.0) {
            return Err(format!(
                "haul_search_radius must be positive, got {}",
                sim.haul_search_radius
            ));
        }

        self.scheduler
            .validate()
            .map_err(|e| format!("Invalid scheduler settings: {e}"))?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};
    use work_scheduler::SpatialBackend;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.simulation.ticks, 600);
        assert_eq!(config.simulation.tick_rate_hz, 0);
        assert_eq!(config.simulation.partitions, 2);
        assert_eq!(config.simulation.index_rebuild_every, 10);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("worksim.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        // The written file loads back to the same configuration
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn test_load_partial_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(
            file.path(),
            r#"
[simulation]
ticks = 50
seed = 7

[scheduler.spatial]
backend = "grid"

[scheduler.profiler]
min_samples = 5

[logging]
level = "debug"
"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load_from_file(&file.path().to_path_buf()).await.unwrap();

        assert_eq!(config.simulation.ticks, 50);
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.simulation.agents_per_partition, 40);
        assert_eq!(config.scheduler.spatial.backend, SpatialBackend::Grid);
        assert_eq!(config.scheduler.profiler.min_samples, 5);
        assert_eq!(config.scheduler.cache.default_interval_ticks, 120);
        assert_eq!(config.logging.level, "debug");
    }

    #[tokio::test]
    async fn test_load_malformed_file_fails() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), "[simulation\nticks = ").await.unwrap();

        let result = AppConfig::load_from_file(&file.path().to_path_buf()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();

        let result = config.validate();
        assert!(result.unwrap_err().contains("Invalid log level"));
    }

    #[test]
    fn test_validation_rejects_empty_world() {
        let mut config = AppConfig::default();
        config.simulation.partitions = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.simulation.world_width = 0.0;
        assert!(config.validate().unwrap_err().contains("World size"));

        let mut config = AppConfig::default();
        config.simulation.index_rebuild_every = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_surfaces_scheduler_errors() {
        let mut config = AppConfig::default();
        config.scheduler.profiler.min_multiplier = 2.0;

        let result = config.validate();
        assert!(result.unwrap_err().contains("Invalid scheduler settings"));
    }
}
