//! Scheduler configuration.
//!
//! Every field carries a serde default so a host can embed a partial
//! `[scheduler]` table in its own TOML file and only override what it needs.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

fn default_interval_ticks() -> u64 {
    120
}

fn default_max_entries_per_node() -> usize {
    8
}

fn default_max_depth() -> u8 {
    10
}

fn default_min_node_size() -> f64 {
    1.0
}

fn default_grid_cell_size() -> f64 {
    16.0
}

fn default_window() -> usize {
    20
}

fn default_min_samples() -> usize {
    10
}

fn default_time_weight() -> f64 {
    0.6
}

fn default_very_expensive_ms() -> f64 {
    10.0
}

fn default_speed_up_threshold() -> f64 {
    0.3
}

fn default_slow_down_threshold() -> f64 {
    0.7
}

fn default_min_multiplier() -> f64 {
    0.5
}

fn default_max_multiplier() -> f64 {
    3.0
}

fn default_speed_up_factor() -> f64 {
    0.9
}

fn default_slow_down_factor() -> f64 {
    1.2
}

/// Top-level scheduler configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Spatial index settings
    #[serde(default)]
    pub spatial: SpatialSettings,
    /// Target cache settings
    #[serde(default)]
    pub cache: CacheSettings,
    /// Adaptive interval controller settings
    #[serde(default)]
    pub profiler: ProfilerSettings,
}

/// Which structure backs each spatial index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialBackend {
    /// Lazily split quadtree
    #[default]
    QuadTree,
    /// Uniform grid of square cells
    Grid,
}

/// Spatial index configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialSettings {
    /// Backend used for every index
    #[serde(default)]
    pub backend: SpatialBackend,
    /// Entries a quadtree node holds before splitting
    #[serde(default = "default_max_entries_per_node")]
    pub max_entries_per_node: usize,
    /// Maximum quadtree depth
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,
    /// Nodes narrower than this never split
    #[serde(default = "default_min_node_size")]
    pub min_node_size: f64,
    /// Cell edge length for the grid backend
    #[serde(default = "default_grid_cell_size")]
    pub grid_cell_size: f64,
}

impl Default for SpatialSettings {
    fn default() -> Self {
        Self {
            backend: SpatialBackend::default(),
            max_entries_per_node: default_max_entries_per_node(),
            max_depth: default_max_depth(),
            min_node_size: default_min_node_size(),
            grid_cell_size: default_grid_cell_size(),
        }
    }
}

/// Target cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Refresh interval, in ticks, for categories that were never registered
    #[serde(default = "default_interval_ticks")]
    pub default_interval_ticks: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_interval_ticks: default_interval_ticks(),
        }
    }
}

/// Adaptive interval controller configuration.
///
/// The success weight is `1 - time_weight`, so the two weights always sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerSettings {
    /// Ring buffer capacity for recent samples
    #[serde(default = "default_window")]
    pub window: usize,
    /// Samples required before the interval is adjusted
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Weight of the execution-time term
    #[serde(default = "default_time_weight")]
    pub time_weight: f64,
    /// Average execution time, in milliseconds, that normalises to 1.0
    #[serde(default = "default_very_expensive_ms")]
    pub very_expensive_ms: f64,
    /// Scores below this shorten the interval
    #[serde(default = "default_speed_up_threshold")]
    pub speed_up_threshold: f64,
    /// Scores above this lengthen the interval
    #[serde(default = "default_slow_down_threshold")]
    pub slow_down_threshold: f64,
    /// Lower bound on `current / base`
    #[serde(default = "default_min_multiplier")]
    pub min_multiplier: f64,
    /// Upper bound on `current / base`
    #[serde(default = "default_max_multiplier")]
    pub max_multiplier: f64,
    /// Applied to the multiplier when speeding up
    #[serde(default = "default_speed_up_factor")]
    pub speed_up_factor: f64,
    /// Applied to the multiplier when slowing down
    #[serde(default = "default_slow_down_factor")]
    pub slow_down_factor: f64,
}

impl ProfilerSettings {
    pub fn success_weight(&self) -> f64 {
        1.0 - self.time_weight
    }
}

impl Default for ProfilerSettings {
    fn default() -> Self {
        Self {
            window: default_window(),
            min_samples: default_min_samples(),
            time_weight: default_time_weight(),
            very_expensive_ms: default_very_expensive_ms(),
            speed_up_threshold: default_speed_up_threshold(),
            slow_down_threshold: default_slow_down_threshold(),
            min_multiplier: default_min_multiplier(),
            max_multiplier: default_max_multiplier(),
            speed_up_factor: default_speed_up_factor(),
            slow_down_factor: default_slow_down_factor(),
        }
    }
}

impl SchedulerConfig {
    /// Validates the configuration for consistency.
    ///
    /// # Returns
    ///
    /// `Ok(())` if every section is usable, or the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.spatial.validate()?;
        self.profiler.validate()
    }
}

impl SpatialSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries_per_node == 0 {
            return Err(ConfigError::InvalidSpatial {
                field: "max_entries_per_node",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.min_node_size > 0.0) {
            return Err(ConfigError::InvalidSpatial {
                field: "min_node_size",
                reason: format!("must be positive, got {}", self.min_node_size),
            });
        }
        if !(self.grid_cell_size > 0.0) {
            return Err(ConfigError::InvalidSpatial {
                field: "grid_cell_size",
                reason: format!("must be positive, got {}", self.grid_cell_size),
            });
        }
        Ok(())
    }
}

impl ProfilerSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.time_weight) {
            return Err(ConfigError::InvalidTimeWeight(self.time_weight));
        }
        let lower = self.speed_up_threshold;
        let upper = self.slow_down_threshold;
        if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) || lower >= upper {
            return Err(ConfigError::InvalidHysteresisBand { lower, upper });
        }
        let (min, max) = (self.min_multiplier, self.max_multiplier);
        if !(min > 0.0 && min <= 1.0 && max >= 1.0) {
            return Err(ConfigError::InvalidMultiplierRange { min, max });
        }
        let (speed_up, slow_down) = (self.speed_up_factor, self.slow_down_factor);
        if !(speed_up > 0.0 && speed_up < 1.0 && slow_down > 1.0) {
            return Err(ConfigError::InvalidAdjustFactors {
                speed_up,
                slow_down,
            });
        }
        if !(self.very_expensive_ms > 0.0) {
            return Err(ConfigError::InvalidExpensiveThreshold(self.very_expensive_ms));
        }
        if self.window == 0 || self.window < self.min_samples {
            return Err(ConfigError::InvalidWindow {
                window: self.window,
                min_samples: self.min_samples,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.default_interval_ticks, 120);
        assert_eq!(config.spatial.backend, SpatialBackend::QuadTree);
        assert!((config.profiler.time_weight + config.profiler.success_weight() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverted_band_rejected() {
        let mut config = SchedulerConfig::default();
        config.profiler.speed_up_threshold = 0.8;
        config.profiler.slow_down_threshold = 0.2;

        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidHysteresisBand {
                lower: 0.8,
                upper: 0.2
            })
        );
    }

    #[test]
    fn test_multiplier_range_must_include_one() {
        let mut config = SchedulerConfig::default();
        config.profiler.min_multiplier = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMultiplierRange { .. })
        ));

        config.profiler.min_multiplier = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_smaller_than_min_samples_rejected() {
        let mut config = SchedulerConfig::default();
        config.profiler.window = 5;
        config.profiler.min_samples = 10;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidWindow {
                window: 5,
                min_samples: 10
            })
        );
    }

    #[test]
    fn test_non_positive_cell_size_rejected() {
        let mut config = SchedulerConfig::default();
        config.spatial.grid_cell_size = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSpatial {
                field: "grid_cell_size",
                ..
            })
        ));
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: SchedulerConfig = serde_json::from_str(
            r#"{ "spatial": { "backend": "grid" }, "profiler": { "min_samples": 4 } }"#,
        )
        .expect("partial config should deserialize");

        assert_eq!(config.spatial.backend, SpatialBackend::Grid);
        assert_eq!(config.spatial.max_entries_per_node, 8);
        assert_eq!(config.profiler.min_samples, 4);
        assert_eq!(config.profiler.window, 20);
        assert_eq!(config.cache.default_interval_ticks, 120);
    }
}
