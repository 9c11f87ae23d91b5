//! Error types for the scheduler.
//!
//! "Not found" is never an error here: missing partitions, unknown
//! categories and empty candidate sets are all represented in-band by empty
//! lists and `None`. The types below cover the two remaining failure classes,
//! a category failing to enumerate its candidates and invalid configuration.

use crate::types::WorkTag;

/// Failure raised by a category's candidate builder.
///
/// The target cache catches it, logs it and keeps serving the previous list.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// The builder could not reach the data it enumerates
    #[error("candidate source unavailable: {0}")]
    SourceUnavailable(String),

    /// The builder gave up for a category-specific reason
    #[error("candidate enumeration failed: {0}")]
    Failed(String),

    /// The builder panicked; the payload message is kept when it was a string
    #[error("candidate builder for '{tag}' panicked: {message}")]
    Panicked { tag: WorkTag, message: String },
}

/// Rejected [`SchedulerConfig`](crate::SchedulerConfig) values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("score weights must be within [0, 1], got time_weight = {0}")]
    InvalidTimeWeight(f64),

    #[error("speed_up_threshold ({lower}) must be below slow_down_threshold ({upper}) and both within [0, 1]")]
    InvalidHysteresisBand { lower: f64, upper: f64 },

    #[error("interval multipliers must satisfy 0 < min ({min}) <= 1 <= max ({max})")]
    InvalidMultiplierRange { min: f64, max: f64 },

    #[error("speed_up_factor ({speed_up}) must be in (0, 1) and slow_down_factor ({slow_down}) must be > 1")]
    InvalidAdjustFactors { speed_up: f64, slow_down: f64 },

    #[error("very_expensive_ms must be positive, got {0}")]
    InvalidExpensiveThreshold(f64),

    #[error("profiling window ({window}) must hold at least min_samples ({min_samples}) samples and be non-zero")]
    InvalidWindow { window: usize, min_samples: usize },

    #[error("spatial setting '{field}' is invalid: {reason}")]
    InvalidSpatial { field: &'static str, reason: String },
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
