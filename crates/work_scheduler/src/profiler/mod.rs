//! # Adaptive Interval Profiler
//!
//! Measures each work category's scheduling passes and tunes how often its
//! candidate list is rebuilt.
//!
//! ## Score
//!
//! ```text
//! score = time_weight    * clamp(avg_ms / very_expensive_ms, 0, 1)
//!       + success_weight * (1 - success_rate)
//! ```
//!
//! Both averages are taken over a fixed window of recent samples. Nothing is
//! adjusted until the window holds `min_samples` samples.
//!
//! ## Hysteresis
//!
//! | Score                        | Multiplier                            |
//! |------------------------------|---------------------------------------|
//! | `> slow_down_threshold`      | `*= slow_down_factor`, capped at max  |
//! | `< speed_up_threshold`       | `*= speed_up_factor`, floored at min  |
//! | otherwise                    | unchanged                             |
//!
//! The interval handed to the target cache is `base * multiplier`, rounded.

mod controller;
mod record;

pub use controller::{AdaptiveIntervalController, CategoryReport, IntervalState};
pub use record::{PerformanceRecord, RecordSummary, RollingWindow};
