//! # Work Scheduler
//!
//! Adaptive target selection for large populations of agents in a tick-based
//! 2D world. Each tick, agents ask for work in some category ("feed",
//! "haul", ...) and the scheduler answers with a nearby valid target without
//! re-scanning the whole world.
//!
//! ## Core Features
//!
//! - **Spatial Indexing**: Per-partition quadtree or uniform grid for radius queries
//! - **Target Caching**: One candidate list per (partition, category), rebuilt on a time-to-live
//! - **Reachability Memo**: Expensive per-(agent, target) checks run once per rebuild
//! - **Distance Tiers**: Nearest-band-first search that stops at the first valid candidate
//! - **Adaptive Intervals**: Refresh intervals follow each category's measured cost and success
//! - **Diagnostics**: Serialisable snapshot of every cache, index and category
//!
//! ## Architecture Overview
//!
//! Everything is owned by one [`SchedulerContext`], keyed by [`PartitionId`]
//! at the outer level. Tearing down a partition is one call to
//! [`SchedulerContext::clear_partition`].
//!
//! ### Spatial (`spatial`)
//! [`SpatialRegistry`] holds one [`SpatialIndex`] per (partition,
//! [`EntityKind`]). Indices are rebuilt by the host, never updated in place.
//!
//! ### Caches (`cache`)
//! [`RegionTargetCache`] and [`ReachabilityCache`]. Entries carry the tick
//! they were written and only expire when the caller's interval says so.
//!
//! ### Selection (`bucket`)
//! [`create_buckets`] and [`find_first_valid`] pick "some valid target in the
//! nearest non-empty distance band".
//!
//! ### Profiling (`profiler`)
//! [`AdaptiveIntervalController`] scores each category and scales its refresh
//! interval inside configured bounds.
//!
//! ## Quick Start Example
//!
//! ```rust
//! use work_scheduler::*;
//!
//! let mut scheduler: SchedulerContext<u32> =
//!     SchedulerContext::new(SchedulerConfig::default()).expect("valid config");
//! let feed = WorkTag::new("feed");
//! let map = PartitionId(0);
//!
//! scheduler.register_category_for_auto_optimization(feed.clone(), 120);
//!
//! let food = [(1u32, Position::new(40.0, 0.0)), (2, Position::new(5.0, 0.0))];
//! let agent = AgentContext::new(AgentId(7), Position::default(), Some(map));
//! let distance = |from: Position, id: &u32| {
//!     food.iter()
//!         .find(|(food_id, _)| food_id == id)
//!         .map_or(f64::INFINITY, |(_, pos)| from.distance_squared(*pos))
//! };
//!
//! let target = scheduler.find_target(
//!     TaskRequest {
//!         partition: map,
//!         tag: &feed,
//!         agent: &agent,
//!         thresholds: &[100.0, 2_500.0],
//!         distance_sq: &distance,
//!     },
//!     || Ok(food.iter().map(|(id, _)| *id).collect()),
//!     |_, _| true,
//! );
//!
//! assert_eq!(target, Some(2));
//! ```

pub mod bucket;
pub mod cache;
pub mod category;
pub mod config;
pub mod context;
pub mod error;
pub mod profiler;
pub mod spatial;
pub mod types;

pub use bucket::{
    create_buckets, find_first_valid, find_first_valid_with_tier, BucketSet, SearchOutcome, Tier, TierMatch,
};
pub use cache::{
    CacheEntry, ReachabilityCache, ReachabilityStats, RegionTargetCache, Refresh, RefreshKind, TargetCacheStats,
};
pub use category::WorkCategory;
pub use config::{CacheSettings, ProfilerSettings, SchedulerConfig, SpatialBackend, SpatialSettings};
pub use context::{Diagnostics, SchedulerContext, SelectionStats, TaskRequest};
pub use error::{BuildError, ConfigError};
pub use profiler::{AdaptiveIntervalController, CategoryReport, IntervalState, PerformanceRecord, RecordSummary};
pub use spatial::{
    BackendIndex, IndexStats, PartitionIndexStats, QuadTree, SpatialEntry, SpatialIndex, SpatialRegistry,
    UniformGrid,
};
pub use types::{AgentContext, AgentId, Bounds, EntityKind, PartitionId, Position, Tick, WorkTag};
