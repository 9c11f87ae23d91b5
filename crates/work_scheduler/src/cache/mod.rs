//! Time-to-live caches keyed by world partition.
//!
//! - [`RegionTargetCache`] keeps one candidate list per (partition, work tag)
//!   and rebuilds it when its age reaches the category's current interval.
//! - [`ReachabilityCache`] memoises per-(agent, target) validity checks and is
//!   wiped whenever the matching candidate list is rebuilt.
//!
//! Entries never expire on their own. Staleness is decided by the caller from
//! the interval it passes in, and teardown is always explicit.

mod reachability;
mod region;

pub use reachability::{ReachabilityCache, ReachabilityStats};
pub use region::{RegionTargetCache, Refresh, RefreshKind, TargetCacheStats};

use crate::types::Tick;

/// A cached value and the tick it was last written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub last_update_tick: Tick,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, last_update_tick: Tick) -> Self {
        Self {
            value,
            last_update_tick,
        }
    }

    /// Ticks elapsed since the last write.
    #[inline]
    pub fn age(&self, current_tick: Tick) -> Tick {
        current_tick.saturating_sub(self.last_update_tick)
    }

    /// Whether the entry's age has reached `interval`. An entry written in
    /// the "future" (the host clock was reset) is always stale.
    #[inline]
    pub fn is_stale(&self, current_tick: Tick, interval: Tick) -> bool {
        current_tick < self.last_update_tick || self.age(current_tick) >= interval
    }
}
