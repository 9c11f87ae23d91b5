use super::CacheEntry;
use crate::error::{panic_message, BuildError};
use crate::types::{PartitionId, Tick, WorkTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// How a [`RegionTargetCache::get_or_refresh`] call was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Entry was fresh; the builder did not run
    Cached,
    /// Builder ran and its list replaced the entry
    Rebuilt,
    /// Builder ran and failed; the previous list (or an empty one) was kept
    Failed,
}

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub struct Refresh<E> {
    /// The candidate list. Shared, read-only until the next rebuild.
    pub targets: Arc<[E]>,
    pub kind: RefreshKind,
}

impl<E> Refresh<E> {
    /// Whether the builder ran during this call.
    pub fn builder_ran(&self) -> bool {
        self.kind != RefreshKind::Cached
    }
}

/// Counters for the target cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetCacheStats {
    /// Live (partition, tag) entries
    pub entries: usize,
    pub hits: u64,
    pub refreshes: u64,
    pub builder_failures: u64,
}

/// Per-partition cache of candidate target lists, one per work tag.
///
/// The cache never caps list sizes and never deduplicates builder calls;
/// both are the builder's responsibility.
pub struct RegionTargetCache<E> {
    entries: HashMap<PartitionId, HashMap<WorkTag, CacheEntry<Arc<[E]>>>>,
    stats: TargetCacheStats,
}

impl<E> Default for RegionTargetCache<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: TargetCacheStats::default(),
        }
    }
}

impl<E> RegionTargetCache<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached list for (partition, tag), rebuilding it first when
    /// `current_tick - last_update_tick >= interval`.
    ///
    /// A failing builder (an `Err` or a panic) is logged and the previous list
    /// is served again, or an empty list on a first call. The entry is still
    /// stamped with `current_tick`, so the builder is retried after another
    /// full interval instead of on every request.
    pub fn get_or_refresh<B>(
        &mut self,
        partition: PartitionId,
        tag: &WorkTag,
        current_tick: Tick,
        interval: Tick,
        builder: B,
    ) -> Refresh<E>
    where
        B: FnOnce() -> Result<Vec<E>, BuildError>,
    {
        let by_tag = self.entries.entry(partition).or_default();

        if let Some(entry) = by_tag.get(tag) {
            if !entry.is_stale(current_tick, interval) {
                self.stats.hits += 1;
                return Refresh {
                    targets: Arc::clone(&entry.value),
                    kind: RefreshKind::Cached,
                };
            }
        }

        let outcome = match catch_unwind(AssertUnwindSafe(builder)) {
            Ok(result) => result,
            Err(payload) => Err(BuildError::Panicked {
                tag: tag.clone(),
                message: panic_message(payload.as_ref()),
            }),
        };

        let (targets, kind) = match outcome {
            Ok(list) => {
                self.stats.refreshes += 1;
                debug!(%partition, %tag, count = list.len(), current_tick, interval, "target list rebuilt");
                (Arc::from(list), RefreshKind::Rebuilt)
            }
            Err(error) => {
                self.stats.builder_failures += 1;
                warn!(%partition, %tag, %error, "candidate builder failed; serving previous list");
                let previous = by_tag
                    .get(tag)
                    .map(|entry| Arc::clone(&entry.value))
                    .unwrap_or_else(|| Arc::from(Vec::new()));
                (previous, RefreshKind::Failed)
            }
        };

        by_tag.insert(tag.clone(), CacheEntry::new(Arc::clone(&targets), current_tick));
        Refresh { targets, kind }
    }

    /// Looks at an entry without refreshing it.
    pub fn peek(&self, partition: PartitionId, tag: &WorkTag) -> Option<&CacheEntry<Arc<[E]>>> {
        self.entries.get(&partition)?.get(tag)
    }

    /// Forces the next lookup of (partition, tag) to rebuild.
    pub fn invalidate(&mut self, partition: PartitionId, tag: &WorkTag) -> bool {
        self.entries
            .get_mut(&partition)
            .is_some_and(|by_tag| by_tag.remove(tag).is_some())
    }

    /// Drops every entry of the partition. Returns whether anything was removed.
    pub fn clear_partition(&mut self, partition: PartitionId) -> bool {
        self.entries
            .remove(&partition)
            .is_some_and(|by_tag| !by_tag.is_empty())
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    /// Number of live (partition, tag) entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> TargetCacheStats {
        TargetCacheStats {
            entries: self.len(),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const FEED: WorkTag = WorkTag::new("feed");
    const MAP: PartitionId = PartitionId(1);

    #[test]
    fn test_same_list_within_interval() {
        let mut cache = RegionTargetCache::new();
        let calls = Cell::new(0);
        let builder = || {
            calls.set(calls.get() + 1);
            Ok(vec![1, 2, 3])
        };

        let first = cache.get_or_refresh(MAP, &FEED, 0, 10, builder);
        let second = cache.get_or_refresh(MAP, &FEED, 9, 10, builder);

        assert_eq!(first.kind, RefreshKind::Rebuilt);
        assert_eq!(second.kind, RefreshKind::Cached);
        assert!(Arc::ptr_eq(&first.targets, &second.targets));
        assert_eq!(calls.get(), 1);

        let third = cache.get_or_refresh(MAP, &FEED, 10, 10, builder);
        assert_eq!(third.kind, RefreshKind::Rebuilt);
        assert!(!Arc::ptr_eq(&first.targets, &third.targets));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_builder_error_keeps_previous_list() {
        let mut cache = RegionTargetCache::new();
        let first = cache.get_or_refresh(MAP, &FEED, 0, 5, || Ok(vec![7]));

        let failed = cache.get_or_refresh(MAP, &FEED, 5, 5, || {
            Err(BuildError::SourceUnavailable("map unloading".to_string()))
        });

        assert_eq!(failed.kind, RefreshKind::Failed);
        assert!(Arc::ptr_eq(&first.targets, &failed.targets));
        assert_eq!(cache.stats().builder_failures, 1);
        // Stamped: the failing builder is not retried until the interval passes again
        assert_eq!(cache.peek(MAP, &FEED).map(|e| e.last_update_tick), Some(5));
    }

    #[test]
    fn test_builder_panic_on_first_call_yields_empty_list() {
        let mut cache: RegionTargetCache<u32> = RegionTargetCache::new();

        let refresh = cache.get_or_refresh(MAP, &FEED, 0, 5, || panic!("bad category"));

        assert_eq!(refresh.kind, RefreshKind::Failed);
        assert!(refresh.targets.is_empty());
        assert_eq!(cache.stats().builder_failures, 1);
    }

    #[test]
    fn test_partitions_do_not_share_entries() {
        let mut cache = RegionTargetCache::new();
        cache.get_or_refresh(PartitionId(1), &FEED, 0, 100, || Ok(vec![1]));
        let other = cache.get_or_refresh(PartitionId(2), &FEED, 0, 100, || Ok(vec![2]));

        assert_eq!(&*other.targets, &[2]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_forces_rebuild() {
        let mut cache = RegionTargetCache::new();
        cache.get_or_refresh(MAP, &FEED, 0, 100, || Ok(vec![1]));

        assert!(cache.invalidate(MAP, &FEED));
        assert!(!cache.invalidate(MAP, &FEED));

        let refresh = cache.get_or_refresh(MAP, &FEED, 1, 100, || Ok(vec![2]));
        assert_eq!(refresh.kind, RefreshKind::Rebuilt);
        assert_eq!(&*refresh.targets, &[2]);
    }

    #[test]
    fn test_clear_partition_twice() {
        let mut cache = RegionTargetCache::new();
        cache.get_or_refresh(MAP, &FEED, 0, 100, || Ok(vec![1]));

        assert!(cache.clear_partition(MAP));
        assert!(!cache.clear_partition(MAP));
        assert!(cache.is_empty());
        assert!(cache.peek(MAP, &FEED).is_none());
    }
}
