use super::CacheEntry;
use crate::types::{AgentId, PartitionId, Tick, WorkTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

/// Counters for the reachability memo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReachabilityStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub clears: u64,
}

type AgentTargetMap<E> = HashMap<(AgentId, E), CacheEntry<bool>>;

/// Memo of (agent, target) validity results.
///
/// Nothing in here expires by age. Entries live until their (partition, tag)
/// is cleared, which happens whenever the matching candidate list rebuilds.
pub struct ReachabilityCache<E> {
    entries: HashMap<PartitionId, HashMap<WorkTag, AgentTargetMap<E>>>,
    stats: ReachabilityStats,
}

impl<E> Default for ReachabilityCache<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            stats: ReachabilityStats::default(),
        }
    }
}

impl<E: Clone + Eq + Hash> ReachabilityCache<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoised result, or `None` if this pair was never checked
    /// since the last clear.
    pub fn get(&mut self, partition: PartitionId, tag: &WorkTag, agent: AgentId, target: &E) -> Option<bool> {
        let found = self
            .entries
            .get(&partition)
            .and_then(|by_tag| by_tag.get(tag))
            .and_then(|pairs| pairs.get(&(agent, target.clone())))
            .map(|entry| entry.value);

        match found {
            Some(_) => self.stats.hits += 1,
            None => self.stats.misses += 1,
        }
        found
    }

    /// Records a validity result. Overwrites any previous value.
    pub fn set(&mut self, partition: PartitionId, tag: &WorkTag, agent: AgentId, target: E, reachable: bool, tick: Tick) {
        self.entries
            .entry(partition)
            .or_default()
            .entry(tag.clone())
            .or_default()
            .insert((agent, target), CacheEntry::new(reachable, tick));
    }

    /// Drops every memoised result of the partition, across all tags.
    pub fn clear(&mut self, partition: PartitionId) -> bool {
        let removed = self.entries.remove(&partition).is_some();
        if removed {
            self.stats.clears += 1;
            trace!(%partition, "reachability cleared");
        }
        removed
    }

    /// Drops the memoised results of one tag within a partition.
    pub fn clear_category(&mut self, partition: PartitionId, tag: &WorkTag) -> bool {
        let removed = self
            .entries
            .get_mut(&partition)
            .is_some_and(|by_tag| by_tag.remove(tag).is_some());
        if removed {
            self.stats.clears += 1;
            trace!(%partition, %tag, "reachability cleared for category");
        }
        removed
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.stats.clears += 1;
    }

    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(HashMap::values)
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ReachabilityStats {
        ReachabilityStats {
            entries: self.len(),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: WorkTag = WorkTag::new("feed");
    const HAUL: WorkTag = WorkTag::new("haul");

    #[test]
    fn test_set_then_get() {
        let mut cache = ReachabilityCache::new();
        assert_eq!(cache.get(PartitionId(1), &FEED, AgentId(1), &10u32), None);

        cache.set(PartitionId(1), &FEED, AgentId(1), 10, false, 3);
        assert_eq!(cache.get(PartitionId(1), &FEED, AgentId(1), &10), Some(false));
        // Different agent, same target
        assert_eq!(cache.get(PartitionId(1), &FEED, AgentId(2), &10), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_clear_category_leaves_other_tags() {
        let mut cache = ReachabilityCache::new();
        cache.set(PartitionId(1), &FEED, AgentId(1), 10u32, true, 0);
        cache.set(PartitionId(1), &HAUL, AgentId(1), 10, true, 0);

        assert!(cache.clear_category(PartitionId(1), &FEED));
        assert_eq!(cache.get(PartitionId(1), &FEED, AgentId(1), &10), None);
        assert_eq!(cache.get(PartitionId(1), &HAUL, AgentId(1), &10), Some(true));
    }

    #[test]
    fn test_clear_partition_is_idempotent() {
        let mut cache = ReachabilityCache::new();
        cache.set(PartitionId(1), &FEED, AgentId(1), 10u32, true, 0);
        cache.set(PartitionId(2), &FEED, AgentId(1), 10, true, 0);

        assert!(cache.clear(PartitionId(1)));
        assert!(!cache.clear(PartitionId(1)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(PartitionId(2), &FEED, AgentId(1), &10), Some(true));
    }
}
