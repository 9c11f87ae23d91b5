/// Spatial partitioning registry
///
/// Owns one index per (partition, entity kind). Indices are created lazily
/// on first insert using the bounds the partition was registered with.
use super::{BackendIndex, IndexStats, SpatialEntry, SpatialIndex};
use crate::config::{SpatialBackend, SpatialSettings};
use crate::types::{Bounds, EntityKind, PartitionId, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

struct PartitionIndices<E> {
    bounds: Bounds,
    indices: HashMap<EntityKind, BackendIndex<E>>,
}

/// Main spatial partitioning system
pub struct SpatialRegistry<E> {
    settings: SpatialSettings,
    partitions: HashMap<PartitionId, PartitionIndices<E>>,
}

/// Statistics for one (partition, kind) index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionIndexStats {
    pub partition: PartitionId,
    pub kind: EntityKind,
    pub backend: SpatialBackend,
    pub index: IndexStats,
}

impl<E: Clone> SpatialRegistry<E> {
    pub fn new(settings: SpatialSettings) -> Self {
        Self {
            settings,
            partitions: HashMap::new(),
        }
    }

    /// Declares a partition and the area its indices cover.
    ///
    /// Re-registering with different bounds drops the partition's existing
    /// indices, since their node layout no longer matches.
    pub fn register_partition(&mut self, partition: PartitionId, bounds: Bounds) {
        match self.partitions.get_mut(&partition) {
            Some(existing) if existing.bounds == bounds => {}
            Some(existing) => {
                debug!(%partition, ?bounds, "partition bounds changed; dropping spatial indices");
                existing.bounds = bounds;
                existing.indices.clear();
            }
            None => {
                if bounds.is_degenerate() {
                    debug!(%partition, ?bounds, "registered degenerate partition; its indices will stay empty");
                }
                self.partitions.insert(
                    partition,
                    PartitionIndices {
                        bounds,
                        indices: HashMap::new(),
                    },
                );
            }
        }
    }

    pub fn is_registered(&self, partition: PartitionId) -> bool {
        self.partitions.contains_key(&partition)
    }

    pub fn partition_bounds(&self, partition: PartitionId) -> Option<Bounds> {
        self.partitions.get(&partition).map(|indices| indices.bounds)
    }

    fn index_mut(&mut self, partition: PartitionId, kind: &EntityKind) -> Option<&mut BackendIndex<E>> {
        let settings = &self.settings;
        let indices = self.partitions.get_mut(&partition)?;
        let bounds = indices.bounds;
        Some(
            indices
                .indices
                .entry(kind.clone())
                .or_insert_with(|| BackendIndex::new(bounds, settings)),
        )
    }

    /// Inserts one entry. Returns `false` for an unregistered partition or an
    /// out-of-bounds entry.
    pub fn insert(&mut self, partition: PartitionId, kind: &EntityKind, entry: SpatialEntry<E>) -> bool {
        match self.index_mut(partition, kind) {
            Some(index) => index.insert_entry(entry),
            None => {
                trace!(%partition, %kind, "insert into unregistered partition ignored");
                false
            }
        }
    }

    /// Clears the (partition, kind) index and repopulates it.
    ///
    /// # Returns
    ///
    /// The number of entries accepted.
    pub fn rebuild<I>(&mut self, partition: PartitionId, kind: &EntityKind, entries: I) -> usize
    where
        I: IntoIterator<Item = SpatialEntry<E>>,
    {
        let Some(index) = self.index_mut(partition, kind) else {
            trace!(%partition, %kind, "rebuild of unregistered partition ignored");
            return 0;
        };

        index.clear();
        let mut accepted = 0;
        for entry in entries {
            if index.insert_entry(entry) {
                accepted += 1;
            }
        }

        trace!(%partition, %kind, accepted, "spatial index rebuilt");
        accepted
    }

    /// Handles of `kind` within `radius` of `center`. Unknown partitions and
    /// kinds yield an empty list.
    pub fn query_radius(
        &mut self,
        partition: PartitionId,
        kind: &EntityKind,
        center: Position,
        radius: f64,
    ) -> Vec<E> {
        self.partitions
            .get_mut(&partition)
            .and_then(|indices| indices.indices.get_mut(kind))
            .map(|index| index.query_radius(center, radius))
            .unwrap_or_default()
    }

    /// Number of entries in the (partition, kind) index.
    pub fn len(&self, partition: PartitionId, kind: &EntityKind) -> usize {
        self.partitions
            .get(&partition)
            .and_then(|indices| indices.indices.get(kind))
            .map_or(0, |index| index.len())
    }

    /// Drops the partition and all of its indices. Returns whether anything
    /// was removed.
    pub fn clear_partition(&mut self, partition: PartitionId) -> bool {
        self.partitions.remove(&partition).is_some()
    }

    pub fn clear_all(&mut self) {
        self.partitions.clear();
    }

    /// Gets the number of registered partitions
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Per-index statistics, ordered by partition then kind.
    pub fn stats(&self) -> Vec<PartitionIndexStats> {
        let mut stats: Vec<PartitionIndexStats> = self
            .partitions
            .iter()
            .flat_map(|(partition, indices)| {
                indices.indices.iter().map(move |(kind, index)| PartitionIndexStats {
                    partition: *partition,
                    kind: kind.clone(),
                    backend: index.backend(),
                    index: index.stats(),
                })
            })
            .collect();
        stats.sort_by(|a, b| (a.partition, &a.kind).cmp(&(b.partition, &b.kind)));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOD: EntityKind = EntityKind::new("food");
    const WALLS: EntityKind = EntityKind::new("walls");

    fn registry() -> SpatialRegistry<u32> {
        let mut registry = SpatialRegistry::new(SpatialSettings::default());
        registry.register_partition(PartitionId(1), Bounds::from_size(100.0, 100.0));
        registry
    }

    #[test]
    fn test_unregistered_partition_is_empty() {
        let mut registry = registry();
        assert!(!registry.insert(PartitionId(9), &FOOD, SpatialEntry::new(1, Position::new(1.0, 1.0))));
        assert!(registry
            .query_radius(PartitionId(9), &FOOD, Position::new(1.0, 1.0), 10.0)
            .is_empty());
    }

    #[test]
    fn test_kinds_are_isolated() {
        let mut registry = registry();
        registry.insert(PartitionId(1), &FOOD, SpatialEntry::new(1, Position::new(10.0, 10.0)));
        registry.insert(PartitionId(1), &WALLS, SpatialEntry::new(2, Position::new(10.0, 10.0)));

        let food = registry.query_radius(PartitionId(1), &FOOD, Position::new(10.0, 10.0), 1.0);
        assert_eq!(food, vec![1]);
        assert_eq!(registry.len(PartitionId(1), &WALLS), 1);
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let mut registry = registry();
        registry.insert(PartitionId(1), &FOOD, SpatialEntry::new(1, Position::new(10.0, 10.0)));

        let accepted = registry.rebuild(
            PartitionId(1),
            &FOOD,
            vec![
                SpatialEntry::new(2, Position::new(20.0, 20.0)),
                SpatialEntry::new(3, Position::new(500.0, 20.0)),
            ],
        );

        assert_eq!(accepted, 1);
        assert_eq!(registry.len(PartitionId(1), &FOOD), 1);
        assert!(registry
            .query_radius(PartitionId(1), &FOOD, Position::new(10.0, 10.0), 1.0)
            .is_empty());
    }

    #[test]
    fn test_reregistering_with_new_bounds_drops_indices() {
        let mut registry = registry();
        registry.insert(PartitionId(1), &FOOD, SpatialEntry::new(1, Position::new(10.0, 10.0)));

        registry.register_partition(PartitionId(1), Bounds::from_size(100.0, 100.0));
        assert_eq!(registry.len(PartitionId(1), &FOOD), 1);

        registry.register_partition(PartitionId(1), Bounds::from_size(200.0, 200.0));
        assert_eq!(registry.len(PartitionId(1), &FOOD), 0);
        assert_eq!(registry.partition_bounds(PartitionId(1)), Some(Bounds::from_size(200.0, 200.0)));
    }

    #[test]
    fn test_clear_partition_is_idempotent() {
        let mut registry = registry();
        registry.insert(PartitionId(1), &FOOD, SpatialEntry::new(1, Position::new(10.0, 10.0)));

        assert!(registry.clear_partition(PartitionId(1)));
        assert!(!registry.clear_partition(PartitionId(1)));
        assert_eq!(registry.partition_count(), 0);
        assert!(registry.stats().is_empty());
    }

    #[test]
    fn test_stats_are_sorted() {
        let mut registry = registry();
        registry.register_partition(PartitionId(0), Bounds::from_size(10.0, 10.0));
        registry.insert(PartitionId(1), &WALLS, SpatialEntry::new(1, Position::new(1.0, 1.0)));
        registry.insert(PartitionId(1), &FOOD, SpatialEntry::new(2, Position::new(1.0, 1.0)));
        registry.insert(PartitionId(0), &FOOD, SpatialEntry::new(3, Position::new(1.0, 1.0)));

        let keys: Vec<(u32, String)> = registry
            .stats()
            .into_iter()
            .map(|s| (s.partition.0, s.kind.to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (0, "food".to_string()),
                (1, "food".to_string()),
                (1, "walls".to_string())
            ]
        );
    }
}
