//! Spatial indexing for proximity queries
//!
//! This module provides the structures answering "which entities lie within
//! radius R of point P" without scanning the whole population. Indices hold
//! non-owning handles with the position they had when indexed; a handle that
//! has since been destroyed or moved is returned as-is and must be
//! re-validated by the caller.

mod grid;
mod partition;
mod quadtree;

pub use grid::{GridCell, UniformGrid};
pub use partition::{PartitionIndexStats, SpatialRegistry};
pub use quadtree::{NodeStats, QuadTree, QuadTreeNode, TreeLimits};

use crate::config::{SpatialBackend, SpatialSettings};
use crate::types::{Bounds, Position};
use serde::{Deserialize, Serialize};

/// One indexed entity: a handle plus its last-known position.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialEntry<E> {
    /// Non-owning handle to the entity
    pub handle: E,
    /// Position at indexing time
    pub position: Position,
    /// Half-size of the entity footprint; 0 for point entities
    pub extent: f64,
}

impl<E> SpatialEntry<E> {
    /// Creates a point entry.
    pub fn new(handle: E, position: Position) -> Self {
        Self {
            handle,
            position,
            extent: 0.0,
        }
    }

    /// Creates an entry occupying a square footprint around `position`.
    pub fn with_extent(handle: E, position: Position, extent: f64) -> Self {
        Self {
            handle,
            position,
            extent: extent.max(0.0),
        }
    }
}

/// Counters shared by every index backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub entries: usize,
    pub total_insertions: u64,
    pub rejected_insertions: u64,
    pub total_queries: u64,
    pub total_clears: u64,
    pub last_query_result_count: usize,
}

/// Contract shared by the quadtree and grid backends.
pub trait SpatialIndex<E: Clone> {
    /// Area covered by the index.
    fn bounds(&self) -> Bounds;

    /// Inserts an entry. Returns `false` when the entry lies outside the
    /// index bounds (or the bounds are degenerate) and was not stored.
    fn insert_entry(&mut self, entry: SpatialEntry<E>) -> bool;

    /// Inserts a point entity.
    fn insert(&mut self, handle: E, position: Position) -> bool {
        self.insert_entry(SpatialEntry::new(handle, position))
    }

    /// Removes every entry, keeping the bounds.
    fn clear(&mut self);

    /// Handles whose indexed position lies within `radius` of `center`.
    /// A zero or negative radius matches nothing.
    fn query_radius(&mut self, center: Position, radius: f64) -> Vec<E>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> IndexStats;
}

/// Index selected by [`SpatialBackend`].
#[derive(Debug)]
pub enum BackendIndex<E> {
    QuadTree(QuadTree<E>),
    Grid(UniformGrid<E>),
}

impl<E: Clone> BackendIndex<E> {
    /// Builds an empty index of the configured backend over `bounds`.
    pub fn new(bounds: Bounds, settings: &SpatialSettings) -> Self {
        match settings.backend {
            SpatialBackend::QuadTree => Self::QuadTree(QuadTree::with_limits(
                bounds,
                TreeLimits {
                    max_entries: settings.max_entries_per_node,
                    max_depth: settings.max_depth,
                    min_node_size: settings.min_node_size,
                },
            )),
            SpatialBackend::Grid => Self::Grid(UniformGrid::new(bounds, settings.grid_cell_size)),
        }
    }

    pub fn backend(&self) -> SpatialBackend {
        match self {
            Self::QuadTree(_) => SpatialBackend::QuadTree,
            Self::Grid(_) => SpatialBackend::Grid,
        }
    }
}

impl<E: Clone> SpatialIndex<E> for BackendIndex<E> {
    fn bounds(&self) -> Bounds {
        match self {
            Self::QuadTree(tree) => tree.bounds(),
            Self::Grid(grid) => grid.bounds(),
        }
    }

    fn insert_entry(&mut self, entry: SpatialEntry<E>) -> bool {
        match self {
            Self::QuadTree(tree) => tree.insert_entry(entry),
            Self::Grid(grid) => grid.insert_entry(entry),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::QuadTree(tree) => tree.clear(),
            Self::Grid(grid) => grid.clear(),
        }
    }

    fn query_radius(&mut self, center: Position, radius: f64) -> Vec<E> {
        match self {
            Self::QuadTree(tree) => tree.query_radius(center, radius),
            Self::Grid(grid) => grid.query_radius(center, radius),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::QuadTree(tree) => tree.len(),
            Self::Grid(grid) => grid.len(),
        }
    }

    fn stats(&self) -> IndexStats {
        match self {
            Self::QuadTree(tree) => tree.stats(),
            Self::Grid(grid) => grid.stats(),
        }
    }
}

/// Whether a query radius can match anything at all.
#[inline]
pub(crate) fn is_usable_radius(radius: f64) -> bool {
    radius > 0.0 && !radius.is_nan()
}
