/// Lazily split quadtree for radius queries over one partition.
///
/// Nodes hold up to `max_entries` entries, then split into four equal
/// quadrants and push their entries down. Entries whose footprint straddles a
/// quadrant boundary stay at the parent, so internal nodes may carry entries.
use super::{is_usable_radius, IndexStats, SpatialEntry, SpatialIndex};
use crate::types::{Bounds, Position};
use serde::{Deserialize, Serialize};

/// Default maximum depth for quadtree subdivision
pub const DEFAULT_MAX_DEPTH: u8 = 10;
/// Default number of entries per node before subdivision
pub const DEFAULT_MAX_ENTRIES: usize = 8;
/// Default minimum node edge, prevents endless subdivision of stacked entries
pub const DEFAULT_MIN_NODE_SIZE: f64 = 1.0;

/// Subdivision limits for a [`QuadTree`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeLimits {
    pub max_entries: usize,
    pub max_depth: u8,
    pub min_node_size: f64,
}

impl Default for TreeLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_depth: DEFAULT_MAX_DEPTH,
            min_node_size: DEFAULT_MIN_NODE_SIZE,
        }
    }
}

/// A node in the quadtree
#[derive(Debug)]
pub struct QuadTreeNode<E> {
    /// Area covered by this node
    pub bounds: Bounds,
    /// Entries stored at this node (straddlers when the node has children)
    pub entries: Vec<SpatialEntry<E>>,
    /// Child nodes (NW, NE, SW, SE) - None if leaf
    pub children: Option<Box<[QuadTreeNode<E>; 4]>>,
    /// Current depth in tree
    pub depth: u8,
}

impl<E> QuadTreeNode<E> {
    pub fn new(bounds: Bounds, depth: u8) -> Self {
        Self {
            bounds,
            entries: Vec::new(),
            children: None,
            depth,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Inserts an entry known to lie inside this node.
    fn insert(&mut self, entry: SpatialEntry<E>, limits: &TreeLimits) {
        if let Some(children) = &mut self.children {
            match children
                .iter_mut()
                .find(|child| child.bounds.contains_footprint(entry.position, entry.extent))
            {
                Some(child) => child.insert(entry, limits),
                None => self.entries.push(entry),
            }
            return;
        }

        self.entries.push(entry);
        if self.entries.len() > limits.max_entries
            && self.depth < limits.max_depth
            && self.can_subdivide(limits)
        {
            self.subdivide(limits);
        }
    }

    fn can_subdivide(&self, limits: &TreeLimits) -> bool {
        self.bounds.width() / 2.0 >= limits.min_node_size
            && self.bounds.height() / 2.0 >= limits.min_node_size
    }

    /// Splits this leaf into 4 children and redistributes its entries.
    fn subdivide(&mut self, limits: &TreeLimits) {
        let child_depth = self.depth + 1;
        let [nw, ne, sw, se] = self.bounds.quadrants();
        self.children = Some(Box::new([
            QuadTreeNode::new(nw, child_depth),
            QuadTreeNode::new(ne, child_depth),
            QuadTreeNode::new(sw, child_depth),
            QuadTreeNode::new(se, child_depth),
        ]));

        let entries = std::mem::take(&mut self.entries);
        for entry in entries {
            self.insert(entry, limits);
        }
    }

    fn query(&self, center: Position, radius: f64, radius_sq: f64, results: &mut Vec<E>)
    where
        E: Clone,
    {
        if !self.bounds.intersects_circle(center, radius) {
            return;
        }

        for entry in &self.entries {
            if entry.position.distance_squared(center) <= radius_sq {
                results.push(entry.handle.clone());
            }
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(center, radius, radius_sq, results);
            }
        }
    }

    /// Gets statistics about this subtree
    pub fn get_stats(&self) -> NodeStats {
        let mut stats = NodeStats {
            total_entries: self.entries.len(),
            max_depth: self.depth,
            leaf_nodes: 0,
            internal_nodes: 0,
        };

        match &self.children {
            None => stats.leaf_nodes = 1,
            Some(children) => {
                stats.internal_nodes = 1;
                for child in children.iter() {
                    let child_stats = child.get_stats();
                    stats.total_entries += child_stats.total_entries;
                    stats.max_depth = stats.max_depth.max(child_stats.max_depth);
                    stats.leaf_nodes += child_stats.leaf_nodes;
                    stats.internal_nodes += child_stats.internal_nodes;
                }
            }
        }

        stats
    }
}

/// Shape of a (sub)tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    pub total_entries: usize,
    pub max_depth: u8,
    pub leaf_nodes: usize,
    pub internal_nodes: usize,
}

/// Quadtree over a fixed rectangle.
#[derive(Debug)]
pub struct QuadTree<E> {
    root: QuadTreeNode<E>,
    limits: TreeLimits,
    len: usize,
    stats: IndexStats,
}

impl<E: Clone> QuadTree<E> {
    /// Creates an empty tree with default limits.
    pub fn new(bounds: Bounds) -> Self {
        Self::with_limits(bounds, TreeLimits::default())
    }

    pub fn with_limits(bounds: Bounds, limits: TreeLimits) -> Self {
        Self {
            root: QuadTreeNode::new(bounds, 0),
            limits: TreeLimits {
                max_entries: limits.max_entries.max(1),
                ..limits
            },
            len: 0,
            stats: IndexStats::default(),
        }
    }

    pub fn root(&self) -> &QuadTreeNode<E> {
        &self.root
    }

    /// Gets detailed tree structure statistics
    pub fn node_stats(&self) -> NodeStats {
        self.root.get_stats()
    }
}

impl<E: Clone> SpatialIndex<E> for QuadTree<E> {
    fn bounds(&self) -> Bounds {
        self.root.bounds
    }

    fn insert_entry(&mut self, entry: SpatialEntry<E>) -> bool {
        if self.root.bounds.is_degenerate() || !self.root.bounds.contains(entry.position) {
            self.stats.rejected_insertions += 1;
            return false;
        }

        self.root.insert(entry, &self.limits);
        self.len += 1;
        self.stats.total_insertions += 1;
        true
    }

    fn clear(&mut self) {
        self.root = QuadTreeNode::new(self.root.bounds, 0);
        self.len = 0;
        self.stats.total_clears += 1;
    }

    fn query_radius(&mut self, center: Position, radius: f64) -> Vec<E> {
        self.stats.total_queries += 1;
        let mut results = Vec::new();
        if self.len > 0 && is_usable_radius(radius) {
            self.root.query(center, radius, radius * radius, &mut results);
        }
        self.stats.last_query_result_count = results.len();
        results
    }

    fn len(&self) -> usize {
        self.len
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.len,
            ..self.stats.clone()
        }
    }
}
