//! # Core Type Definitions
//!
//! This module contains the fundamental types shared by every part of the
//! scheduler: identifiers for partitions, agents, work categories and entity
//! kinds, plus the 2D geometry used by the spatial index and the bucket search.
//!
//! ## Key Types
//!
//! - [`PartitionId`] - Opaque identifier of an independently scheduled world partition
//! - [`AgentId`] - Identifier of an agent requesting work
//! - [`WorkTag`] - Name of a task category ("feed", "haul", ...)
//! - [`EntityKind`] - Name of a spatially indexed entity population
//! - [`Position`] - 2D position with double precision
//! - [`Bounds`] - Axis-aligned rectangle covering a partition or a tree node

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Simulation tick counter. Monotonic, owned by the host loop.
pub type Tick = u64;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque identifier of a world partition (one map or level).
///
/// Every cache and index is keyed by partition at the outer level, so two
/// partitions never observe each other's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u32);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition#{}", self.0)
    }
}

/// Identifier of an agent asking the scheduler for work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Name of a task category.
///
/// Work tags key the target cache, the reachability memo and the profiler.
/// Static names are stored without allocating.
///
/// # Examples
///
/// ```rust
/// use work_scheduler::WorkTag;
///
/// let feed = WorkTag::new("feed");
/// assert_eq!(feed.as_str(), "feed");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkTag(Cow<'static, str>);

impl WorkTag {
    /// Creates a work tag from a static name.
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Returns the tag name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for WorkTag {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<String> for WorkTag {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for WorkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of an entity population held in its own spatial index
/// (for example "food" or "damaged_buildings").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKind(Cow<'static, str>);

impl EntityKind {
    /// Creates an entity kind from a static name.
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Returns the kind name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for EntityKind {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityKind {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// A 2D position in world units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Position {
    /// Creates a new position.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance. Preferred over [`Position::distance`] on hot
    /// paths since it avoids the square root.
    #[inline]
    pub fn distance_squared(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance.
    #[inline]
    pub fn distance(&self, other: Position) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Axis-aligned rectangle, inclusive on every edge.
///
/// # Examples
///
/// ```rust
/// use work_scheduler::{Bounds, Position};
///
/// let map = Bounds::new(0.0, 0.0, 250.0, 250.0);
/// assert!(map.contains(Position::new(250.0, 0.0)));
/// assert!(!map.contains(Position::new(250.1, 0.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl Bounds {
    /// Creates bounds from two corners.
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounds anchored at the origin with the given size.
    pub const fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// A degenerate rectangle has no area (or NaN edges) and holds nothing.
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Whether the point lies inside or on the edge of the rectangle.
    #[inline]
    pub fn contains(&self, point: Position) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    /// Whether the square of half-size `extent` centred on `point` lies fully
    /// inside the rectangle.
    #[inline]
    pub fn contains_footprint(&self, point: Position, extent: f64) -> bool {
        point.x - extent >= self.min_x
            && point.x + extent <= self.max_x
            && point.y - extent >= self.min_y
            && point.y + extent <= self.max_y
    }

    /// Circle/rectangle intersection using the closest point on the rectangle
    /// to the circle centre.
    #[inline]
    pub fn intersects_circle(&self, center: Position, radius: f64) -> bool {
        let closest_x = center.x.clamp(self.min_x, self.max_x);
        let closest_y = center.y.clamp(self.min_y, self.max_y);
        let dx = center.x - closest_x;
        let dy = center.y - closest_y;
        dx * dx + dy * dy <= radius * radius
    }

    /// Splits the rectangle into four equal quadrants: NW, NE, SW, SE.
    pub fn quadrants(&self) -> [Bounds; 4] {
        let mid_x = (self.min_x + self.max_x) / 2.0;
        let mid_y = (self.min_y + self.max_y) / 2.0;
        [
            Bounds::new(self.min_x, mid_y, mid_x, self.max_y),
            Bounds::new(mid_x, mid_y, self.max_x, self.max_y),
            Bounds::new(self.min_x, self.min_y, mid_x, mid_y),
            Bounds::new(mid_x, self.min_y, self.max_x, mid_y),
        ]
    }
}

/// What the scheduler needs to know about the agent asking for work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentContext {
    /// Agent identifier
    pub id: AgentId,
    /// Current position
    pub position: Position,
    /// Partition the agent currently stands in; `None` while the agent is
    /// between partitions or despawned
    pub partition: Option<PartitionId>,
}

impl AgentContext {
    pub fn new(id: AgentId, position: Position, partition: Option<PartitionId>) -> Self {
        Self {
            id,
            position,
            partition,
        }
    }
}
