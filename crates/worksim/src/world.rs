//! Simulated colony state.
//!
//! Each partition is a rectangular map with wall obstacles, stockpiles and
//! three populations of work targets. Targets that spawn behind or inside a
//! wall are unreachable for some or all agents, which gives every category
//! a realistic failure rate.

use crate::config::SimulationSettings;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use work_scheduler::{AgentId, Bounds, EntityKind, PartitionId, Position, SpatialEntry};

/// Kind key of the stockpile spatial index.
pub const STOCKPILE: EntityKind = EntityKind::new("stockpile");

/// Tries before giving up on finding a spot outside every wall.
const PLACEMENT_ATTEMPTS: usize = 32;

const STOCKPILE_CAPACITY: u32 = 20;

/// Handle of a target or stockpile. Unique across partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub u32);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Feed,
    Haul,
    Repair,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Feed, JobKind::Haul, JobKind::Repair];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Feed => "feed",
            JobKind::Haul => "haul",
            JobKind::Repair => "repair",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Target {
    pub id: TargetId,
    pub partition: PartitionId,
    pub kind: JobKind,
    pub position: Position,
    pub claimed_by: Option<AgentId>,
}

#[derive(Debug, Clone)]
pub struct Stockpile {
    pub id: TargetId,
    pub position: Position,
    pub stored: u32,
    pub capacity: u32,
}

impl Stockpile {
    pub fn is_full(&self) -> bool {
        self.stored >= self.capacity
    }
}

/// Work an agent has accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub agent: AgentId,
    pub target: TargetId,
    pub kind: JobKind,
    pub target_position: Position,
    pub work_ticks: u64,
}

#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub task: Task,
    /// Where the agent ends up once done
    pub destination: Position,
    /// Stockpile receiving a hauled item
    pub drop_off: Option<TargetId>,
    pub remaining_ticks: u64,
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub partition: PartitionId,
    pub position: Position,
    pub task: Option<ActiveTask>,
}

impl Agent {
    pub fn is_idle(&self) -> bool {
        self.task.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct PartitionWorld {
    pub id: PartitionId,
    pub bounds: Bounds,
    pub walls: Vec<Bounds>,
    pub stockpiles: Vec<Stockpile>,
}

impl PartitionWorld {
    /// Whether the straight segment `from -> to` avoids every wall.
    pub fn line_of_sight(&self, from: Position, to: Position) -> bool {
        !self.walls.iter().any(|wall| segment_hits(wall, from, to))
    }

    fn is_open(&self, point: Position) -> bool {
        !self.walls.iter().any(|wall| wall.contains(point))
    }
}

/// Slab test of a segment against an axis-aligned rectangle.
fn segment_hits(wall: &Bounds, from: Position, to: Position) -> bool {
    let mut t_enter: f64 = 0.0;
    let mut t_exit: f64 = 1.0;

    for (origin, delta, min, max) in [
        (from.x, to.x - from.x, wall.min_x, wall.max_x),
        (from.y, to.y - from.y, wall.min_y, wall.max_y),
    ] {
        if delta.abs() < f64::EPSILON {
            if origin < min || origin > max {
                return false;
            }
            continue;
        }
        let (mut near, mut far) = ((min - origin) / delta, (max - origin) / delta);
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        t_enter = t_enter.max(near);
        t_exit = t_exit.min(far);
        if t_enter > t_exit {
            return false;
        }
    }
    true
}

pub struct World {
    settings: SimulationSettings,
    rng: StdRng,
    partitions: Vec<PartitionWorld>,
    targets: BTreeMap<TargetId, Target>,
    pub agents: Vec<Agent>,
    next_id: u32,
}

impl World {
    /// Generates every partition from `settings.seed`.
    pub fn generate(settings: &SimulationSettings) -> Self {
        let mut world = Self {
            settings: settings.clone(),
            rng: StdRng::seed_from_u64(settings.seed),
            partitions: Vec::new(),
            targets: BTreeMap::new(),
            agents: Vec::new(),
            next_id: 0,
        };

        for index in 0..settings.partitions {
            world.generate_partition(PartitionId(index));
        }
        world
    }

    fn next_target_id(&mut self) -> TargetId {
        let id = TargetId(self.next_id);
        self.next_id += 1;
        id
    }

    fn random_point(rng: &mut StdRng, bounds: &Bounds) -> Position {
        Position::new(
            rng.random_range(bounds.min_x..bounds.max_x),
            rng.random_range(bounds.min_y..bounds.max_y),
        )
    }

    fn open_point(rng: &mut StdRng, partition: &PartitionWorld) -> Position {
        let mut point = Self::random_point(rng, &partition.bounds);
        for _ in 0..PLACEMENT_ATTEMPTS {
            if partition.is_open(point) {
                break;
            }
            point = Self::random_point(rng, &partition.bounds);
        }
        point
    }

    fn generate_partition(&mut self, id: PartitionId) {
        let bounds = Bounds::from_size(self.settings.world_width, self.settings.world_height);
        let longest = bounds.width().max(bounds.height());

        let walls = (0..self.settings.walls_per_partition)
            .map(|_| {
                let corner = Self::random_point(&mut self.rng, &bounds);
                let width = self.rng.random_range(0.08..0.25) * longest;
                let height = self.rng.random_range(0.02..0.06) * longest;
                // Horizontal or vertical
                let (w, h) = if self.rng.random_bool(0.5) { (width, height) } else { (height, width) };
                Bounds::new(
                    corner.x,
                    corner.y,
                    (corner.x + w).min(bounds.max_x),
                    (corner.y + h).min(bounds.max_y),
                )
            })
            .collect();

        let mut partition = PartitionWorld {
            id,
            bounds,
            walls,
            stockpiles: Vec::new(),
        };

        for _ in 0..self.settings.stockpiles_per_partition {
            let position = Self::open_point(&mut self.rng, &partition);
            let stockpile_id = self.next_target_id();
            partition.stockpiles.push(Stockpile {
                id: stockpile_id,
                position,
                stored: 0,
                capacity: STOCKPILE_CAPACITY,
            });
        }

        for _ in 0..self.settings.agents_per_partition {
            let position = Self::open_point(&mut self.rng, &partition);
            self.agents.push(Agent {
                id: AgentId(self.agents.len() as u64),
                partition: id,
                position,
                task: None,
            });
        }

        self.partitions.push(partition);

        for kind in JobKind::ALL {
            for _ in 0..self.settings.targets_per_kind {
                self.spawn_target(id, kind);
            }
        }
    }

    /// Places one target anywhere in the partition, walls included.
    fn spawn_target(&mut self, partition: PartitionId, kind: JobKind) -> Option<TargetId> {
        let bounds = self.partition(partition)?.bounds;
        let position = Self::random_point(&mut self.rng, &bounds);
        let id = self.next_target_id();
        self.targets.insert(
            id,
            Target {
                id,
                partition,
                kind,
                position,
                claimed_by: None,
            },
        );
        Some(id)
    }

    pub fn partitions(&self) -> &[PartitionWorld] {
        &self.partitions
    }

    pub fn partition(&self, id: PartitionId) -> Option<&PartitionWorld> {
        self.partitions.iter().find(|partition| partition.id == id)
    }

    fn partition_mut(&mut self, id: PartitionId) -> Option<&mut PartitionWorld> {
        self.partitions.iter_mut().find(|partition| partition.id == id)
    }

    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(&id)
    }

    /// Unclaimed targets of `kind` in a partition, in id order.
    pub fn open_targets(&self, partition: PartitionId, kind: JobKind) -> impl Iterator<Item = &Target> + '_ {
        self.targets
            .values()
            .filter(move |t| t.partition == partition && t.kind == kind && t.claimed_by.is_none())
    }

    pub fn live_targets(&self, partition: PartitionId, kind: JobKind) -> usize {
        self.targets
            .values()
            .filter(|t| t.partition == partition && t.kind == kind)
            .count()
    }

    pub fn line_of_sight(&self, partition: PartitionId, from: Position, to: Position) -> bool {
        self.partition(partition)
            .is_some_and(|partition| partition.line_of_sight(from, to))
    }

    /// Marks a target as taken. Fails if it is gone or already claimed.
    pub fn claim(&mut self, id: TargetId, agent: AgentId) -> bool {
        match self.targets.get_mut(&id) {
            Some(target) if target.claimed_by.is_none() => {
                target.claimed_by = Some(agent);
                true
            }
            _ => false,
        }
    }

    /// Removes a finished target from the world.
    pub fn consume(&mut self, id: TargetId) -> Option<Target> {
        self.targets.remove(&id)
    }

    pub fn stockpile(&self, partition: PartitionId, id: TargetId) -> Option<&Stockpile> {
        self.partition(partition)?
            .stockpiles
            .iter()
            .find(|stockpile| stockpile.id == id)
    }

    /// Adds one hauled item. Returns `false` if the stockpile filled up
    /// since it was chosen.
    pub fn deliver(&mut self, partition: PartitionId, id: TargetId) -> bool {
        let Some(stockpile) = self
            .partition_mut(partition)
            .and_then(|p| p.stockpiles.iter_mut().find(|s| s.id == id))
        else {
            return false;
        };
        if stockpile.is_full() {
            return false;
        }
        stockpile.stored += 1;
        true
    }

    /// Empties every stockpile by one unit.
    pub fn drain_stockpiles(&mut self) {
        for stockpile in self.partitions.iter_mut().flat_map(|p| p.stockpiles.iter_mut()) {
            stockpile.stored = stockpile.stored.saturating_sub(1);
        }
    }

    /// Index entries for the stockpiles that can still take items.
    pub fn stockpile_entries(&self, partition: PartitionId) -> Vec<SpatialEntry<TargetId>> {
        self.partition(partition)
            .map(|p| {
                p.stockpiles
                    .iter()
                    .filter(|s| !s.is_full())
                    .map(|s| SpatialEntry::new(s.id, s.position))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Spawns at most one target per (partition, kind) below its quota.
    pub fn respawn(&mut self) -> usize {
        let mut spawned = 0;
        let partitions: Vec<PartitionId> = self.partitions.iter().map(|p| p.id).collect();
        for partition in partitions {
            for kind in JobKind::ALL {
                if self.live_targets(partition, kind) < self.settings.targets_per_kind as usize
                    && self.spawn_target(partition, kind).is_some()
                {
                    spawned += 1;
                }
            }
        }
        spawned
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}
