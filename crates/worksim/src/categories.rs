//! The three colony jobs expressed as scheduler work categories.

use crate::world::{JobKind, Task, TargetId, World};
use work_scheduler::{AgentContext, BuildError, PartitionId, Position, Tick, WorkCategory, WorkTag};

/// Static description of one job type.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub kind: JobKind,
    pub tag: WorkTag,
    pub base_interval: Tick,
    /// Squared-distance tier bounds
    pub thresholds: Vec<f64>,
    /// Ticks spent at the target once there
    pub work_ticks: u64,
}

/// Jobs in the order idle agents consider them.
pub fn default_jobs() -> Vec<JobSpec> {
    vec![
        JobSpec {
            kind: JobKind::Feed,
            tag: WorkTag::new("feed"),
            base_interval: 60,
            thresholds: vec![20.0 * 20.0, 50.0 * 50.0, 100.0 * 100.0],
            work_ticks: 5,
        },
        JobSpec {
            kind: JobKind::Haul,
            tag: WorkTag::new("haul"),
            base_interval: 120,
            thresholds: vec![30.0 * 30.0, 80.0 * 80.0],
            work_ticks: 3,
        },
        JobSpec {
            kind: JobKind::Repair,
            tag: WorkTag::new("repair"),
            base_interval: 240,
            thresholds: vec![50.0 * 50.0, 150.0 * 150.0],
            work_ticks: 12,
        },
    ]
}

/// A job bound to the current world state for one selection pass.
pub struct JobCategory<'w> {
    spec: &'w JobSpec,
    world: &'w World,
}

impl<'w> JobCategory<'w> {
    pub fn new(spec: &'w JobSpec, world: &'w World) -> Self {
        Self { spec, world }
    }
}

impl WorkCategory<TargetId> for JobCategory<'_> {
    type Task = Task;

    fn tag(&self) -> &WorkTag {
        &self.spec.tag
    }

    fn base_interval(&self) -> Tick {
        self.spec.base_interval
    }

    fn thresholds(&self) -> &[f64] {
        &self.spec.thresholds
    }

    fn build_candidates(&self, partition: PartitionId) -> Result<Vec<TargetId>, BuildError> {
        if self.world.partition(partition).is_none() {
            return Err(BuildError::SourceUnavailable(format!("{partition} is not loaded")));
        }
        Ok(self
            .world
            .open_targets(partition, self.spec.kind)
            .map(|target| target.id)
            .collect())
    }

    fn distance_sq(&self, from: Position, target: &TargetId) -> f64 {
        self.world
            .target(*target)
            .map_or(f64::NAN, |target| from.distance_squared(target.position))
    }

    fn is_available(&self, target: &TargetId) -> bool {
        self.world
            .target(*target)
            .is_some_and(|target| target.claimed_by.is_none())
    }

    fn is_valid(&self, target: &TargetId, agent: &AgentContext) -> bool {
        let (Some(target), Some(partition)) = (self.world.target(*target), agent.partition) else {
            return false;
        };
        target.partition == partition && self.world.line_of_sight(partition, agent.position, target.position)
    }

    fn make_task(&self, target: TargetId, agent: &AgentContext) -> Option<Task> {
        let found = self.world.target(target)?;
        if found.claimed_by.is_some() {
            return None;
        }
        Some(Task {
            agent: agent.id,
            target,
            kind: self.spec.kind,
            target_position: found.position,
            work_ticks: self.spec.work_ticks,
        })
    }
}
