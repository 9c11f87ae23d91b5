use crate::error::BuildError;
use crate::types::{AgentContext, PartitionId, Position, Tick, WorkTag};

/// A class of work the scheduler can hand out.
///
/// Implementations describe where candidates come from and what makes one
/// acceptable. The scheduler owns caching, distance tiering and profiling;
/// see [`SchedulerContext::try_assign`](crate::SchedulerContext::try_assign).
///
/// # Examples
///
/// ```rust
/// use work_scheduler::{AgentContext, BuildError, PartitionId, Position, WorkCategory, WorkTag};
///
/// struct Sweep {
///     tag: WorkTag,
///     dirt: Vec<(u32, Position)>,
/// }
///
/// impl WorkCategory<u32> for Sweep {
///     type Task = u32;
///
///     fn tag(&self) -> &WorkTag { &self.tag }
///     fn base_interval(&self) -> u64 { 60 }
///     fn thresholds(&self) -> &[f64] { &[100.0, 2_500.0] }
///
///     fn build_candidates(&self, _partition: PartitionId) -> Result<Vec<u32>, BuildError> {
///         Ok(self.dirt.iter().map(|(id, _)| *id).collect())
///     }
///
///     fn distance_sq(&self, from: Position, target: &u32) -> f64 {
///         self.dirt
///             .iter()
///             .find(|(id, _)| id == target)
///             .map_or(f64::INFINITY, |(_, pos)| from.distance_squared(*pos))
///     }
///
///     fn is_valid(&self, _target: &u32, _agent: &AgentContext) -> bool { true }
///
///     fn make_task(&self, target: u32, _agent: &AgentContext) -> Option<u32> { Some(target) }
/// }
/// ```
pub trait WorkCategory<E> {
    /// What the category produces for an agent once a target is chosen
    type Task;

    /// Key for the target cache, the reachability memo and the profiler
    fn tag(&self) -> &WorkTag;

    /// Refresh interval before any adaptation, in ticks
    fn base_interval(&self) -> Tick;

    /// Ascending squared-distance tier bounds
    fn thresholds(&self) -> &[f64];

    /// Enumerates every potential target in a partition. Should be free of
    /// side effects; it runs at most once per refresh interval.
    fn build_candidates(&self, partition: PartitionId) -> Result<Vec<E>, BuildError>;

    /// Squared distance from `from` to the target. NaN sorts into the last
    /// tier.
    fn distance_sq(&self, from: Position, target: &E) -> f64;

    /// Cheap liveness check (still exists, not already claimed). Runs on
    /// every evaluation, before the memo is consulted.
    fn is_available(&self, _target: &E) -> bool {
        true
    }

    /// The expensive per-agent check (reachability, reservations, ...).
    /// Results are memoised until the candidate list is rebuilt.
    fn is_valid(&self, target: &E, agent: &AgentContext) -> bool;

    /// Turns the chosen target into a task. `None` counts as a failed pass.
    fn make_task(&self, target: E, agent: &AgentContext) -> Option<Self::Task>;
}
