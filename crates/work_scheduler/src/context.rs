//! # Scheduler Context
//!
//! [`SchedulerContext`] is the single object a simulation loop owns to drive
//! target selection. It holds the configuration, the current tick, the
//! per-partition spatial indices, both caches and the interval controller.
//!
//! ## Per-agent pass
//!
//! 1. Read the category's adaptive interval from the controller.
//! 2. Serve the partition's candidate list, rebuilding it if stale. A rebuild
//!    wipes the matching reachability memos.
//! 3. Bucket the list by squared distance from the agent.
//! 4. Walk the tiers nearest-first; each candidate's validity comes from the
//!    memo or from the category's check.
//! 5. Record elapsed time and outcome with the controller.
//!
//! Everything runs synchronously on the caller's thread. The context is
//! `Send` when the handle type is `Send + Sync`, and is never shared.

use crate::bucket::{create_buckets, find_first_valid_with_tier};
use crate::cache::{ReachabilityCache, ReachabilityStats, RegionTargetCache, Refresh, TargetCacheStats};
use crate::category::WorkCategory;
use crate::config::SchedulerConfig;
use crate::error::{panic_message, BuildError, ConfigError};
use crate::profiler::{AdaptiveIntervalController, CategoryReport, IntervalState};
use crate::spatial::{PartitionIndexStats, SpatialEntry, SpatialRegistry};
use crate::types::{AgentContext, AgentId, Bounds, EntityKind, PartitionId, Position, Tick, WorkTag};
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// One agent asking for a target in one category.
pub struct TaskRequest<'a, E> {
    pub partition: PartitionId,
    pub tag: &'a WorkTag,
    pub agent: &'a AgentContext,
    /// Ascending squared-distance tier bounds
    pub thresholds: &'a [f64],
    /// Squared distance from the agent to a candidate
    pub distance_sq: &'a dyn Fn(Position, &E) -> f64,
}

/// Counters for [`SchedulerContext::find_target`] passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionStats {
    pub requests: u64,
    pub matches: u64,
    pub predicate_evaluations: u64,
    pub predicate_panics: u64,
    /// Requests from agents with no partition
    pub unplaced_agents: u64,
}

/// Serialisable snapshot of everything the context tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub tick: Tick,
    pub partitions: usize,
    pub selection: SelectionStats,
    pub target_cache: TargetCacheStats,
    pub reachability: ReachabilityStats,
    pub spatial: Vec<PartitionIndexStats>,
    pub categories: Vec<CategoryReport>,
}

/// Owner of all scheduler state for one simulation.
pub struct SchedulerContext<E> {
    config: SchedulerConfig,
    tick: Tick,
    spatial: SpatialRegistry<E>,
    targets: RegionTargetCache<E>,
    reachability: ReachabilityCache<E>,
    controller: AdaptiveIntervalController,
    selection: SelectionStats,
}

impl<E: Clone + Eq + Hash> SchedulerContext<E> {
    /// Creates a context at tick 0.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency [`SchedulerConfig::validate`] finds.
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let controller = AdaptiveIntervalController::new(config.profiler.clone(), config.cache.default_interval_ticks);
        info!(
            backend = ?config.spatial.backend,
            default_interval = config.cache.default_interval_ticks,
            "scheduler context created"
        );

        Ok(Self {
            spatial: SpatialRegistry::new(config.spatial.clone()),
            targets: RegionTargetCache::new(),
            reachability: ReachabilityCache::new(),
            controller,
            selection: SelectionStats::default(),
            tick: 0,
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // ========================================================================
    // Clock
    // ========================================================================

    pub fn set_tick(&mut self, tick: Tick) {
        self.tick = tick;
    }

    /// Moves the clock one tick forward and returns the new tick.
    pub fn advance_tick(&mut self) -> Tick {
        self.tick = self.tick.saturating_add(1);
        self.tick
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    // ========================================================================
    // Spatial
    // ========================================================================

    pub fn register_partition(&mut self, partition: PartitionId, bounds: Bounds) {
        self.spatial.register_partition(partition, bounds);
    }

    pub fn index_entity(&mut self, partition: PartitionId, kind: &EntityKind, entry: SpatialEntry<E>) -> bool {
        self.spatial.insert(partition, kind, entry)
    }

    /// Clears and repopulates one (partition, kind) index, returning the
    /// number of entries accepted.
    pub fn rebuild_index<I>(&mut self, partition: PartitionId, kind: &EntityKind, entries: I) -> usize
    where
        I: IntoIterator<Item = SpatialEntry<E>>,
    {
        self.spatial.rebuild(partition, kind, entries)
    }

    /// Handles of `kind` within `radius` of `center`. Results may include
    /// entities that have since moved or been destroyed.
    pub fn get_nearby(&mut self, partition: PartitionId, kind: &EntityKind, center: Position, radius: f64) -> Vec<E> {
        self.spatial.query_radius(partition, kind, center, radius)
    }

    pub fn spatial(&self) -> &SpatialRegistry<E> {
        &self.spatial
    }

    // ========================================================================
    // Target cache
    // ========================================================================

    /// Candidate list for (partition, tag), rebuilt when older than the
    /// category's current interval. A rebuild attempt clears the matching
    /// reachability memos.
    pub fn get_or_refresh<B>(&mut self, partition: PartitionId, tag: &WorkTag, builder: B) -> Refresh<E>
    where
        B: FnOnce() -> Result<Vec<E>, BuildError>,
    {
        let interval = self.controller.current_interval(tag);
        let refresh = self.targets.get_or_refresh(partition, tag, self.tick, interval, builder);
        if refresh.builder_ran() {
            self.reachability.clear_category(partition, tag);
        }
        refresh
    }

    pub fn target_cache(&self) -> &RegionTargetCache<E> {
        &self.targets
    }

    pub fn reachability(&self) -> &ReachabilityCache<E> {
        &self.reachability
    }

    // ========================================================================
    // Profiling
    // ========================================================================

    pub fn register_category_for_auto_optimization(&mut self, tag: WorkTag, base_interval: Tick) {
        self.controller.register_category(tag, base_interval);
    }

    pub fn begin_profiling(&mut self) {
        self.controller.begin_profiling();
    }

    pub fn end_profiling(&mut self, tag: &WorkTag, agent: AgentId, succeeded: bool) -> Option<IntervalState> {
        self.controller.end_profiling(tag, agent, succeeded)
    }

    /// Records a pass the host timed itself.
    pub fn record_execution(&mut self, tag: &WorkTag, agent: AgentId, elapsed: Duration, succeeded: bool) -> IntervalState {
        self.controller.record_execution(tag, agent, elapsed, succeeded)
    }

    pub fn current_interval(&self, tag: &WorkTag) -> Tick {
        self.controller.current_interval(tag)
    }

    pub fn performance_score(&self, tag: &WorkTag) -> Option<f64> {
        self.controller.performance_score(tag)
    }

    pub fn controller(&self) -> &AdaptiveIntervalController {
        &self.controller
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Runs a full per-agent pass and records it with the controller.
    ///
    /// `validate` is only called for pairs the memo has not seen since the
    /// last rebuild. A panicking `validate` is logged and treated as invalid.
    pub fn find_target<B, V>(&mut self, request: TaskRequest<'_, E>, builder: B, validate: V) -> Option<E>
    where
        B: FnOnce() -> Result<Vec<E>, BuildError>,
        V: FnMut(&E, &AgentContext) -> bool,
    {
        let started = Instant::now();
        let found = self.select(&request, builder, |_| true, validate);
        self.controller
            .record_execution(request.tag, request.agent.id, started.elapsed(), found.is_some());
        found
    }

    /// [`find_target`](Self::find_target) driven by a [`WorkCategory`], which
    /// also turns the target into a task. Agents without a partition get
    /// nothing. A category seen for the first time is registered with its
    /// base interval.
    pub fn try_assign<C>(&mut self, category: &C, agent: &AgentContext) -> Option<C::Task>
    where
        C: WorkCategory<E>,
    {
        let tag = category.tag();
        let Some(partition) = agent.partition else {
            self.selection.unplaced_agents += 1;
            trace!(agent = %agent.id, %tag, "agent has no partition");
            return None;
        };

        if !self.controller.is_registered(tag) {
            self.controller.register_category(tag.clone(), category.base_interval());
        }

        let started = Instant::now();
        let distance_sq = |from: Position, target: &E| category.distance_sq(from, target);
        let request: TaskRequest<'_, E> = TaskRequest {
            partition,
            tag,
            agent,
            thresholds: category.thresholds(),
            distance_sq: &distance_sq,
        };
        let chosen = self.select(
            &request,
            || category.build_candidates(partition),
            |target| category.is_available(target),
            |target, agent| category.is_valid(target, agent),
        );
        let task = chosen.and_then(|target| match catch_unwind(AssertUnwindSafe(|| category.make_task(target, agent))) {
            Ok(task) => task,
            Err(payload) => {
                self.selection.predicate_panics += 1;
                warn!(
                    %tag,
                    agent = %agent.id,
                    message = %panic_message(payload.as_ref()),
                    "task construction panicked; pass counted as failed"
                );
                None
            }
        });

        self.controller
            .record_execution(tag, agent.id, started.elapsed(), task.is_some());
        task
    }

    fn select<B, A, V>(
        &mut self,
        request: &TaskRequest<'_, E>,
        builder: B,
        mut available: A,
        mut validate: V,
    ) -> Option<E>
    where
        B: FnOnce() -> Result<Vec<E>, BuildError>,
        A: FnMut(&E) -> bool,
        V: FnMut(&E, &AgentContext) -> bool,
    {
        self.selection.requests += 1;

        let refresh = self.get_or_refresh(request.partition, request.tag, builder);
        let buckets = create_buckets(
            request.agent.position,
            &refresh.targets,
            request.distance_sq,
            request.thresholds,
        );

        let tick = self.tick;
        let reachability = &mut self.reachability;
        let mut panics = 0;
        let outcome = find_first_valid_with_tier(&buckets, request.agent, |candidate, agent| {
            let live = match catch_unwind(AssertUnwindSafe(|| available(candidate))) {
                Ok(live) => live,
                Err(payload) => {
                    panics += 1;
                    warn!(
                        tag = %request.tag,
                        agent = %agent.id,
                        message = %panic_message(payload.as_ref()),
                        "availability check panicked; treating target as unavailable"
                    );
                    false
                }
            };
            if !live {
                return false;
            }
            if let Some(known) = reachability.get(request.partition, request.tag, agent.id, candidate) {
                return known;
            }
            let valid = match catch_unwind(AssertUnwindSafe(|| validate(candidate, agent))) {
                Ok(valid) => valid,
                Err(payload) => {
                    panics += 1;
                    warn!(
                        tag = %request.tag,
                        agent = %agent.id,
                        message = %panic_message(payload.as_ref()),
                        "validity check panicked; treating target as invalid"
                    );
                    false
                }
            };
            reachability.set(request.partition, request.tag, agent.id, candidate.clone(), valid, tick);
            valid
        });

        self.selection.predicate_evaluations += outcome.evaluations as u64;
        self.selection.predicate_panics += panics;

        let found = outcome.found.map(|found| {
            trace!(
                tag = %request.tag,
                agent = %request.agent.id,
                tier = found.tier,
                evaluations = outcome.evaluations,
                "target selected"
            );
            found.target.clone()
        });
        if found.is_some() {
            self.selection.matches += 1;
        }
        found
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Drops every structure keyed by `partition`. Safe to call repeatedly.
    pub fn clear_partition(&mut self, partition: PartitionId) -> bool {
        let spatial = self.spatial.clear_partition(partition);
        let targets = self.targets.clear_partition(partition);
        let memos = self.reachability.clear(partition);
        let removed = spatial || targets || memos;
        if removed {
            debug!(%partition, "partition cleared");
        }
        removed
    }

    /// Drops all indices, lists, memos and profiling history. Category
    /// registrations and configuration survive; intervals go back to base.
    pub fn reset_all_caches(&mut self) {
        self.spatial.clear_all();
        self.targets.clear_all();
        self.reachability.clear_all();
        self.controller.reset();
        self.selection = SelectionStats::default();
        info!(tick = self.tick, "all scheduler caches reset");
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            tick: self.tick,
            partitions: self.spatial.partition_count(),
            selection: self.selection.clone(),
            target_cache: self.targets.stats(),
            reachability: self.reachability.stats(),
            spatial: self.spatial.stats(),
            categories: self.controller.report(),
        }
    }
}
