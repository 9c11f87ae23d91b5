//! Tick loop tying the colony world to the scheduler.
//!
//! Every tick:
//!
//! 1. the scheduler clock advances;
//! 2. every `index_rebuild_every` ticks the stockpiles drain by one item and
//!    the stockpile index is rebuilt;
//! 3. each idle agent asks the job categories in order for work;
//! 4. busy agents count down and finish their tasks;
//! 5. consumed targets are respawned, one per (partition, kind) per tick.

use crate::categories::{default_jobs, JobCategory, JobSpec};
use crate::config::{AppConfig, SimulationSettings};
use crate::world::{ActiveTask, JobKind, Task, TargetId, World, STOCKPILE};
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};
use work_scheduler::{AgentContext, Diagnostics, PartitionId, Position, SchedulerContext};

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickSummary {
    pub tick: u64,
    pub assigned: usize,
    pub completed: usize,
    pub idle: usize,
    pub spawned: usize,
}

/// Running totals over the whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimTotals {
    pub ticks: u64,
    pub assignments: BTreeMap<JobKind, u64>,
    pub completions: BTreeMap<JobKind, u64>,
    pub idle_agent_ticks: u64,
    pub spawned: u64,
    /// Tasks whose target was claimed by someone else first
    pub claim_conflicts: u64,
    /// Hauls started with no stockpile in range
    pub hauls_without_stockpile: u64,
    /// Hauls that arrived at a stockpile that had filled up meanwhile
    pub rejected_deliveries: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub ticks_run: u64,
    pub interrupted: bool,
}

pub struct Simulation {
    settings: SimulationSettings,
    context: SchedulerContext<TargetId>,
    world: World,
    jobs: Vec<JobSpec>,
    totals: SimTotals,
}

impl Simulation {
    /// Generates the world and registers every partition and job with a
    /// fresh scheduler context.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let mut context =
            SchedulerContext::new(config.scheduler.clone()).context("Failed to create scheduler context")?;
        let world = World::generate(&config.simulation);
        let jobs = default_jobs();

        for partition in world.partitions() {
            context.register_partition(partition.id, partition.bounds);
        }
        for job in &jobs {
            context.register_category_for_auto_optimization(job.tag.clone(), job.base_interval);
        }

        info!(
            partitions = world.partitions().len(),
            agents = world.agents.len(),
            targets = world.target_count(),
            seed = config.simulation.seed,
            "world generated"
        );

        Ok(Self {
            settings: config.simulation.clone(),
            context,
            world,
            jobs,
            totals: SimTotals::default(),
        })
    }

    #[cfg(test)]
    pub fn context(&self) -> &SchedulerContext<TargetId> {
        &self.context
    }

    #[cfg(test)]
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn totals(&self) -> &SimTotals {
        &self.totals
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.context.diagnostics()
    }

    /// Advances the simulation by one tick.
    pub fn step(&mut self) -> TickSummary {
        let tick = self.context.advance_tick();
        if tick == 1 || tick % self.settings.index_rebuild_every == 0 {
            self.world.drain_stockpiles();
            self.rebuild_indices();
        }

        let mut summary = TickSummary {
            tick,
            ..TickSummary::default()
        };

        for index in 0..self.world.agents.len() {
            let agent = &self.world.agents[index];
            if !agent.is_idle() {
                continue;
            }
            let agent_ctx = AgentContext::new(agent.id, agent.position, Some(agent.partition));

            let task = self
                .jobs
                .iter()
                .find_map(|job| self.context.try_assign(&JobCategory::new(job, &self.world), &agent_ctx));

            match task {
                Some(task) => {
                    let kind = task.kind;
                    if self.start_task(index, task) {
                        summary.assigned += 1;
                        *self.totals.assignments.entry(kind).or_default() += 1;
                    } else {
                        self.totals.claim_conflicts += 1;
                    }
                }
                None => summary.idle += 1,
            }
        }

        summary.completed = self.progress_agents();
        summary.spawned = self.world.respawn();

        self.totals.ticks += 1;
        self.totals.idle_agent_ticks += summary.idle as u64;
        self.totals.spawned += summary.spawned as u64;
        summary
    }

    fn rebuild_indices(&mut self) {
        for partition in self.world.partitions() {
            let accepted = self
                .context
                .rebuild_index(partition.id, &STOCKPILE, self.world.stockpile_entries(partition.id));
            trace!(partition = %partition.id, accepted, "stockpile index rebuilt");
        }
    }

    /// Nearest stockpile in range that still has room. The index may be up
    /// to `index_rebuild_every` ticks old, so fullness is re-checked here.
    fn nearest_stockpile(&mut self, partition: PartitionId, from: Position) -> Option<(TargetId, Position)> {
        let nearby = self
            .context
            .get_nearby(partition, &STOCKPILE, from, self.settings.haul_search_radius);

        nearby
            .into_iter()
            .filter_map(|id| self.world.stockpile(partition, id))
            .filter(|stockpile| !stockpile.is_full())
            .map(|stockpile| (stockpile.id, stockpile.position))
            .min_by(|a, b| from.distance_squared(a.1).total_cmp(&from.distance_squared(b.1)))
    }

    fn start_task(&mut self, index: usize, task: Task) -> bool {
        if !self.world.claim(task.target, task.agent) {
            debug!(agent = %task.agent, target = %task.target, "target already claimed");
            return false;
        }

        let agent = &self.world.agents[index];
        let (partition, position) = (agent.partition, agent.position);

        let mut travel = position.distance(task.target_position);
        let mut destination = task.target_position;
        let mut drop_off = None;

        if task.kind == JobKind::Haul {
            match self.nearest_stockpile(partition, task.target_position) {
                Some((stockpile, at)) => {
                    travel += task.target_position.distance(at);
                    destination = at;
                    drop_off = Some(stockpile);
                }
                None => {
                    self.totals.hauls_without_stockpile += 1;
                    trace!(agent = %task.agent, target = %task.target, "no stockpile in range");
                }
            }
        }

        let travel_ticks = (travel / self.settings.agent_speed).ceil() as u64;
        let remaining_ticks = (travel_ticks + task.work_ticks).max(1);
        trace!(agent = %task.agent, target = %task.target, kind = %task.kind, remaining_ticks, "task started");

        self.world.agents[index].task = Some(ActiveTask {
            task,
            destination,
            drop_off,
            remaining_ticks,
        });
        true
    }

    fn progress_agents(&mut self) -> usize {
        let mut finished = Vec::new();

        for agent in &mut self.world.agents {
            let Some(active) = agent.task.as_mut() else {
                continue;
            };
            active.remaining_ticks = active.remaining_ticks.saturating_sub(1);
            if active.remaining_ticks == 0 {
                if let Some(active) = agent.task.take() {
                    agent.position = active.destination;
                    finished.push((agent.partition, active));
                }
            }
        }

        for (partition, active) in &finished {
            self.world.consume(active.task.target);
            if let Some(stockpile) = active.drop_off {
                if !self.world.deliver(*partition, stockpile) {
                    self.totals.rejected_deliveries += 1;
                }
            }
            *self.totals.completions.entry(active.task.kind).or_default() += 1;
        }

        finished.len()
    }

    /// Runs up to `settings.ticks` ticks, paced at `tick_rate_hz` when it is
    /// non-zero. Stops early once `shutdown` flips or its sender goes away.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> RunOutcome {
        let mut pacer = (self.settings.tick_rate_hz > 0).then(|| {
            let period = Duration::from_secs_f64(1.0 / f64::from(self.settings.tick_rate_hz));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        let mut outcome = RunOutcome {
            ticks_run: 0,
            interrupted: false,
        };

        while outcome.ticks_run < self.settings.ticks {
            // A dropped sender means the signal task is gone
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                outcome.interrupted = true;
                break;
            }

            match pacer.as_mut() {
                Some(interval) => {
                    tokio::select! {
                        _ = interval.tick() => {}
                        _ = shutdown.changed() => {
                            outcome.interrupted = true;
                            break;
                        }
                    }
                }
                None => tokio::task::yield_now().await,
            }

            let summary = self.step();
            outcome.ticks_run += 1;

            if summary.tick % 100 == 0 {
                debug!(
                    tick = summary.tick,
                    assigned = summary.assigned,
                    completed = summary.completed,
                    idle = summary.idle,
                    "tick summary"
                );
            }
        }

        if outcome.interrupted {
            info!(ticks_run = outcome.ticks_run, "simulation interrupted");
        }
        outcome
    }

    /// Releases every partition from the scheduler.
    pub fn shutdown(&mut self) {
        let partitions: Vec<PartitionId> = self.world.partitions().iter().map(|p| p.id).collect();
        for partition in partitions {
            self.context.clear_partition(partition);
        }
    }

    pub fn log_summary(&self) {
        let diagnostics = self.context.diagnostics();

        info!(
            ticks = self.totals.ticks,
            assignments = self.totals.assignments.values().sum::<u64>(),
            completions = self.totals.completions.values().sum::<u64>(),
            idle_agent_ticks = self.totals.idle_agent_ticks,
            claim_conflicts = self.totals.claim_conflicts,
            "simulation finished"
        );
        info!(
            requests = diagnostics.selection.requests,
            matches = diagnostics.selection.matches,
            predicate_evaluations = diagnostics.selection.predicate_evaluations,
            cache_hits = diagnostics.target_cache.hits,
            refreshes = diagnostics.target_cache.refreshes,
            memo_hits = diagnostics.reachability.hits,
            "scheduler totals"
        );
        for category in &diagnostics.categories {
            info!(
                tag = %category.tag,
                interval = category.interval.current_interval,
                base = category.interval.base_interval,
                score = category.interval.score,
                avg_ms = category.record.recent_average_ms,
                success_rate = category.record.recent_success_rate,
                "category"
            );
        }
    }
}
