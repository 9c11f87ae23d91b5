use super::record::{PerformanceRecord, RecordSummary};
use crate::config::ProfilerSettings;
use crate::types::{AgentId, Tick, WorkTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Refresh interval of one category and the score that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalState {
    pub base_interval: Tick,
    pub current_interval: Tick,
    /// `current / base` before integer rounding
    pub multiplier: f64,
    /// Last computed performance score, 0.0 until the first sample
    pub score: f64,
}

impl IntervalState {
    fn new(base_interval: Tick) -> Self {
        Self {
            base_interval,
            current_interval: base_interval,
            multiplier: 1.0,
            score: 0.0,
        }
    }
}

/// Per-category section of [`AdaptiveIntervalController::report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub tag: WorkTag,
    pub interval: IntervalState,
    pub record: RecordSummary,
}

struct CategoryState {
    record: PerformanceRecord,
    interval: IntervalState,
}

/// Turns measured cost and success rate into per-category refresh intervals.
///
/// Expensive or failing categories are refreshed less often, cheap and
/// successful ones more often. Adjustments are multiplicative, only happen
/// outside the `[speed_up_threshold, slow_down_threshold]` band and stay
/// within `[base * min_multiplier, base * max_multiplier]`.
pub struct AdaptiveIntervalController {
    settings: ProfilerSettings,
    default_interval: Tick,
    categories: HashMap<WorkTag, CategoryState>,
    pending: Option<Instant>,
}

impl AdaptiveIntervalController {
    pub fn new(settings: ProfilerSettings, default_interval: Tick) -> Self {
        Self {
            settings,
            default_interval,
            categories: HashMap::new(),
            pending: None,
        }
    }

    pub fn settings(&self) -> &ProfilerSettings {
        &self.settings
    }

    /// Registers a category, or changes the base interval of a known one.
    /// A known category keeps its history and multiplier.
    pub fn register_category(&mut self, tag: WorkTag, base_interval: Tick) {
        let settings = &self.settings;
        if let Some(state) = self.categories.get_mut(&tag) {
            state.interval.base_interval = base_interval;
            state.interval.current_interval = bounded_interval(base_interval, state.interval.multiplier, settings);
            debug!(%tag, base_interval, "category re-registered");
            return;
        }

        debug!(%tag, base_interval, "category registered for auto-optimization");
        self.categories.insert(
            tag,
            CategoryState {
                record: PerformanceRecord::new(settings.window),
                interval: IntervalState::new(base_interval),
            },
        );
    }

    pub fn is_registered(&self, tag: &WorkTag) -> bool {
        self.categories.contains_key(tag)
    }

    /// Starts timing one scheduling pass. A second call before
    /// [`end_profiling`](Self::end_profiling) restarts the timer.
    pub fn begin_profiling(&mut self) {
        if self.pending.is_some() {
            debug!("begin_profiling called twice; restarting timer");
        }
        self.pending = Some(Instant::now());
    }

    /// Stops the timer started by [`begin_profiling`](Self::begin_profiling)
    /// and records the sample. Without a matching begin nothing is recorded.
    pub fn end_profiling(&mut self, tag: &WorkTag, agent: AgentId, succeeded: bool) -> Option<IntervalState> {
        let Some(started) = self.pending.take() else {
            warn!(%tag, %agent, "end_profiling without begin_profiling; sample dropped");
            return None;
        };
        Some(self.record_execution(tag, agent, started.elapsed(), succeeded))
    }

    /// Records one sample with an explicit duration and adjusts the
    /// category's interval.
    pub fn record_execution(
        &mut self,
        tag: &WorkTag,
        agent: AgentId,
        elapsed: Duration,
        succeeded: bool,
    ) -> IntervalState {
        if !self.categories.contains_key(tag) {
            self.register_category(tag.clone(), self.default_interval);
        }
        let settings = &self.settings;
        let Some(state) = self.categories.get_mut(tag) else {
            return IntervalState::new(self.default_interval);
        };

        state.record.record(agent, elapsed, succeeded);
        let score = performance_score(&state.record, settings);
        state.interval.score = score;

        if state.record.recent_samples() < settings.min_samples {
            return state.interval;
        }

        let previous = state.interval.multiplier;
        let multiplier = if score > settings.slow_down_threshold {
            (previous * settings.slow_down_factor).min(settings.max_multiplier)
        } else if score < settings.speed_up_threshold {
            (previous * settings.speed_up_factor).max(settings.min_multiplier)
        } else {
            previous
        };

        if multiplier != previous {
            let before = state.interval.current_interval;
            state.interval.multiplier = multiplier;
            state.interval.current_interval = bounded_interval(state.interval.base_interval, multiplier, settings);
            if state.interval.current_interval != before {
                debug!(
                    %tag,
                    score,
                    from = before,
                    to = state.interval.current_interval,
                    "refresh interval adjusted"
                );
            }
        }

        state.interval
    }

    /// Interval the target cache uses for `tag`; the configured default for
    /// unknown categories.
    pub fn current_interval(&self, tag: &WorkTag) -> Tick {
        self.categories
            .get(tag)
            .map_or(self.default_interval, |state| state.interval.current_interval)
    }

    /// Last score of a known category.
    pub fn performance_score(&self, tag: &WorkTag) -> Option<f64> {
        self.categories.get(tag).map(|state| state.interval.score)
    }

    pub fn interval_state(&self, tag: &WorkTag) -> Option<IntervalState> {
        self.categories.get(tag).map(|state| state.interval)
    }

    pub fn record(&self, tag: &WorkTag) -> Option<&PerformanceRecord> {
        self.categories.get(tag).map(|state| &state.record)
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// Every category's interval and history, ordered by tag.
    pub fn report(&self) -> Vec<CategoryReport> {
        let mut report: Vec<CategoryReport> = self
            .categories
            .iter()
            .map(|(tag, state)| CategoryReport {
                tag: tag.clone(),
                interval: state.interval,
                record: state.record.summary(),
            })
            .collect();
        report.sort_by(|a, b| a.tag.cmp(&b.tag));
        report
    }

    /// Forgets all samples and puts every interval back to its base.
    /// Registrations are kept.
    pub fn reset(&mut self) {
        let window = self.settings.window;
        for state in self.categories.values_mut() {
            state.record = PerformanceRecord::new(window);
            state.interval = IntervalState::new(state.interval.base_interval);
        }
        self.pending = None;
    }
}

/// `w_time * clamp(avg_ms / very_expensive_ms) + w_success * (1 - success_rate)`
fn performance_score(record: &PerformanceRecord, settings: &ProfilerSettings) -> f64 {
    let time_term = (record.recent_average_ms() / settings.very_expensive_ms).clamp(0.0, 1.0);
    let failure_term = (1.0 - record.recent_success_rate()).clamp(0.0, 1.0);
    settings.time_weight * time_term + settings.success_weight() * failure_term
}

/// `round(base * multiplier)` kept inside `[ceil(base * min), floor(base * max)]`.
fn bounded_interval(base: Tick, multiplier: f64, settings: &ProfilerSettings) -> Tick {
    let base_f = base as f64;
    let lower = (base_f * settings.min_multiplier).ceil();
    let upper = (base_f * settings.max_multiplier).floor().max(lower);
    (base_f * multiplier).round().clamp(lower, upper) as Tick
}
