use crate::types::AgentId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed-capacity window of the most recent samples; the oldest is evicted
/// once full. Keeps a running sum so the mean is O(1).
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: Vec<f64>,
    capacity: usize,
    head: usize,
    sum: f64,
}

impl RollingWindow {
    /// A capacity of 0 is bumped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() < self.capacity {
            self.samples.push(value);
            self.sum += value;
            return;
        }

        let evicted = std::mem::replace(&mut self.samples[self.head], value);
        self.head = (self.head + 1) % self.capacity;
        self.sum += value - evicted;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean of the retained samples, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.sum / self.samples.len() as f64)
    }

    pub fn max(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.head = 0;
        self.sum = 0.0;
    }
}

/// Execution history of one work category.
#[derive(Debug, Clone)]
pub struct PerformanceRecord {
    pub execution_count: u64,
    pub success_count: u64,
    pub total_time: Duration,
    pub max_time: Duration,
    /// Agent of the most recent sample
    pub last_agent: Option<AgentId>,
    recent_times_ms: RollingWindow,
    recent_successes: RollingWindow,
}

impl PerformanceRecord {
    pub fn new(window: usize) -> Self {
        Self {
            execution_count: 0,
            success_count: 0,
            total_time: Duration::ZERO,
            max_time: Duration::ZERO,
            last_agent: None,
            recent_times_ms: RollingWindow::new(window),
            recent_successes: RollingWindow::new(window),
        }
    }

    pub fn record(&mut self, agent: AgentId, elapsed: Duration, succeeded: bool) {
        self.execution_count += 1;
        if succeeded {
            self.success_count += 1;
        }
        self.total_time = self.total_time.saturating_add(elapsed);
        self.max_time = self.max_time.max(elapsed);
        self.last_agent = Some(agent);

        self.recent_times_ms.push(elapsed.as_secs_f64() * 1000.0);
        self.recent_successes.push(if succeeded { 1.0 } else { 0.0 });
    }

    /// Samples currently in the window.
    pub fn recent_samples(&self) -> usize {
        self.recent_times_ms.len()
    }

    /// Mean execution time of the window, in milliseconds.
    pub fn recent_average_ms(&self) -> f64 {
        self.recent_times_ms.mean().unwrap_or(0.0)
    }

    /// Share of successful samples in the window. An empty window counts as
    /// fully successful.
    pub fn recent_success_rate(&self) -> f64 {
        self.recent_successes.mean().unwrap_or(1.0)
    }

    /// Mean execution time over the record's whole lifetime, in milliseconds.
    pub fn lifetime_average_ms(&self) -> f64 {
        if self.execution_count == 0 {
            return 0.0;
        }
        self.total_time.as_secs_f64() * 1000.0 / self.execution_count as f64
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            execution_count: self.execution_count,
            success_count: self.success_count,
            recent_samples: self.recent_samples(),
            recent_average_ms: self.recent_average_ms(),
            recent_max_ms: self.recent_times_ms.max().unwrap_or(0.0),
            recent_success_rate: self.recent_success_rate(),
            lifetime_average_ms: self.lifetime_average_ms(),
            max_time_ms: self.max_time.as_secs_f64() * 1000.0,
        }
    }
}

/// Serialisable view of a [`PerformanceRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub execution_count: u64,
    pub success_count: u64,
    pub recent_samples: usize,
    pub recent_average_ms: f64,
    pub recent_max_ms: f64,
    pub recent_success_rate: f64,
    pub lifetime_average_ms: f64,
    pub max_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_window_mean() {
        let mut window = RollingWindow::new(4);
        window.push(1.0);
        window.push(2.0);
        window.push(3.0);

        assert_eq!(window.len(), 3);
        assert!((window.mean().unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(window.max(), Some(3.0));
    }

    #[test]
    fn test_full_window_evicts_oldest() {
        let mut window = RollingWindow::new(3);
        for value in [10.0, 1.0, 1.0, 1.0] {
            window.push(value);
        }

        assert_eq!(window.len(), 3);
        assert!((window.mean().unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(window.max(), Some(1.0));
    }

    #[test]
    fn test_empty_window() {
        let window = RollingWindow::new(0);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.mean(), None);
        assert_eq!(window.max(), None);
    }

    #[test]
    fn test_record_tracks_lifetime_and_window() {
        let mut record = PerformanceRecord::new(2);
        record.record(AgentId(1), Duration::from_millis(8), false);
        record.record(AgentId(2), Duration::from_millis(2), true);
        record.record(AgentId(3), Duration::from_millis(2), true);

        assert_eq!(record.execution_count, 3);
        assert_eq!(record.success_count, 2);
        assert_eq!(record.max_time, Duration::from_millis(8));
        assert_eq!(record.last_agent, Some(AgentId(3)));

        // The 8 ms failure has been evicted from the window
        assert_eq!(record.recent_samples(), 2);
        assert!((record.recent_average_ms() - 2.0).abs() < 1e-9);
        assert!((record.recent_success_rate() - 1.0).abs() < 1e-9);
        assert!((record.lifetime_average_ms() - 4.0).abs() < 1e-9);
    }
}
