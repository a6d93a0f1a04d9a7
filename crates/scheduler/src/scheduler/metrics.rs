use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Scheduler counters, snapshotted by [`Scheduler::metrics`](super::Scheduler::metrics).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Concurrency ceiling.
    pub ceiling: usize,
    pub submitted: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    /// Tasks whose body failed or panicked.
    pub failed: u64,
    /// Tasks whose execution unit could not be started.
    pub dispatch_failures: u64,
    pub cancelled: u64,
    /// Currently queued.
    pub pending: usize,
    /// Currently running.
    pub in_flight: usize,
    /// Highest in-flight count observed.
    pub peak_in_flight: usize,
    /// Cancelled units whose body is still running on its thread. These hold
    /// no slot, so actual parallelism can briefly exceed the ceiling.
    pub lingering_units: usize,
    /// Mean wall time from dispatch to completion, over finished tasks.
    pub avg_run_duration: Duration,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    pub(crate) fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            ..Self::default()
        }
    }

    pub(crate) fn record_dispatch(&mut self, in_flight: usize) {
        self.dispatched += 1;
        self.peak_in_flight = self.peak_in_flight.max(in_flight);
    }

    /// Record a finished task (success or failure).
    pub(crate) fn record_completion(&mut self, succeeded: bool, duration: Duration) {
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.last_completed_at = Some(Utc::now());

        let count = self.succeeded + self.failed;
        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_run_duration = if count == 1 {
            duration
        } else {
            let prev_nanos = self.avg_run_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }

    /// Tasks that reached a terminal state.
    pub fn settled(&self) -> u64 {
        self.succeeded + self.failed + self.dispatch_failures + self.cancelled
    }

    /// Fraction of the ceiling currently in use (0.0 - 1.0).
    pub fn utilization(&self) -> f64 {
        if self.ceiling == 0 {
            0.0
        } else {
            self.in_flight as f64 / self.ceiling as f64
        }
    }
}
