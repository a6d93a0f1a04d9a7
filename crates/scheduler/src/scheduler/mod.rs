//! Bounded FIFO task scheduler.
//!
//! Submitted tasks queue in arrival order and are admitted into execution
//! units while fewer than `ceiling` are in flight. Every completion, failure or
//! cancellation frees a slot and re-runs admission, so the pool drains to idle
//! on its own.

pub mod metrics;
pub mod runner;
pub mod types;

pub use metrics::SchedulerMetrics;
pub use runner::Scheduler;
pub use types::{Cancellation, SchedulerError, Submission, TaskHandle};
