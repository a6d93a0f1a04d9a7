use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde_json::Value;
use taskpool_core::{Config, SchedulerConfig, TaskId};
use tokio::sync::oneshot;
use tracing::info;

use crate::scheduler::metrics::SchedulerMetrics;
use crate::scheduler::types::SchedulerError;
use crate::task::{TaskDescriptor, TaskError};
use crate::unit::{FunctionRegistry, ThreadUnitFactory, UnitFactory, UnitHandle};

pub(super) type Completion = oneshot::Sender<Result<Value, TaskError>>;

/// Bounded-concurrency FIFO scheduler over execution units.
///
/// Cheap to clone; clones share one queue and in-flight table. Bookkeeping is
/// serialized by a single mutex so admission and completion steps never
/// interleave, which keeps `in_flight <= ceiling` at every observation point.
///
/// Units settle straight into the scheduler from their own threads, so no
/// async runtime has to outlive it. Only awaiting a [`TaskHandle`] needs an
/// executor, and any executor will do.
///
/// [`TaskHandle`]: crate::TaskHandle
#[derive(Clone)]
pub struct Scheduler {
    pub(super) inner: Arc<Shared>,
}

pub(super) struct Shared {
    pub(super) ceiling: usize,
    pub(super) factory: Arc<dyn UnitFactory>,
    pub(super) state: Mutex<SchedulerState>,
}

pub(super) struct SchedulerState {
    /// Last id handed out; 0 before the first submission.
    pub(super) last_id: u64,
    /// Queued tasks in submission order.
    pub(super) pending: VecDeque<PendingTask>,
    pub(super) running: HashMap<TaskId, RunningTask>,
    pub(super) metrics: SchedulerMetrics,
}

pub(super) struct PendingTask {
    pub(super) id: TaskId,
    pub(super) descriptor: TaskDescriptor,
    pub(super) completion: Completion,
}

pub(super) struct RunningTask {
    pub(super) handle: Box<dyn UnitHandle>,
    pub(super) completion: Completion,
    pub(super) started: Instant,
}

impl SchedulerState {
    pub(super) fn issue_id(&mut self) -> TaskId {
        self.last_id += 1;
        TaskId::new(self.last_id)
    }
}

impl Shared {
    pub(super) fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        // Poisoning is ignored: no critical section panics mid-update.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler {
    /// Create a scheduler over `factory`. Fails on an explicit zero ceiling.
    pub fn new(
        config: &SchedulerConfig,
        factory: Arc<dyn UnitFactory>,
    ) -> Result<Self, SchedulerError> {
        let ceiling = config.resolved_max_concurrency()?.get();
        info!(ceiling, "Scheduler created");
        Ok(Self {
            inner: Arc::new(Shared {
                ceiling,
                factory,
                state: Mutex::new(SchedulerState {
                    last_id: 0,
                    pending: VecDeque::new(),
                    running: HashMap::new(),
                    metrics: SchedulerMetrics::new(ceiling),
                }),
            }),
        })
    }

    /// Scheduler backed by one OS thread per task, resolving named bodies
    /// through `registry`.
    pub fn threaded(
        config: &Config,
        registry: Arc<FunctionRegistry>,
    ) -> Result<Self, SchedulerError> {
        config.units.stack_size_bytes()?;
        let factory = ThreadUnitFactory::with_config(registry, config.units.clone());
        Self::new(&config.scheduler, Arc::new(factory))
    }

    /// Maximum number of tasks running at once.
    pub fn ceiling(&self) -> usize {
        self.inner.ceiling
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.lock_state().running.len()
    }

    /// No task queued or running.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.lock_state();
        state.pending.is_empty() && state.running.is_empty()
    }

    /// Snapshot of the scheduler counters.
    pub fn metrics(&self) -> SchedulerMetrics {
        let state = self.inner.lock_state();
        let mut metrics = state.metrics.clone();
        metrics.pending = state.pending.len();
        metrics.in_flight = state.running.len();
        metrics.lingering_units = self.inner.factory.lingering();
        metrics
    }
}
