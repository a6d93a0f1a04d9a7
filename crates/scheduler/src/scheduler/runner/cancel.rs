use std::sync::Arc;

use taskpool_core::TaskId;
use tracing::{debug, info};

use crate::scheduler::types::Cancellation;

use super::core::{SchedulerState, Shared};
use super::Scheduler;

impl Scheduler {
    /// Cancel one task.
    ///
    /// A queued task is removed before this returns and never reaches a unit.
    /// A running task has its unit terminated and its slot handed to the next
    /// queued task. Either way the task's handle resolves with
    /// [`TaskError::Cancelled`](crate::TaskError::Cancelled). Unknown or
    /// finished ids are ignored.
    pub fn cancel(&self, id: TaskId) -> Cancellation {
        let mut state = self.inner.lock_state();
        self.inner.cancel_locked(&mut state, id)
    }

    /// Drop every queued task, then terminate every running one.
    /// Returns how many tasks were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.inner.lock_state();

        let dequeued = state.pending.len();
        state.pending.clear();
        state.metrics.cancelled += dequeued as u64;

        let running: Vec<TaskId> = state.running.keys().copied().collect();
        let terminated = running
            .into_iter()
            .filter(|&id| self.inner.cancel_locked(&mut state, id) == Cancellation::Terminated)
            .count();

        info!(dequeued, terminated, "Cancelled all tasks");
        dequeued + terminated
    }
}

impl Shared {
    pub(super) fn cancel_locked(
        self: &Arc<Self>,
        state: &mut SchedulerState,
        id: TaskId,
    ) -> Cancellation {
        if let Some(pos) = state.pending.iter().position(|t| t.id == id) {
            // Dropping the task drops its completion sender.
            state.pending.remove(pos);
            state.metrics.cancelled += 1;
            debug!(task_id = %id, "Cancelled queued task");
            return Cancellation::Dequeued;
        }

        if let Some(running) = state.running.remove(&id) {
            running.handle.terminate();
            state.metrics.cancelled += 1;
            debug!(task_id = %id, "Terminated running task");
            self.dispatch(state);
            return Cancellation::Terminated;
        }

        Cancellation::NotFound
    }
}
