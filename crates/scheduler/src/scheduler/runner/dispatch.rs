use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use taskpool_core::TaskId;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::scheduler::types::{Submission, TaskHandle};
use crate::task::{TaskDescriptor, TaskError, TaskPayload};
use crate::unit::Settle;

use super::core::{PendingTask, RunningTask, SchedulerState, Shared};
use super::Scheduler;

impl Scheduler {
    /// Queue a task and admit it straight away if a slot is free.
    ///
    /// Never blocks and never fails here: a body that cannot run surfaces as
    /// an error on the returned [`TaskHandle`].
    pub fn submit(&self, descriptor: TaskDescriptor) -> Submission {
        let (tx, rx) = oneshot::channel();
        let mut state = self.inner.lock_state();

        let id = state.issue_id();
        state.pending.push_back(PendingTask {
            id,
            descriptor,
            completion: tx,
        });
        state.metrics.submitted += 1;
        debug!(task_id = %id, pending = state.pending.len(), "Task submitted");

        self.inner.dispatch(&mut state);

        Submission {
            id,
            result: TaskHandle::new(rx),
        }
    }
}

impl Shared {
    /// Admit queued tasks in FIFO order while under the ceiling.
    ///
    /// Runs after every submission, completion and cancellation. A unit that
    /// fails to start rejects its task and the loop moves on to the next one.
    pub(super) fn dispatch(self: &Arc<Self>, state: &mut SchedulerState) {
        while state.running.len() < self.ceiling {
            let Some(PendingTask {
                id,
                descriptor,
                completion,
            }) = state.pending.pop_front()
            else {
                break;
            };

            let shared = Arc::clone(self);
            let settle = Settle::new(move |result| shared.complete(id, result));

            match self.factory.spawn(TaskPayload { id, descriptor }, settle) {
                Ok(handle) => {
                    state.running.insert(
                        id,
                        RunningTask {
                            handle,
                            completion,
                            started: Instant::now(),
                        },
                    );
                    let in_flight = state.running.len();
                    state.metrics.record_dispatch(in_flight);
                    debug!(task_id = %id, in_flight, ceiling = self.ceiling, "Task dispatched");
                }
                Err(e) => {
                    warn!(task_id = %id, error = %e, "Failed to start execution unit");
                    state.metrics.dispatch_failures += 1;
                    let _ = completion.send(Err(TaskError::Dispatch(e)));
                }
            }
        }
    }

    /// Deliver a unit's outcome, free its slot and admit more work. Runs on
    /// whichever thread the unit settled from.
    ///
    /// Removal and delivery happen under the state lock, so a task that was
    /// cancelled first never sees a late result.
    fn complete(self: &Arc<Self>, id: TaskId, result: Result<Value, TaskError>) {
        let mut state = self.lock_state();
        let Some(running) = state.running.remove(&id) else {
            debug!(task_id = %id, "Dropping outcome of cancelled task");
            return;
        };

        let elapsed = running.started.elapsed();
        state.metrics.record_completion(result.is_ok(), elapsed);
        match &result {
            Ok(_) => debug!(task_id = %id, ?elapsed, "Task completed"),
            Err(e) => warn!(task_id = %id, error = %e, "Task failed"),
        }
        // The submitter may have dropped its handle.
        let _ = running.completion.send(result);

        self.dispatch(&mut state);
    }
}
