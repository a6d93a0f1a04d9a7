use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use serde_json::Value;
use taskpool_core::{ConfigError, TaskId};
use tokio::sync::oneshot;

use crate::task::TaskError;

/// Errors raised when building a scheduler. Nothing after construction fails
/// at the scheduler level; task failures travel through [`TaskHandle`].
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Returned by [`Scheduler::submit`](super::Scheduler::submit).
#[derive(Debug)]
pub struct Submission {
    pub id: TaskId,
    pub result: TaskHandle,
}

/// Resolves exactly once with the task's result.
///
/// A task cancelled before it delivered a result resolves with
/// [`TaskError::Cancelled`].
#[derive(Debug)]
pub struct TaskHandle {
    rx: oneshot::Receiver<Result<Value, TaskError>>,
}

impl TaskHandle {
    pub(crate) fn new(rx: oneshot::Receiver<Result<Value, TaskError>>) -> Self {
        Self { rx }
    }

    /// Await the result and deserialize it.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, TaskError> {
        let value = self.await?;
        serde_json::from_value(value)
            .map_err(|e| TaskError::Failed(format!("unexpected result shape: {e}")))
    }
}

impl Future for TaskHandle {
    type Output = Result<Value, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(TaskError::Cancelled)))
    }
}

/// What [`Scheduler::cancel`](super::Scheduler::cancel) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// Removed from the queue before it was ever dispatched.
    Dequeued,
    /// Its execution unit was terminated.
    Terminated,
    /// Unknown or already finished; nothing happened.
    NotFound,
}
