use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use taskpool_core::TaskId;
use taskpool_sync::{LockCell, SharedFloat64Array, SharedInt32Array, SharedRegion};

use crate::task::{TaskError, TaskFn};

/// What a task body sees while it runs inside an execution unit.
pub struct Invocation {
    id: Option<TaskId>,
    args: Vec<Value>,
    helpers: Arc<HashMap<String, TaskFn>>,
    transfer: Vec<Option<Vec<u8>>>,
    shared: Vec<SharedRegion>,
    terminated: Arc<AtomicBool>,
}

impl Invocation {
    pub(crate) fn new(
        id: TaskId,
        args: Vec<Value>,
        helpers: Arc<HashMap<String, TaskFn>>,
        transfer: Vec<Vec<u8>>,
        shared: Vec<SharedRegion>,
        terminated: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id: Some(id),
            args,
            helpers,
            transfer: transfer.into_iter().map(Some).collect(),
            shared,
            terminated,
        }
    }

    /// An invocation outside any unit, for calling task functions directly.
    pub fn detached(args: Vec<Value>) -> Self {
        Self {
            id: None,
            args,
            helpers: Arc::new(HashMap::new()),
            transfer: Vec::new(),
            shared: Vec::new(),
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Id of the task being run; `None` for detached invocations.
    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Deserialize the positional argument at `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, TaskError> {
        let value = self
            .args
            .get(index)
            .ok_or_else(|| TaskError::InvalidArgument(format!("missing argument {index}")))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Call a helper supplied in the task's context.
    ///
    /// The helper runs on the same unit with its own arguments and sees the
    /// same helpers and shared regions, but no transferred buffers.
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, TaskError> {
        let helper = self
            .helpers
            .get(name)
            .cloned()
            .ok_or_else(|| TaskError::UnknownFunction(name.to_string()))?;
        let mut nested = Invocation {
            id: self.id,
            args,
            helpers: Arc::clone(&self.helpers),
            transfer: Vec::new(),
            shared: self.shared.clone(),
            terminated: Arc::clone(&self.terminated),
        };
        helper(&mut nested)
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn transfer_len(&self) -> usize {
        self.transfer.len()
    }

    /// Take ownership of the transferred buffer at `index`. Each buffer can be
    /// taken once.
    pub fn take_transfer(&mut self, index: usize) -> Result<Vec<u8>, TaskError> {
        self.transfer
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| {
                TaskError::InvalidArgument(format!("no transferred buffer at {index}"))
            })
    }

    pub fn shared(&self, index: usize) -> Option<&SharedRegion> {
        self.shared.get(index)
    }

    pub fn lock_cell(&self, index: usize) -> Result<&LockCell, TaskError> {
        self.shared_as(index, "lock", SharedRegion::as_lock)
    }

    pub fn int32(&self, index: usize) -> Result<&SharedInt32Array, TaskError> {
        self.shared_as(index, "int32", SharedRegion::as_int32)
    }

    pub fn float64(&self, index: usize) -> Result<&SharedFloat64Array, TaskError> {
        self.shared_as(index, "float64", SharedRegion::as_float64)
    }

    fn shared_as<'a, T>(
        &'a self,
        index: usize,
        kind: &str,
        pick: impl FnOnce(&'a SharedRegion) -> Option<&'a T>,
    ) -> Result<&'a T, TaskError> {
        let region = self.shared.get(index).ok_or_else(|| {
            TaskError::InvalidArgument(format!("no shared region at {index}"))
        })?;
        pick(region).ok_or_else(|| {
            TaskError::InvalidArgument(format!(
                "shared region {index} is {}, expected {kind}",
                region.kind()
            ))
        })
    }

    /// Whether the unit has been terminated. Long-running bodies should poll
    /// this and bail out; their result is discarded anyway.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}
