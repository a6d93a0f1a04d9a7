use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use taskpool_core::TaskId;
use taskpool_sync::SharedRegion;

use crate::unit::Invocation;

/// Error delivered through a task's result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    /// The task body returned a failure.
    #[error("Task failed: {0}")]
    Failed(String),
    /// The execution unit could not be started.
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Task panicked: {0}")]
    Panicked(String),
    /// Cancelled before a result was delivered.
    #[error("Task cancelled")]
    Cancelled,
}

impl TaskError {
    pub fn failed(msg: impl fmt::Display) -> Self {
        TaskError::Failed(msg.to_string())
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(e: serde_json::Error) -> Self {
        TaskError::InvalidArgument(e.to_string())
    }
}

/// Failure to bring up an execution unit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("could not spawn execution unit: {0}")]
    Spawn(String),
    #[error("execution unit unavailable: {0}")]
    Unavailable(String),
}

/// A callable task body or helper.
pub type TaskFn = Arc<dyn Fn(&mut Invocation) -> Result<Value, TaskError> + Send + Sync>;

/// The code a task runs: an in-process function value, or the name of a
/// function the execution unit resolves through its registry.
#[derive(Clone)]
pub enum TaskBody {
    Function(TaskFn),
    Named(String),
}

impl TaskBody {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&mut Invocation) -> Result<Value, TaskError> + Send + Sync + 'static,
    {
        TaskBody::Function(Arc::new(f))
    }

    pub fn named(name: impl Into<String>) -> Self {
        TaskBody::Named(name.into())
    }
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Function(_) => f.write_str("Function(<fn>)"),
            TaskBody::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

impl From<&str> for TaskBody {
    fn from(name: &str) -> Self {
        TaskBody::named(name)
    }
}

impl From<String> for TaskBody {
    fn from(name: String) -> Self {
        TaskBody::Named(name)
    }
}

/// A helper function the body may call by name through [`Invocation::call`].
#[derive(Debug, Clone)]
pub struct Helper {
    pub name: String,
    pub body: TaskBody,
}

impl Helper {
    /// Helper resolved from the unit's registry under its own name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            body: TaskBody::Named(name.clone()),
            name,
        }
    }

    pub fn function<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Invocation) -> Result<Value, TaskError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: TaskBody::function(f),
        }
    }
}

/// Observer called with a task's successful result on the execution unit,
/// just before the result is delivered.
#[derive(Clone)]
pub struct Subscription(Arc<dyn Fn(&Value) + Send + Sync>);

impl Subscription {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn notify(&self, value: &Value) {
        (self.0)(value)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Subscription(<fn>)")
    }
}

/// Everything needed to run one unit of work, minus the id and the completion
/// channel which the scheduler attaches at submission.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub body: TaskBody,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Helpers callable by name from the body.
    pub context: Vec<Helper>,
    /// Buffers whose ownership moves into the execution unit.
    pub transfer: Vec<Vec<u8>>,
    /// Regions observed jointly by the caller and the unit.
    pub shared: Vec<SharedRegion>,
    pub subscription: Option<Subscription>,
}

impl TaskDescriptor {
    pub fn new(body: impl Into<TaskBody>) -> Self {
        Self {
            body: body.into(),
            args: Vec::new(),
            context: Vec::new(),
            transfer: Vec::new(),
            shared: Vec::new(),
            subscription: None,
        }
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&mut Invocation) -> Result<Value, TaskError> + Send + Sync + 'static,
    {
        Self::new(TaskBody::function(f))
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn helper(mut self, helper: Helper) -> Self {
        self.context.push(helper);
        self
    }

    pub fn transfer(mut self, buffer: Vec<u8>) -> Self {
        self.transfer.push(buffer);
        self
    }

    pub fn shared(mut self, region: impl Into<SharedRegion>) -> Self {
        self.shared.push(region.into());
        self
    }

    /// Observe the result on the unit as soon as the body succeeds.
    pub fn subscribe<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscription = Some(Subscription::new(f));
        self
    }
}

/// A descriptor tagged with its id, as handed to an execution unit.
#[derive(Debug)]
pub struct TaskPayload {
    pub id: TaskId,
    pub descriptor: TaskDescriptor,
}
