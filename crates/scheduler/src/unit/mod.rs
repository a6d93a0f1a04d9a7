//! Execution units: isolated contexts that each run one task to completion.
//!
//! The scheduler only sees the [`UnitFactory`] contract. Starting a unit hands
//! over an explicit pair: the [`Settle`] callback the unit reports through,
//! and the [`UnitHandle`] the scheduler keeps to terminate it. Results travel
//! from the unit straight into the scheduler, so completion never depends on
//! an async runtime staying alive.
//! [`ThreadUnitFactory`] is the bundled implementation: one OS thread per
//! unit, with bodies resolved through a [`FunctionRegistry`].

mod invocation;
mod registry;
mod thread;

use std::fmt;

use serde_json::Value;

use crate::task::{DispatchError, TaskError, TaskPayload};

pub use self::invocation::Invocation;
pub use self::registry::{FunctionRegistry, RegistryError};
pub use self::thread::ThreadUnitFactory;

/// Receives a unit's result. Consumed by the call, so a unit settles at most
/// once. A terminated unit drops it without calling.
pub struct Settle(Box<dyn FnOnce(Result<Value, TaskError>) + Send>);

impl Settle {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Result<Value, TaskError>) + Send + 'static,
    {
        Self(Box::new(f))
    }

    pub fn send(self, result: Result<Value, TaskError>) {
        (self.0)(result)
    }
}

impl fmt::Debug for Settle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Settle(<fn>)")
    }
}

/// Control handle for a live execution unit.
pub trait UnitHandle: Send + Sync {
    /// Force the unit to stop. Idempotent. Once called, the unit must not
    /// settle.
    fn terminate(&self);
}

/// Creates execution units. Implementations must not block.
pub trait UnitFactory: Send + Sync {
    /// Start a unit running `payload`.
    ///
    /// The unit calls `settle` from its own thread of execution once the body
    /// finishes, never from inside `spawn` itself: the scheduler is still
    /// holding its bookkeeping lock while this runs.
    fn spawn(
        &self,
        payload: TaskPayload,
        settle: Settle,
    ) -> Result<Box<dyn UnitHandle>, DispatchError>;

    /// Units that were terminated but whose work has not actually stopped.
    fn lingering(&self) -> usize {
        0
    }
}
