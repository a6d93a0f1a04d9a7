pub mod scheduler;
pub mod task;
pub mod unit;

pub use scheduler::{
    Cancellation, Scheduler, SchedulerError, SchedulerMetrics, Submission, TaskHandle,
};
pub use task::{
    DispatchError, Helper, Subscription, TaskBody, TaskDescriptor, TaskError, TaskFn, TaskPayload,
};
pub use taskpool_core::{split, Config, SchedulerConfig, TaskId, UnitConfig};
pub use taskpool_sync::{
    create_lock, lock, unlock, LockCell, SharedFloat64Array, SharedInt32Array, SharedRegion,
};
pub use unit::{
    FunctionRegistry, Invocation, RegistryError, Settle, ThreadUnitFactory, UnitFactory,
    UnitHandle,
};
