use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use serde_json::Value;
use taskpool_core::UnitConfig;
use tracing::{debug, warn};

use crate::task::{DispatchError, TaskError, TaskPayload};
use crate::unit::{FunctionRegistry, Invocation, Settle, UnitFactory, UnitHandle};

/// Runs every task on its own dedicated OS thread.
///
/// Threads cannot be killed, so `terminate` raises a flag the body can poll via
/// [`Invocation::is_terminated`], and the unit never settles afterwards. A body
/// that ignores the flag keeps its thread busy until it returns; such threads
/// are counted by [`lingering_units`](Self::lingering_units) and surface in the
/// scheduler metrics.
pub struct ThreadUnitFactory {
    registry: Arc<FunctionRegistry>,
    config: UnitConfig,
    spawned: AtomicU64,
    lingering: Arc<AtomicUsize>,
}

impl ThreadUnitFactory {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self::with_config(registry, UnitConfig::default())
    }

    pub fn with_config(registry: Arc<FunctionRegistry>, config: UnitConfig) -> Self {
        Self {
            registry,
            config,
            spawned: AtomicU64::new(0),
            lingering: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of unit threads started so far.
    pub fn units_spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Terminated units whose thread is still running the body.
    pub fn lingering_units(&self) -> usize {
        self.lingering.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Terminated,
    Exited,
}

/// Shared between a unit thread and its handle.
struct Lifecycle {
    phase: Mutex<Phase>,
    /// Polled by the body through its invocation.
    terminated: Arc<AtomicBool>,
    lingering: Arc<AtomicUsize>,
}

impl Lifecycle {
    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn terminate(&self) {
        let mut phase = self.phase();
        if *phase == Phase::Running {
            *phase = Phase::Terminated;
            self.terminated.store(true, Ordering::Release);
            self.lingering.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Mark the thread as done. Returns whether it was terminated first.
    fn exit(&self) -> bool {
        let mut phase = self.phase();
        let terminated = *phase == Phase::Terminated;
        if terminated {
            self.lingering.fetch_sub(1, Ordering::Relaxed);
        }
        *phase = Phase::Exited;
        terminated
    }
}

struct ThreadUnitHandle {
    lifecycle: Arc<Lifecycle>,
}

impl UnitHandle for ThreadUnitHandle {
    fn terminate(&self) {
        self.lifecycle.terminate();
    }
}

impl UnitFactory for ThreadUnitFactory {
    fn spawn(
        &self,
        payload: TaskPayload,
        settle: Settle,
    ) -> Result<Box<dyn UnitHandle>, DispatchError> {
        let id = payload.id;
        let stack_size = self
            .config
            .stack_size_bytes()
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;

        let name = format!("{}-{}", self.config.thread_name_prefix, id.get());
        let mut builder = thread::Builder::new().name(name);
        if let Some(bytes) = stack_size {
            builder = builder.stack_size(bytes);
        }

        let lifecycle = Arc::new(Lifecycle {
            phase: Mutex::new(Phase::Running),
            terminated: Arc::new(AtomicBool::new(false)),
            lingering: Arc::clone(&self.lingering),
        });

        let registry = Arc::clone(&self.registry);
        let unit = Arc::clone(&lifecycle);
        builder
            .spawn(move || {
                let subscription = payload.descriptor.subscription.clone();
                let result = run_payload(&registry, payload, Arc::clone(&unit.terminated));
                if unit.exit() {
                    debug!(task_id = %id, "unit terminated, discarding result");
                    return;
                }
                if let (Some(subscription), Ok(value)) = (&subscription, &result) {
                    let notified =
                        panic::catch_unwind(AssertUnwindSafe(|| subscription.notify(value)));
                    if let Err(payload) = notified {
                        let msg = panic_message(payload.as_ref());
                        warn!(task_id = %id, panic = %msg, "subscription panicked");
                    }
                }
                settle.send(result);
            })
            .map_err(|e| DispatchError::Spawn(e.to_string()))?;

        self.spawned.fetch_add(1, Ordering::Relaxed);
        debug!(task_id = %id, "unit thread started");

        Ok(Box::new(ThreadUnitHandle { lifecycle }))
    }

    fn lingering(&self) -> usize {
        self.lingering_units()
    }
}

/// Resolve the body and helpers, then run the body with panics caught.
fn run_payload(
    registry: &FunctionRegistry,
    payload: TaskPayload,
    terminated: Arc<AtomicBool>,
) -> Result<Value, TaskError> {
    let TaskPayload { id, descriptor } = payload;

    let body = registry.resolve(&descriptor.body)?;
    let mut helpers = HashMap::with_capacity(descriptor.context.len());
    for helper in &descriptor.context {
        helpers.insert(helper.name.clone(), registry.resolve(&helper.body)?);
    }

    let mut invocation = Invocation::new(
        id,
        descriptor.args,
        Arc::new(helpers),
        descriptor.transfer,
        descriptor.shared,
        terminated,
    );

    match panic::catch_unwind(AssertUnwindSafe(|| body(&mut invocation))) {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            warn!(task_id = %id, panic = %msg, "task body panicked");
            Err(TaskError::Panicked(msg))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
