//! Task functions the demo registers with its execution units.

use serde_json::{json, Value};
use taskpool_scheduler::{lock, unlock, FunctionRegistry, Invocation, RegistryError, TaskError};

pub const COUNT_TO: &str = "count_to";
pub const LOCKED_SUM: &str = "locked_sum";

/// Busy loop counting to `n`; stops early once the unit is terminated.
fn count_to(inv: &mut Invocation) -> Result<Value, TaskError> {
    let n: u64 = inv.arg(0)?;
    let mut s = 0u64;
    for i in 0..n {
        if i % 65_536 == 0 && inv.is_terminated() {
            return Err(TaskError::Cancelled);
        }
        s = std::hint::black_box(s + 1);
    }
    Ok(json!(s))
}

/// Sum `start..end` locally, then add it to shared slot 0 of the float view at
/// shared region 1 while holding the lock at shared region 0.
fn locked_sum(inv: &mut Invocation) -> Result<Value, TaskError> {
    let start: u64 = inv.arg(0)?;
    let end: u64 = inv.arg(1)?;
    let local: f64 = (start..end).map(|i| i as f64).sum();

    let cell = inv.lock_cell(0)?;
    let total = inv.float64(1)?;
    lock(cell);
    total.store(0, total.load(0) + local);
    unlock(cell);

    Ok(json!(local))
}

pub fn registry() -> Result<FunctionRegistry, RegistryError> {
    let mut registry = FunctionRegistry::new();
    registry.register(COUNT_TO, count_to)?;
    registry.register(LOCKED_SUM, locked_sum)?;
    Ok(registry)
}
