//! Shared-memory coordination for code running inside execution units.
//!
//! - `lock`: binary mutex over one shared atomic cell (CAS + wait/notify)
//! - `shared`: fixed-length typed arrays of atomic slots shared by reference

pub mod lock;
pub mod shared;

pub use lock::{create_lock, lock, unlock, LockCell, LockGuard, WaitResult, LOCKED, UNLOCKED};
pub use shared::{SharedFloat64Array, SharedInt32Array, SharedRegion};
