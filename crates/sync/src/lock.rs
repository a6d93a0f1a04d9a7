//! Binary mutex over a single shared integer cell.
//!
//! The cell holds [`UNLOCKED`] or [`LOCKED`]. [`lock`] tries a compare-and-swap
//! and, when the cell is already locked, parks on the cell until a notify
//! arrives, then retries the swap from the top. A wake-up only says the value
//! may have changed, so the swap is always re-validated.
//!
//! # Usage contract
//!
//! `lock` returns no ownership token. Calling [`unlock`] without holding the
//! lock (double unlock, unlock from a different owner) is not detected and
//! breaks mutual exclusion for every other party using the cell. Prefer
//! [`LockCell::guard`] where the critical section is lexically scoped.
//!
//! Acquisition order among contending waiters is unspecified: the wait queue
//! is a condition variable on the integer, not a ticketed queue.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

pub const UNLOCKED: i32 = 0;
pub const LOCKED: i32 = 1;

/// Outcome of [`LockCell::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// The cell no longer held the expected value; did not sleep.
    NotEqual,
    /// Slept and was woken by a notify.
    Woken,
}

#[derive(Debug, Default)]
struct Cell {
    state: AtomicI32,
    /// Guards the check-then-sleep in `wait` against a concurrent notify.
    parked: Mutex<()>,
    wakeup: Condvar,
}

/// Handle to a shared lock cell. Clones refer to the same cell.
#[derive(Debug, Clone, Default)]
pub struct LockCell {
    inner: Arc<Cell>,
}

impl LockCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw value of the cell.
    pub fn load(&self) -> i32 {
        self.inner.state.load(Ordering::SeqCst)
    }

    pub fn is_locked(&self) -> bool {
        self.load() == LOCKED
    }

    /// Single compare-and-swap attempt from unlocked to locked.
    pub fn try_lock(&self) -> bool {
        self.inner
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Block while the cell holds `expected`, until a notify arrives.
    ///
    /// Returns immediately with [`WaitResult::NotEqual`] if the value already
    /// differs. The comparison happens under the parking mutex, and `notify_one`
    /// takes the same mutex, so a store + notify cannot slip between the check
    /// and the sleep.
    pub fn wait(&self, expected: i32) -> WaitResult {
        let mut parked = self.inner.parked.lock();
        if self.inner.state.load(Ordering::SeqCst) != expected {
            return WaitResult::NotEqual;
        }
        self.inner.wakeup.wait(&mut parked);
        WaitResult::Woken
    }

    /// Wake at most one thread blocked in [`wait`](Self::wait). Returns whether
    /// a thread was woken.
    pub fn notify_one(&self) -> bool {
        let _parked = self.inner.parked.lock();
        self.inner.wakeup.notify_one()
    }

    /// Acquire the lock and release it when the guard drops.
    pub fn guard(&self) -> LockGuard<'_> {
        lock(self);
        LockGuard { cell: self }
    }

    /// Whether both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &LockCell) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Create a fresh shared cell, initially unlocked.
pub fn create_lock() -> LockCell {
    LockCell::new()
}

/// Acquire the lock, blocking the calling thread until it is free.
pub fn lock(cell: &LockCell) {
    while !cell.try_lock() {
        cell.wait(LOCKED);
    }
}

/// Release the lock and wake at most one waiter.
///
/// The caller must currently hold the lock; see the module docs.
pub fn unlock(cell: &LockCell) {
    cell.inner.state.store(UNLOCKED, Ordering::Release);
    cell.notify_one();
}

/// Releases the lock on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    cell: &'a LockCell,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        unlock(self.cell);
    }
}
