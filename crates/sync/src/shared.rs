use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::lock::LockCell;

/// Fixed-length array of `i32` slots shared between the caller and execution
/// units. Clones are views onto the same memory.
///
/// Indexing out of bounds panics, as with slices.
#[derive(Debug, Clone)]
pub struct SharedInt32Array {
    slots: Arc<[AtomicI32]>,
}

impl SharedInt32Array {
    /// Zero-filled array of `len` slots.
    pub fn zeroed(len: usize) -> Self {
        Self::from_values(std::iter::repeat(0).take(len))
    }

    pub fn from_values(values: impl IntoIterator<Item = i32>) -> Self {
        let slots: Vec<AtomicI32> = values.into_iter().map(AtomicI32::new).collect();
        Self { slots: slots.into() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn load(&self, index: usize) -> i32 {
        self.slots[index].load(Ordering::SeqCst)
    }

    pub fn store(&self, index: usize, value: i32) {
        self.slots[index].store(value, Ordering::SeqCst);
    }

    /// Returns the previous value whether or not the exchange happened.
    pub fn compare_exchange(&self, index: usize, current: i32, new: i32) -> i32 {
        match self.slots[index].compare_exchange(current, new, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(prev) | Err(prev) => prev,
        }
    }

    pub fn fetch_add(&self, index: usize, delta: i32) -> i32 {
        self.slots[index].fetch_add(delta, Ordering::SeqCst)
    }

    pub fn fetch_max(&self, index: usize, value: i32) -> i32 {
        self.slots[index].fetch_max(value, Ordering::SeqCst)
    }

    pub fn to_vec(&self) -> Vec<i32> {
        self.slots.iter().map(|s| s.load(Ordering::SeqCst)).collect()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }
}

impl FromIterator<i32> for SharedInt32Array {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

/// Fixed-length array of `f64` slots shared between the caller and execution
/// units. Values are stored as their bit patterns in `AtomicU64`.
#[derive(Debug, Clone)]
pub struct SharedFloat64Array {
    slots: Arc<[AtomicU64]>,
}

impl SharedFloat64Array {
    pub fn zeroed(len: usize) -> Self {
        Self::from_values(std::iter::repeat(0.0).take(len))
    }

    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let slots: Vec<AtomicU64> = values
            .into_iter()
            .map(|v| AtomicU64::new(v.to_bits()))
            .collect();
        Self { slots: slots.into() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn load(&self, index: usize) -> f64 {
        f64::from_bits(self.slots[index].load(Ordering::SeqCst))
    }

    pub fn store(&self, index: usize, value: f64) {
        self.slots[index].store(value.to_bits(), Ordering::SeqCst);
    }

    /// Compares bit patterns, so `-0.0` and `0.0` differ and NaN can match itself.
    pub fn compare_exchange(&self, index: usize, current: f64, new: f64) -> f64 {
        match self.slots[index].compare_exchange(
            current.to_bits(),
            new.to_bits(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(prev) | Err(prev) => f64::from_bits(prev),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.slots
            .iter()
            .map(|s| f64::from_bits(s.load(Ordering::SeqCst)))
            .collect()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }
}

impl FromIterator<f64> for SharedFloat64Array {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

/// A memory region handed to an execution unit by reference rather than copied.
#[derive(Debug, Clone)]
pub enum SharedRegion {
    Lock(LockCell),
    Int32(SharedInt32Array),
    Float64(SharedFloat64Array),
}

impl SharedRegion {
    pub fn as_lock(&self) -> Option<&LockCell> {
        match self {
            SharedRegion::Lock(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn as_int32(&self) -> Option<&SharedInt32Array> {
        match self {
            SharedRegion::Int32(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_float64(&self) -> Option<&SharedFloat64Array> {
        match self {
            SharedRegion::Float64(view) => Some(view),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SharedRegion::Lock(_) => "lock",
            SharedRegion::Int32(_) => "int32",
            SharedRegion::Float64(_) => "float64",
        }
    }
}

impl From<LockCell> for SharedRegion {
    fn from(cell: LockCell) -> Self {
        SharedRegion::Lock(cell)
    }
}

impl From<SharedInt32Array> for SharedRegion {
    fn from(view: SharedInt32Array) -> Self {
        SharedRegion::Int32(view)
    }
}

impl From<SharedFloat64Array> for SharedRegion {
    fn from(view: SharedFloat64Array) -> Self {
        SharedRegion::Float64(view)
    }
}
