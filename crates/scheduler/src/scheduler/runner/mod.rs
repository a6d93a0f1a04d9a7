//! Scheduler runner -- queue, in-flight table and admission.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructors, state and accessors
//! - `dispatch`: submission, admission loop and completion handling
//! - `cancel`: targeted and bulk cancellation

mod cancel;
mod core;
mod dispatch;
#[cfg(test)]
mod tests;

pub use self::core::Scheduler;
