pub mod config;
pub mod error;
pub mod partition;
pub mod task_id;

pub use config::{Config, SchedulerConfig, UnitConfig};
pub use error::ConfigError;
pub use partition::split;
pub use task_id::TaskId;
