use std::env;
use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str) -> Option<usize> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub units: UnitConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TASKPOOL_PROFILE`. When set (e.g. `BATCH`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TASKPOOL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            scheduler: SchedulerConfig::from_env_profiled(p),
            units: UnitConfig::from_env_profiled(p),
        }
    }

    /// Parse a TOML document with `[scheduler]` and `[units]` tables.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() {
            "default"
        } else {
            &self.profile
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        match self.scheduler.max_concurrency {
            Some(n) => tracing::info!("  scheduler:   max_concurrency={}", n),
            None => tracing::info!("  scheduler:   max_concurrency=auto"),
        }
        tracing::info!(
            "  units:       thread_prefix={}, stack_kb={}",
            self.units.thread_name_prefix,
            self.units
                .stack_size_kb
                .map(|kb| kb.to_string())
                .unwrap_or_else(|| "(default)".to_string())
        );
    }
}

// ── Scheduler ─────────────────────────────────────────────────

/// Scheduler configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ceiling on simultaneously running tasks. `None` = available parallelism.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

impl SchedulerConfig {
    pub fn with_max_concurrency(max: usize) -> Self {
        Self { max_concurrency: Some(max) }
    }

    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_concurrency: profiled_env_usize(p, "TASKPOOL_MAX_CONCURRENCY"),
        }
    }

    /// Resolve the concurrency ceiling. An explicit zero is rejected.
    pub fn resolved_max_concurrency(&self) -> Result<NonZeroUsize, ConfigError> {
        match self.max_concurrency {
            Some(n) => NonZeroUsize::new(n).ok_or(ConfigError::InvalidConcurrency),
            None => Ok(std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)),
        }
    }
}

// ── Execution units ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Prefix for unit thread names; the task id is appended.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
    /// Stack size for unit threads in KiB. `None` = platform default.
    #[serde(default)]
    pub stack_size_kb: Option<usize>,
}

fn default_thread_name_prefix() -> String {
    "taskpool-unit".to_string()
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: default_thread_name_prefix(),
            stack_size_kb: None,
        }
    }
}

impl UnitConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            thread_name_prefix: profiled_env_or(
                p,
                "TASKPOOL_THREAD_PREFIX",
                &default_thread_name_prefix(),
            ),
            stack_size_kb: profiled_env_usize(p, "TASKPOOL_THREAD_STACK_KB"),
        }
    }

    /// Requested stack size in bytes. Rejects sizes that overflow `usize`.
    pub fn stack_size_bytes(&self) -> Result<Option<usize>, ConfigError> {
        match self.stack_size_kb {
            Some(kb) => kb
                .checked_mul(1024)
                .map(Some)
                .ok_or(ConfigError::InvalidStackSize(kb)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_defaults_to_auto() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrency, None);
        assert!(config.resolved_max_concurrency().unwrap().get() >= 1);
    }

    #[test]
    fn explicit_ceiling_is_kept() {
        let config = SchedulerConfig::with_max_concurrency(3);
        assert_eq!(config.resolved_max_concurrency().unwrap().get(), 3);
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let config = SchedulerConfig::with_max_concurrency(0);
        assert!(matches!(
            config.resolved_max_concurrency(),
            Err(ConfigError::InvalidConcurrency)
        ));
    }

    #[test]
    fn stack_size_in_bytes() {
        let mut units = UnitConfig::default();
        assert_eq!(units.stack_size_bytes().unwrap(), None);

        units.stack_size_kb = Some(256);
        assert_eq!(units.stack_size_bytes().unwrap(), Some(256 * 1024));

        units.stack_size_kb = Some(usize::MAX);
        assert!(matches!(
            units.stack_size_bytes(),
            Err(ConfigError::InvalidStackSize(kb)) if kb == usize::MAX
        ));
    }

    #[test]
    fn parse_toml() {
        let config = Config::from_toml_str(
            r#"
            [scheduler]
            max_concurrency = 4

            [units]
            stack_size_kb = 512
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.max_concurrency, Some(4));
        assert_eq!(config.units.stack_size_kb, Some(512));
        assert_eq!(config.units.thread_name_prefix, "taskpool-unit");
        assert_eq!(config.profile_label(), "default");
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.units, UnitConfig::default());
    }

    #[test]
    fn profiled_env_prefers_prefixed_key() {
        // Unique key names so parallel tests don't race on the environment.
        env::set_var("TPTEST_TASKPOOL_MAX_CONCURRENCY", "6");
        env::set_var("TASKPOOL_THREAD_PREFIX", "");
        let config = Config::for_profile("tptest");
        assert_eq!(config.profile, "TPTEST");
        assert_eq!(config.scheduler.max_concurrency, Some(6));
        assert_eq!(config.units.thread_name_prefix, "taskpool-unit");
        env::remove_var("TPTEST_TASKPOOL_MAX_CONCURRENCY");
    }
}
