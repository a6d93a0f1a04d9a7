use clap::Parser;

/// Run a batch of tasks through the bounded worker pool.
///
/// Submits `--tasks` counting tasks, then a lock-protected summation that
/// splits `0..--work` across the same number of tasks, and prints every
/// result plus the scheduler metrics.
#[derive(Parser, Debug)]
#[command(name = "taskpool", version, about = "Bounded-concurrency task pool demo")]
pub struct CliArgs {
    /// Maximum tasks running at once (default: available parallelism)
    #[arg(long, env = "TASKPOOL_MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Number of tasks to submit per batch
    #[arg(long, default_value_t = 8)]
    pub tasks: usize,

    /// Loop iterations per counting task, and the summation range
    #[arg(long, default_value_t = 1_000_000)]
    pub work: u64,

    /// Cancel whatever is still outstanding after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Path to a TOML config file (default: read TASKPOOL_* env vars)
    #[arg(long)]
    pub config: Option<String>,
}
