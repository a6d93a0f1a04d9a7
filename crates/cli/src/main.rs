mod cli;
mod tasks;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use taskpool_core::config::load_dotenv;
use taskpool_scheduler::{
    create_lock, split, Config, Scheduler, SharedFloat64Array, Submission, TaskDescriptor,
    TaskError, TaskId,
};

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => Config::from_toml_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => Config::from_env(),
    };
    if args.max_concurrency.is_some() {
        config.scheduler.max_concurrency = args.max_concurrency;
    }
    config.log_summary();

    let registry = Arc::new(tasks::registry().context("failed to register task functions")?);
    let scheduler =
        Scheduler::threaded(&config, registry).context("failed to start scheduler")?;
    info!(ceiling = scheduler.ceiling(), tasks = args.tasks, "scheduler ready");

    let deadline = args
        .timeout_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    // Batch 1: independent counting tasks, with progress logged as units finish.
    let finished = Arc::new(AtomicUsize::new(0));
    let batch = args.tasks;
    let subs: Vec<Submission> = (0..args.tasks)
        .map(|_| {
            let finished = Arc::clone(&finished);
            let task = TaskDescriptor::new(tasks::COUNT_TO)
                .arg(args.work)
                .subscribe(move |_| {
                    let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(done, batch, "count_to finished");
                });
            scheduler.submit(task)
        })
        .collect();
    println!("count_to({}) x {}", args.work, args.tasks);
    for (id, result) in settle(&scheduler, subs, deadline).await {
        print_result(id, &result);
    }

    // Batch 2: partial sums accumulated into shared memory under the lock.
    let cell = create_lock();
    let total = SharedFloat64Array::zeroed(1);
    let subs: Vec<Submission> = split(args.work as usize, args.tasks)
        .into_iter()
        .map(|range| {
            let task = TaskDescriptor::new(tasks::LOCKED_SUM)
                .args([range.start as u64, range.end as u64])
                .shared(cell.clone())
                .shared(total.clone());
            scheduler.submit(task)
        })
        .collect();
    println!("locked_sum(0..{}) over {} tasks", args.work, args.tasks);
    let mut all_ok = true;
    for (id, result) in settle(&scheduler, subs, deadline).await {
        all_ok &= result.is_ok();
        print_result(id, &result);
    }
    if all_ok {
        println!("  shared total = {}", total.load(0));
    } else {
        println!("  shared total = {} (incomplete)", total.load(0));
    }

    let metrics = serde_json::to_string_pretty(&scheduler.metrics())
        .context("failed to serialize metrics")?;
    println!("{metrics}");
    Ok(())
}

/// Await every submission in order. Once `deadline` passes, everything still
/// outstanding is cancelled and reported as such.
async fn settle(
    scheduler: &Scheduler,
    subs: Vec<Submission>,
    deadline: Option<Instant>,
) -> Vec<(TaskId, Result<Value, TaskError>)> {
    let mut results = Vec::with_capacity(subs.len());
    let mut timed_out = false;
    for sub in subs {
        let Submission { id, mut result } = sub;
        let outcome = match deadline {
            Some(at) if !timed_out => match timeout_at(at, &mut result).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    timed_out = true;
                    let cancelled = scheduler.cancel_all();
                    warn!(cancelled, "deadline passed, cancelling outstanding tasks");
                    result.await
                }
            },
            _ => result.await,
        };
        results.push((id, outcome));
    }
    results
}

fn print_result(id: TaskId, result: &Result<Value, TaskError>) {
    match result {
        Ok(value) => println!("  {id}  ok     {value}"),
        Err(e) => println!("  {id}  error  {e}"),
    }
}
