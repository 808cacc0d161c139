mod config;
mod run;
mod telemetry;

use anyhow::Context;
use clap::Parser;
use config::{CliArgs, DemoConfig, PoolRuntime};
use corral::AtomicCounter;
use run::RunSummary;
use telemetry::init_telemetry;
use tokio::runtime::Builder;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = DemoConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let counter = AtomicCounter::new(0);
    counter.increment();
    tracing::info!("Counter value: {}", counter.value());

    let summary = match config.runtime {
        PoolRuntime::Thread => run::run_threaded(&config),
        PoolRuntime::Tokio => {
            let runtime = Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to build tokio runtime")?;
            runtime.block_on(run::run_tokio(&config))?
        }
    };

    log_summary(&summary);
    Ok(())
}

fn log_startup_info(config: &DemoConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting demo with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting demo: {} tasks on a {:?} pool limited to {}",
            config.tasks,
            config.runtime,
            config.limit
        );
    }
}

fn log_summary(summary: &RunSummary) {
    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        peak_concurrency = summary.peak_concurrency,
        elapsed = ?summary.elapsed,
        "All tasks drained"
    );

    if summary.rejected_after_close {
        tracing::info!("Submitting after close was rejected as expected");
    } else {
        tracing::warn!("Submitting after close was not rejected");
    }
}
