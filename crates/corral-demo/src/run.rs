//! Drives a batch of sleeping tasks through either pool flavor.
//!
//! Tasks report what happened to them through shared [`AtomicCounter`]s they
//! capture; the pool itself discards their errors.

use crate::config::DemoConfig;
use anyhow::anyhow;
use corral::{AtomicCounter, Error, TokioWorkerPool, WorkerPool};
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

/// Counters shared by every task of a run.
#[derive(Debug, Default)]
pub struct TaskStats {
    in_flight: AtomicCounter,
    peak: AtomicCounter,
    succeeded: AtomicCounter,
    failed: AtomicCounter,
}

impl TaskStats {
    fn enter(&self) {
        let now = self.in_flight.increment();
        // Lock-free max: retry until our value is no longer larger or the
        // swap lands.
        loop {
            let seen = self.peak.value();
            if now <= seen || self.peak.compare_and_swap(seen, now) {
                break;
            }
        }
    }

    fn exit(&self, outcome: &anyhow::Result<()>) {
        self.in_flight.decrement();
        match outcome {
            Ok(()) => self.succeeded.increment(),
            Err(_) => self.failed.increment(),
        };
    }
}

/// What a completed run observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: i64,
    pub failed: i64,
    pub peak_concurrency: i64,
    pub in_flight_after_close: i64,
    pub elapsed: Duration,
    pub rejected_after_close: bool,
}

impl RunSummary {
    fn collect(stats: &TaskStats, elapsed: Duration, rejected_after_close: bool) -> Self {
        Self {
            succeeded: stats.succeeded.value(),
            failed: stats.failed.value(),
            peak_concurrency: stats.peak.value(),
            in_flight_after_close: stats.in_flight.value(),
            elapsed,
            rejected_after_close,
        }
    }
}

fn task_outcome(index: usize, fail: bool) -> anyhow::Result<()> {
    if fail {
        Err(anyhow!("task {index} failed on purpose"))
    } else {
        Ok(())
    }
}

/// Runs the batch on a [`WorkerPool`], blocking until it has drained.
pub fn run_threaded(config: &DemoConfig) -> RunSummary {
    let pool = WorkerPool::new(config.limit);
    let stats = Arc::new(TaskStats::default());
    let start = Instant::now();

    for index in 0..config.tasks {
        let stats = Arc::clone(&stats);
        let duration = config.task_duration;
        let fail = config.should_fail(index);

        let submitted = pool.submit(move || {
            stats.enter();
            tracing::info!("Executing task {index}");
            thread::sleep(duration);
            let outcome = task_outcome(index, fail);
            stats.exit(&outcome);
            outcome
        });
        if let Err(e) = submitted {
            tracing::error!("Failed to submit task {index}: {e}");
        }
    }

    thread::sleep(config.task_duration / 2);
    tracing::info!(
        active = pool.active_tasks(),
        outstanding = pool.outstanding(),
        "Pool status mid-run"
    );

    pool.close();
    let elapsed = start.elapsed();

    let rejected = matches!(
        pool.submit(|| Ok::<_, anyhow::Error>(())),
        Err(Error::PoolClosed)
    );

    RunSummary::collect(&stats, elapsed, rejected)
}

/// Runs the batch on a [`TokioWorkerPool`] on the current runtime.
pub async fn run_tokio(config: &DemoConfig) -> anyhow::Result<RunSummary> {
    let pool = TokioWorkerPool::new(config.limit);
    let stats = Arc::new(TaskStats::default());
    let start = Instant::now();

    for index in 0..config.tasks {
        let stats = Arc::clone(&stats);
        let duration = config.task_duration;
        let fail = config.should_fail(index);

        let submitted = pool.submit(async move {
            stats.enter();
            tracing::info!("Executing task {index}");
            tokio::time::sleep(duration).await;
            let outcome = task_outcome(index, fail);
            stats.exit(&outcome);
            outcome
        });
        if let Err(e) = submitted {
            // Outside a runtime nothing will ever be accepted.
            if e != Error::PoolClosed {
                return Err(e.into());
            }
            tracing::error!("Failed to submit task {index}: {e}");
        }
    }

    tokio::time::sleep(config.task_duration / 2).await;
    tracing::info!(
        active = pool.active_tasks(),
        outstanding = pool.outstanding(),
        "Pool status mid-run"
    );

    pool.close().await;
    let elapsed = start.elapsed();

    let rejected = matches!(
        pool.submit(async { Ok::<_, anyhow::Error>(()) }),
        Err(Error::PoolClosed)
    );

    Ok(RunSummary::collect(&stats, elapsed, rejected))
}
