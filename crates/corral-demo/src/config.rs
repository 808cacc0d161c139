use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::{num::NonZeroUsize, time::Duration};

/// Which pool implementation drives the demo.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolRuntime {
    /// One OS thread per task, gated by a blocking semaphore.
    Thread,
    /// One Tokio task per task, gated by an async semaphore.
    Tokio,
}

/// Runtime configuration for the `corral-demo` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is honored), with defaults reproducing the classic "five
/// one-second tasks on two workers" run.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "corral-demo",
    version,
    about = "Runs a batch of tasks through a bounded corral pool"
)]
pub struct CliArgs {
    /// Maximum number of tasks allowed to run at the same time.
    ///
    /// Environment variable: `POOL_LIMIT`
    #[arg(long, env = "POOL_LIMIT", default_value_t = 2)]
    pub limit: usize,

    /// Number of tasks to submit before closing the pool.
    ///
    /// Environment variable: `NUM_TASKS`
    #[arg(long, env = "NUM_TASKS", default_value_t = 5)]
    pub tasks: usize,

    /// How long each task sleeps, in milliseconds.
    ///
    /// Environment variable: `TASK_MILLIS`
    #[arg(long, env = "TASK_MILLIS", default_value_t = 1_000)]
    pub task_millis: u64,

    /// Make every n-th task return an error. Zero disables failures.
    ///
    /// Failed tasks are counted by the tasks themselves; the pool discards
    /// their errors.
    ///
    /// Environment variable: `FAIL_EVERY`
    #[arg(long, env = "FAIL_EVERY", default_value_t = 0)]
    pub fail_every: usize,

    /// Pool implementation to use.
    ///
    /// Environment variable: `POOL_RUNTIME`
    #[arg(long, env = "POOL_RUNTIME", value_enum, default_value_t = PoolRuntime::Thread)]
    pub runtime: PoolRuntime,
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub limit: NonZeroUsize,
    pub tasks: usize,
    pub task_duration: Duration,
    pub fail_every: Option<NonZeroUsize>,
    pub runtime: PoolRuntime,
}

impl DemoConfig {
    /// Whether the task with the given zero-based index should fail.
    pub fn should_fail(&self, index: usize) -> bool {
        self.fail_every
            .is_some_and(|every| (index + 1) % every.get() == 0)
    }
}

impl TryFrom<CliArgs> for DemoConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let Some(limit) = NonZeroUsize::new(args.limit) else {
            bail!("POOL_LIMIT must be greater than 0");
        };

        if args.tasks == 0 {
            bail!("NUM_TASKS must be greater than 0");
        }

        Ok(Self {
            limit,
            tasks: args.tasks,
            task_duration: Duration::from_millis(args.task_millis),
            fail_every: NonZeroUsize::new(args.fail_every),
            runtime: args.runtime,
        })
    }
}
