use core::num::NonZeroUsize;
use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result,
    pool::{
        handle::{self, TaskHandle},
        queue::{Completion, Job, JobQueue},
    },
};

struct Shared {
    limit: NonZeroUsize,
    queue: JobQueue,
}

/// A bounded-concurrency pool for blocking closures.
///
/// Submission never blocks: accepted tasks join an unbounded queue that at
/// most `limit` worker threads drain. Workers start on demand and exit once
/// the queue is empty, so an idle pool holds no threads. Tasks beyond the
/// limit wait in the queue without holding a thread and are never rejected
/// for load.
///
/// ## Features
/// - ✅ Thread-safe: submit from any number of threads, via `&self` or a clone
/// - ✅ Race-free shutdown: [`Self::close`] waits for exactly the tasks
///   accepted before it
/// - ✅ Panic-safe: a panicking task does not take its worker down
/// - ✅ Never more than `limit` OS threads, whatever the backlog
/// - ❌ No cancellation of started tasks
/// - ❌ No fairness guarantee among pending tasks
///
/// ## Recommended When
/// - Task bodies block (I/O, sleeps, locks) and should not stall an async
///   runtime
/// - You need a hard ceiling on parallel work
///
/// ## See Also
/// - [`TokioWorkerPool`]
///
/// [`TokioWorkerPool`]: crate::TokioWorkerPool
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Creates an open pool that runs at most `limit` tasks at once.
    ///
    /// # Example
    /// ```
    /// use core::num::NonZeroUsize;
    /// use corral::{AtomicCounter, WorkerPool};
    /// use std::sync::Arc;
    ///
    /// let pool = WorkerPool::new(NonZeroUsize::new(2).unwrap());
    /// let done = Arc::new(AtomicCounter::new(0));
    ///
    /// for _ in 0..5 {
    ///     let done = Arc::clone(&done);
    ///     pool.submit(move || {
    ///         done.increment();
    ///         Ok::<_, ()>(())
    ///     })
    ///     .unwrap();
    /// }
    ///
    /// pool.close();
    /// assert_eq!(done.value(), 5);
    /// ```
    pub fn new(limit: NonZeroUsize) -> Self {
        #[cfg(feature = "tracing")]
        tracing::debug!(limit = limit.get(), "Creating worker pool");

        Self {
            shared: Arc::new(Shared {
                limit,
                queue: JobQueue::new(limit),
            }),
        }
    }

    /// A fallible version of [`Self::new`] taking a plain `usize`.
    ///
    /// # Errors
    /// - [`Error::InvalidLimit`] if `limit` is zero
    pub fn try_new(limit: usize) -> Result<Self> {
        NonZeroUsize::new(limit)
            .map(Self::new)
            .ok_or(Error::InvalidLimit { limit })
    }

    /// Submits a fire-and-forget task.
    ///
    /// Returns as soon as the task is accepted; it does not wait for the task
    /// to start or finish. An `Err` returned by the task is discarded. Callers
    /// that care about the outcome should capture their own state in the
    /// closure, or use [`Self::submit_with_handle`].
    ///
    /// # Errors
    /// - [`Error::PoolClosed`] if [`Self::close`] has been called. The task is
    ///   dropped without running.
    /// - [`Error::SpawnFailed`] if the OS refused to start a worker while none
    ///   was running. The task is dropped without running and is not counted
    ///   as outstanding.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn submit<F, E>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> core::result::Result<(), E> + Send + 'static,
        E: Send + 'static,
    {
        self.spawn(move || {
            let _ = task();
        })
    }

    /// Submits a task and returns a handle to observe its outcome.
    ///
    /// Behaves exactly like [`Self::submit`] otherwise; dropping the handle
    /// turns this back into a fire-and-forget submission.
    ///
    /// # Errors
    /// Same as [`Self::submit`].
    ///
    /// # Example
    /// ```
    /// use core::num::NonZeroUsize;
    /// use corral::{TaskError, WorkerPool};
    ///
    /// let pool = WorkerPool::new(NonZeroUsize::new(1).unwrap());
    /// let handle = pool.submit_with_handle(|| Err("disk full")).unwrap();
    ///
    /// assert_eq!(handle.join(), Err(TaskError::Failed("disk full")));
    /// pool.close();
    /// ```
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn submit_with_handle<F, E>(&self, task: F) -> Result<TaskHandle<E>>
    where
        F: FnOnce() -> core::result::Result<(), E> + Send + 'static,
        E: Send + 'static,
    {
        let (reporter, handle) = handle::channel();
        self.spawn(move || reporter.report(task()))?;
        Ok(handle)
    }

    /// Stops accepting tasks and blocks until every accepted task finished.
    ///
    /// Running tasks are not interrupted. Calling `close` again is harmless:
    /// it returns once nothing is outstanding.
    pub fn close(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            outstanding = self.outstanding(),
            "Closing worker pool, draining outstanding tasks"
        );

        self.shared.queue.close_and_wait();

        #[cfg(feature = "tracing")]
        tracing::debug!("Worker pool drained");
    }

    /// Number of tasks currently running on a worker.
    ///
    /// Tasks still waiting in the queue are not included. The value is a
    /// snapshot and may be stale by the time it is read.
    pub fn active_tasks(&self) -> usize {
        self.shared.queue.active()
    }

    /// Number of accepted tasks that have not finished, whether running or
    /// still queued.
    pub fn outstanding(&self) -> usize {
        self.shared.queue.outstanding()
    }

    /// The concurrency limit this pool was created with.
    pub fn limit(&self) -> NonZeroUsize {
        self.shared.limit
    }

    /// Returns `true` once [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.queue.is_closed()
    }

    fn spawn(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let accepted = self
            .shared
            .queue
            .accept(Box::new(job), move || start_worker(shared));

        #[cfg(feature = "tracing")]
        match &accepted {
            Err(Error::PoolClosed) => tracing::debug!("Rejecting task: pool is closed"),
            Err(e) => tracing::error!("Failed to start worker thread: {e}"),
            Ok(()) => {}
        }

        accepted
    }
}

fn start_worker(shared: Arc<Shared>) -> io::Result<()> {
    thread::Builder::new()
        .name("corral-worker".into())
        .spawn(move || work(&shared))
        .map(drop)
}

fn work(shared: &Shared) {
    while let Some(job) = shared.queue.next_job() {
        let _completion = Completion::adopt(&shared.queue);

        #[cfg(feature = "tracing")]
        tracing::trace!("Task admitted");

        run(job);
    }
}

/// Runs one job, keeping a panic inside it from unwinding the worker. The
/// job's captures, including any result reporter, are dropped during the
/// unwind, which is what a handle observes as a panic.
fn run(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        #[cfg(feature = "tracing")]
        tracing::warn!("Task panicked");
    }
}

impl core::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("limit", &self.limit())
            .field("active_tasks", &self.active_tasks())
            .field("outstanding", &self.outstanding())
            .field("closed", &self.is_closed())
            .finish()
    }
}
