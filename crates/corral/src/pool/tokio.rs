use core::{future::Future, num::NonZeroUsize};
use std::sync::Arc;

use tokio::{runtime::Handle, sync::Semaphore, task::JoinHandle};
use tokio_util::task::TaskTracker;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result,
    mutex::{Mutex, lock},
};

/// A bounded-concurrency pool for async tasks on the
/// [`tokio`](https://docs.rs/tokio) runtime.
///
/// Each accepted task is spawned on the submitting caller's runtime and first
/// awaits one of `limit` semaphore permits. Submission never waits for a
/// permit, so the backlog of admitted-but-waiting tasks is unbounded.
///
/// Acceptance and the closed check happen under one lock, and the task is
/// registered with a [`TaskTracker`] before that lock is released. Once
/// [`Self::close`] has flipped the flag, nothing new can slip in, and the
/// drain waits for exactly the tasks accepted before it.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Race-free shutdown
/// - ✅ Opt-in per-task results via Tokio's [`JoinHandle`]
/// - ❌ No cancellation of started tasks
///
/// ## See Also
/// - [`WorkerPool`]
///
/// [`WorkerPool`]: crate::WorkerPool
pub struct TokioWorkerPool {
    limit: NonZeroUsize,
    admission: Arc<Semaphore>,
    closed: Mutex<bool>,
    tasks: TaskTracker,
}

impl TokioWorkerPool {
    /// Creates an open pool that runs at most `limit` tasks at once.
    pub fn new(limit: NonZeroUsize) -> Self {
        #[cfg(feature = "tracing")]
        tracing::debug!(limit = limit.get(), "Creating tokio worker pool");

        Self {
            limit,
            admission: Arc::new(Semaphore::new(limit.get())),
            closed: Mutex::new(false),
            tasks: TaskTracker::new(),
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

    /// Submits a fire-and-forget task. An `Err` it resolves to is discarded.
    ///
    /// # Errors
    /// - [`Error::PoolClosed`] if [`Self::close`] has been called
    /// - [`Error::RuntimeUnavailable`] if called outside a Tokio runtime on an
    ///   open pool
    ///
    /// # Example
    /// ```
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// use core::num::NonZeroUsize;
    /// use corral::TokioWorkerPool;
    ///
    /// let pool = TokioWorkerPool::new(NonZeroUsize::new(4).unwrap());
    /// pool.submit(async { Ok::<_, ()>(()) }).unwrap();
    /// pool.close().await;
    /// assert!(pool.submit(async { Ok::<_, ()>(()) }).is_err());
    /// # });
    /// ```
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn submit<Fut, E>(&self, task: Fut) -> Result<()>
    where
        Fut: Future<Output = core::result::Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        self.spawn(async move {
            let _ = task.await;
        })
        .map(drop)
    }

    /// Submits a task and returns Tokio's [`JoinHandle`] for its outcome.
    ///
    /// Awaiting the handle yields `Ok(task_result)`, or a
    /// [`tokio::task::JoinError`] if the task panicked or the runtime shut
    /// down first. Dropping the handle detaches the task.
    ///
    /// # Errors
    /// Same as [`Self::submit`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    pub fn submit_with_handle<Fut, E>(
        &self,
        task: Fut,
    ) -> Result<JoinHandle<core::result::Result<(), E>>>
    where
        Fut: Future<Output = core::result::Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        self.spawn(task)
    }

    /// Stops accepting tasks and waits until every accepted task finished.
    ///
    /// Calling `close` again is harmless.
    pub async fn close(&self) {
        {
            let mut closed = lock(&self.closed);
            *closed = true;
            self.tasks.close();
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            outstanding = self.outstanding(),
            "Closing tokio worker pool, draining outstanding tasks"
        );

        self.tasks.wait().await;

        #[cfg(feature = "tracing")]
        tracing::debug!("Tokio worker pool drained");
    }

    /// Number of tasks currently holding a permit. A snapshot.
    pub fn active_tasks(&self) -> usize {
        self.limit.get() - self.admission.available_permits()
    }

    /// Number of accepted tasks that have not finished.
    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }

    /// The concurrency limit this pool was created with.
    pub fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Returns `true` once [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        *lock(&self.closed)
    }

    fn spawn<Fut>(&self, task: Fut) -> Result<JoinHandle<Fut::Output>>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let closed = lock(&self.closed);
        if *closed {
            #[cfg(feature = "tracing")]
            tracing::debug!("Rejecting task: pool is closed");
            return Err(Error::PoolClosed);
        }

        let runtime = Handle::try_current().map_err(|_| Error::RuntimeUnavailable)?;

        let admission = Arc::clone(&self.admission);
        let handle = self.tasks.spawn_on(
            async move {
                // The semaphore is never closed, so this always holds a permit.
                let _permit = admission.acquire_owned().await;

                #[cfg(feature = "tracing")]
                tracing::trace!("Task admitted");

                task.await
            },
            &runtime,
        );
        drop(closed);

        Ok(handle)
    }
}

impl core::fmt::Debug for TokioWorkerPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokioWorkerPool")
            .field("limit", &self.limit)
            .field("active_tasks", &self.active_tasks())
            .field("outstanding", &self.outstanding())
            .field("closed", &self.is_closed())
            .finish()
    }
}
