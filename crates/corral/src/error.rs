/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors a pool can report about itself.
///
/// Failures raised by task bodies are never represented here. They are either
/// discarded (fire-and-forget submission) or surfaced through a task handle as
/// a [`TaskError`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool has been closed and no longer accepts tasks.
    ///
    /// Recoverable: the caller may build a new pool or drop the task.
    #[error("pool is closed")]
    PoolClosed,

    /// A pool was requested with a concurrency limit of zero.
    #[error("invalid concurrency limit {limit}: must be at least 1")]
    InvalidLimit { limit: usize },

    /// The operating system refused to start a worker thread.
    ///
    /// The submission is rolled back, so the task is neither counted as
    /// outstanding nor executed.
    #[error("failed to spawn worker: {context}")]
    SpawnFailed { context: String },

    /// An async pool was used outside of a Tokio runtime.
    #[cfg_attr(docsrs, doc(cfg(feature = "async-tokio")))]
    #[cfg(feature = "async-tokio")]
    #[error("no Tokio runtime available to spawn the task on")]
    RuntimeUnavailable,
}

/// The outcome of a task observed through a handle, when it did not succeed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TaskError<E> {
    /// The task ran to completion and returned an error.
    #[error("task failed: {0}")]
    Failed(E),

    /// The task stopped before reporting a result, typically because it
    /// panicked.
    #[error("task panicked before reporting a result")]
    Panicked,
}

impl<E> TaskError<E> {
    /// Returns the task's own error, if it returned one.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Panicked => None,
        }
    }
}
