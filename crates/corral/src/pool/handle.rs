use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};

use crate::TaskError;

/// Receives the result of a single task submitted with
/// [`WorkerPool::submit_with_handle`].
///
/// Dropping the handle does not affect the task; its result is then simply
/// discarded, exactly as with [`WorkerPool::submit`].
///
/// [`WorkerPool::submit_with_handle`]: crate::WorkerPool::submit_with_handle
/// [`WorkerPool::submit`]: crate::WorkerPool::submit
#[derive(Debug)]
pub struct TaskHandle<E> {
    rx: Receiver<Result<(), E>>,
}

impl<E> TaskHandle<E> {
    /// Blocks until the task finishes and returns its outcome.
    ///
    /// # Errors
    /// - [`TaskError::Failed`] if the task returned an error
    /// - [`TaskError::Panicked`] if the task panicked before returning
    pub fn join(self) -> Result<(), TaskError<E>> {
        match self.rx.recv() {
            Ok(outcome) => outcome.map_err(TaskError::Failed),
            Err(_) => Err(TaskError::Panicked),
        }
    }

    /// Returns the outcome if the task already finished, without blocking.
    ///
    /// While the task is still pending or running, the handle is handed back
    /// unchanged as `Err(self)` so the caller can try again later.
    pub fn try_join(self) -> Result<Result<(), TaskError<E>>, Self> {
        match self.rx.try_recv() {
            Ok(outcome) => Ok(outcome.map_err(TaskError::Failed)),
            Err(TryRecvError::Empty) => Err(self),
            Err(TryRecvError::Disconnected) => Ok(Err(TaskError::Panicked)),
        }
    }
}

/// Sending half kept by the worker thread.
pub(crate) struct Reporter<E> {
    tx: SyncSender<Result<(), E>>,
}

impl<E> Reporter<E> {
    pub(crate) fn report(self, outcome: Result<(), E>) {
        // Capacity one and a single send: this never blocks. A dropped handle
        // just means nobody is listening.
        let _ = self.tx.send(outcome);
    }
}

pub(crate) fn channel<E>() -> (Reporter<E>, TaskHandle<E>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (Reporter { tx }, TaskHandle { rx })
}
