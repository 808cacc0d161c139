use core::num::NonZeroUsize;
use std::{collections::VecDeque, io};

use crate::{
    AtomicCounter, Error, Result,
    mutex::{Condvar, Mutex, lock, wait},
};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

struct State {
    closed: bool,
    outstanding: usize,
    workers: usize,
    jobs: VecDeque<Job>,
}

/// Accepted-but-unfinished work for a pool, plus the worker bookkeeping that
/// drains it.
///
/// The closed flag, the outstanding count, the pending jobs and the number of
/// live workers share one lock. Rejecting a closed pool, counting an accepted
/// task and deciding whether it needs a new worker is therefore a single step,
/// and a drain started by [`JobQueue::close_and_wait`] only ever waits on
/// tasks accepted before it.
///
/// Workers leave only when they find the queue empty, under the same lock, so
/// a pending job always has a live worker that will pick it up.
pub(crate) struct JobQueue {
    limit: NonZeroUsize,
    state: Mutex<State>,
    drained: Condvar,
    active: AtomicCounter,
}

impl JobQueue {
    pub(crate) fn new(limit: NonZeroUsize) -> Self {
        Self {
            limit,
            state: Mutex::new(State {
                closed: false,
                outstanding: 0,
                workers: 0,
                jobs: VecDeque::new(),
            }),
            drained: Condvar::new(),
            active: AtomicCounter::new(0),
        }
    }

    /// Queues `job`, unless the pool is closed.
    ///
    /// `start_worker` is called, with the lock held, when fewer than `limit`
    /// workers are alive. If it fails while no worker is alive the job is
    /// handed back as an error; otherwise a live worker will still run it.
    ///
    /// Every successful call must be balanced by exactly one [`Completion`]
    /// being dropped.
    pub(crate) fn accept(
        &self,
        job: Job,
        start_worker: impl FnOnce() -> io::Result<()>,
    ) -> Result<()> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(Error::PoolClosed);
        }

        if state.workers < self.limit.get() {
            match start_worker() {
                Ok(()) => state.workers += 1,
                Err(e) if state.workers == 0 => {
                    return Err(Error::SpawnFailed {
                        context: e.to_string(),
                    });
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        workers = state.workers,
                        "Failed to start extra worker, queueing on live workers: {_e}"
                    );
                }
            }
        }

        state.outstanding += 1;
        state.jobs.push_back(job);
        Ok(())
    }

    /// Takes the next pending job and counts it as active, or retires the
    /// calling worker if nothing is pending.
    pub(crate) fn next_job(&self) -> Option<Job> {
        let mut state = lock(&self.state);
        match state.jobs.pop_front() {
            Some(job) => {
                self.active.increment();
                Some(job)
            }
            None => {
                state.workers -= 1;
                None
            }
        }
    }

    /// Marks the pool closed, then blocks until no task is outstanding.
    pub(crate) fn close_and_wait(&self) {
        let mut state = lock(&self.state);
        state.closed = true;
        while state.outstanding > 0 {
            state = wait(&self.drained, state);
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    pub(crate) fn outstanding(&self) -> usize {
        lock(&self.state).outstanding
    }

    /// Number of jobs currently running. A lock-free snapshot.
    pub(crate) fn active(&self) -> usize {
        usize::try_from(self.active.value()).unwrap_or(0)
    }

    fn finish(&self) {
        // Leave the active count before the task stops being outstanding, so
        // nothing is reported active once a drain returns.
        self.active.decrement();

        let mut state = lock(&self.state);
        state.outstanding -= 1;
        if state.outstanding == 0 {
            drop(state);
            self.drained.notify_all();
        }
    }
}

/// Owns one job taken by [`JobQueue::next_job`]. Dropping it (normally or
/// while unwinding) marks the task finished and wakes drain waiters once
/// nothing remains.
#[must_use = "dropping a completion marks the task finished immediately"]
pub(crate) struct Completion<'a> {
    queue: &'a JobQueue,
}

impl<'a> Completion<'a> {
    pub(crate) fn adopt(queue: &'a JobQueue) -> Self {
        Self { queue }
    }
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.queue.finish();
    }
}
