use crate::{AtomicCounter, Error, TaskError, WorkerPool};
use core::num::NonZeroUsize;
use core::time::Duration;
use std::sync::{Arc, Barrier, OnceLock};
use std::thread::{self, scope};
use std::time::Instant;

fn limit(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn record_peak(peak: &AtomicCounter, current: i64) {
    loop {
        let seen = peak.value();
        if current <= seen || peak.compare_and_swap(seen, current) {
            break;
        }
    }
}

/// Submits `tasks` sleeping tasks and returns the highest number observed
/// running at once.
fn run_peak_concurrency(pool: &WorkerPool, tasks: usize, sleep_for: Duration) -> i64 {
    let running = Arc::new(AtomicCounter::new(0));
    let peak = Arc::new(AtomicCounter::new(0));

    for _ in 0..tasks {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        pool.submit(move || {
            let now = running.increment();
            record_peak(&peak, now);
            thread::sleep(sleep_for);
            running.decrement();
            Ok::<_, ()>(())
        })
        .unwrap();
    }

    pool.close();
    assert_eq!(running.value(), 0);
    peak.value()
}

#[test]
fn try_new_rejects_zero_limit() {
    assert_eq!(
        WorkerPool::try_new(0).unwrap_err(),
        Error::InvalidLimit { limit: 0 }
    );

    let pool = WorkerPool::try_new(4).unwrap();
    assert_eq!(pool.limit().get(), 4);
    assert!(!pool.is_closed());
    assert_eq!(pool.active_tasks(), 0);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn peak_concurrency_never_exceeds_limit() {
    for n in [1, 2, 3, 8] {
        let pool = WorkerPool::new(limit(n));
        let peak = run_peak_concurrency(&pool, 4 * n + 3, Duration::from_millis(5));
        assert!(peak >= 1);
        assert!(peak <= n as i64, "peak {peak} exceeded limit {n}");
    }
}

#[test]
fn saturates_limit_when_backlogged() {
    let pool = WorkerPool::new(limit(4));
    let peak = run_peak_concurrency(&pool, 16, Duration::from_millis(50));
    assert_eq!(peak, 4);
}

#[test]
fn large_backlog_is_accepted_and_drained_by_one_worker() {
    const BACKLOG: usize = 50_000;

    let pool = WorkerPool::new(limit(1));
    let gate = Arc::new(Barrier::new(2));
    let worker = Arc::new(OnceLock::new());
    let ran = Arc::new(AtomicCounter::new(0));
    let elsewhere = Arc::new(AtomicCounter::new(0));

    let task_gate = Arc::clone(&gate);
    let first = Arc::clone(&worker);
    pool.submit(move || {
        first.set(thread::current().id()).unwrap();
        task_gate.wait();
        Ok::<_, ()>(())
    })
    .unwrap();

    for _ in 0..BACKLOG {
        let worker = Arc::clone(&worker);
        let ran = Arc::clone(&ran);
        let elsewhere = Arc::clone(&elsewhere);
        pool.submit(move || {
            if worker.get() != Some(&thread::current().id()) {
                elsewhere.increment();
            }
            ran.increment();
            Ok::<_, ()>(())
        })
        .unwrap();
    }

    assert_eq!(pool.outstanding(), BACKLOG + 1);
    assert_eq!(ran.value(), 0);

    gate.wait();
    pool.close();

    assert_eq!(ran.value(), BACKLOG as i64);
    // The queue never ran dry, so the single worker ran everything.
    assert_eq!(elsewhere.value(), 0);
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.active_tasks(), 0);
}

#[test]
fn close_waits_for_every_accepted_task() {
    let pool = WorkerPool::new(limit(3));
    let in_flight = Arc::new(AtomicCounter::new(0));
    let completed = Arc::new(AtomicCounter::new(0));

    for i in 0..20 {
        let in_flight = Arc::clone(&in_flight);
        let completed = Arc::clone(&completed);
        pool.submit(move || {
            in_flight.increment();
            thread::sleep(Duration::from_millis(2 + i % 5));
            in_flight.decrement();
            completed.increment();
            Ok::<_, ()>(())
        })
        .unwrap();
    }

    pool.close();

    assert_eq!(in_flight.value(), 0);
    assert_eq!(completed.value(), 20);
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.active_tasks(), 0);
}

#[test]
fn submit_after_close_is_rejected_and_never_runs() {
    let pool = WorkerPool::new(limit(2));
    pool.close();
    assert!(pool.is_closed());

    let ran = Arc::new(AtomicCounter::new(0));
    for _ in 0..3 {
        let marker = Arc::clone(&ran);
        let err = pool
            .submit(move || {
                marker.increment();
                Ok::<_, ()>(())
            })
            .unwrap_err();
        assert_eq!(err, Error::PoolClosed);
    }

    let marker = Arc::clone(&ran);
    let err = pool
        .submit_with_handle(move || {
            marker.increment();
            Ok::<_, ()>(())
        })
        .unwrap_err();
    assert_eq!(err, Error::PoolClosed);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(ran.value(), 0);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn close_is_idempotent() {
    let pool = WorkerPool::new(limit(1));
    let completed = Arc::new(AtomicCounter::new(0));

    let done = Arc::clone(&completed);
    pool.submit(move || {
        thread::sleep(Duration::from_millis(10));
        done.increment();
        Ok::<_, ()>(())
    })
    .unwrap();

    pool.close();
    pool.close();
    pool.close();
    assert_eq!(completed.value(), 1);
}

#[test]
fn concurrent_close_calls_all_wait_for_drain() {
    let pool = WorkerPool::new(limit(2));
    let completed = Arc::new(AtomicCounter::new(0));

    for _ in 0..6 {
        let done = Arc::clone(&completed);
        pool.submit(move || {
            thread::sleep(Duration::from_millis(10));
            done.increment();
            Ok::<_, ()>(())
        })
        .unwrap();
    }

    scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                pool.close();
                assert_eq!(completed.value(), 6);
            });
        }
    });
}

#[test]
fn task_errors_are_swallowed() {
    let pool = WorkerPool::new(limit(2));
    let attempts = Arc::new(AtomicCounter::new(0));

    for _ in 0..5 {
        let attempts = Arc::clone(&attempts);
        pool.submit(move || {
            attempts.increment();
            Err("task failed")
        })
        .unwrap();
    }

    pool.close();
    assert_eq!(attempts.value(), 5);
}

#[test]
fn panicking_task_does_not_stall_the_pool() {
    let pool = WorkerPool::new(limit(1));

    let handle = pool
        .submit_with_handle(|| -> Result<(), ()> { panic!("task blew up") })
        .unwrap();
    assert_eq!(handle.join(), Err(TaskError::Panicked));

    // With a single worker, this only runs if the panic left it draining.
    let after = pool.submit_with_handle(|| Ok::<_, ()>(())).unwrap();
    assert_eq!(after.join(), Ok(()));

    pool.close();
    assert_eq!(pool.active_tasks(), 0);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn handles_report_success_and_failure() {
    let pool = WorkerPool::new(limit(2));

    let ok = pool.submit_with_handle(|| Ok::<_, String>(())).unwrap();
    let failed = pool
        .submit_with_handle(|| Err::<(), _>("boom".to_string()))
        .unwrap();

    assert_eq!(ok.join(), Ok(()));
    let err = failed.join().unwrap_err();
    assert_eq!(err.to_string(), "task failed: boom");
    assert_eq!(err.into_failure(), Some("boom".to_string()));

    pool.close();
}

#[test]
fn try_join_hands_back_pending_handle() {
    let pool = WorkerPool::new(limit(1));
    let gate = Arc::new(Barrier::new(2));

    let task_gate = Arc::clone(&gate);
    let handle = pool
        .submit_with_handle(move || {
            task_gate.wait();
            Ok::<_, ()>(())
        })
        .unwrap();

    let handle = match handle.try_join() {
        Ok(outcome) => panic!("task finished before it was released: {outcome:?}"),
        Err(pending) => pending,
    };

    gate.wait();
    assert_eq!(handle.join(), Ok(()));
    pool.close();
}

#[test]
fn dropped_handle_does_not_affect_task() {
    let pool = WorkerPool::new(limit(1));
    let completed = Arc::new(AtomicCounter::new(0));

    let done = Arc::clone(&completed);
    drop(
        pool.submit_with_handle(move || {
            thread::sleep(Duration::from_millis(5));
            done.increment();
            Ok::<_, ()>(())
        })
        .unwrap(),
    );

    pool.close();
    assert_eq!(completed.value(), 1);
}

#[test]
fn limit_two_runs_five_tasks_in_three_batches() {
    const UNIT: Duration = Duration::from_millis(100);

    let pool = WorkerPool::new(limit(2));
    let started = Arc::new(std::sync::Mutex::new(Vec::with_capacity(5)));
    let origin = Instant::now();

    for _ in 0..5 {
        let started = Arc::clone(&started);
        pool.submit(move || {
            started.lock().unwrap().push(origin.elapsed());
            thread::sleep(UNIT);
            Ok::<_, ()>(())
        })
        .unwrap();
    }

    // Sample inside the first two batches.
    for sample in [UNIT / 2, UNIT] {
        thread::sleep(sample);
        assert_eq!(pool.active_tasks(), 2);
    }

    pool.close();
    let elapsed = origin.elapsed();

    assert!(elapsed >= UNIT * 3, "finished too early: {elapsed:?}");
    assert!(elapsed < UNIT * 6, "finished too late: {elapsed:?}");

    let mut started = started.lock().unwrap().clone();
    started.sort();
    assert_eq!(started.len(), 5);
    // Two start right away, the rest only after a permit frees up.
    assert!(started[1] < UNIT);
    assert!(started[2] >= UNIT);
    assert!(started[4] >= UNIT * 2);
}

#[test]
fn racing_submitters_never_outlive_close() {
    const SUBMITTERS: usize = 6;

    let pool = WorkerPool::new(limit(4));
    let accepted = AtomicCounter::new(0);
    let completed = Arc::new(AtomicCounter::new(0));
    let mut completed_at_close = 0;
    let start = Barrier::new(SUBMITTERS + 1);

    scope(|s| {
        for _ in 0..SUBMITTERS {
            s.spawn(|| {
                start.wait();
                loop {
                    let done = Arc::clone(&completed);
                    match pool.submit(move || {
                        thread::sleep(Duration::from_micros(200));
                        done.increment();
                        Ok::<_, ()>(())
                    }) {
                        Ok(()) => {
                            accepted.increment();
                        }
                        Err(e) => {
                            assert_eq!(e, Error::PoolClosed);
                            break;
                        }
                    }
                    thread::sleep(Duration::from_micros(500));
                }
            });
        }

        start.wait();
        thread::sleep(Duration::from_millis(30));
        pool.close();
        completed_at_close = completed.value();
    });

    // Every task accepted before close finished before close returned.
    assert_eq!(completed_at_close, accepted.value());
    assert_eq!(completed.value(), accepted.value());
}

#[test]
fn pools_do_not_share_state() {
    let a = WorkerPool::new(limit(1));
    let b = WorkerPool::new(limit(3));

    a.close();
    assert!(a.is_closed());
    assert!(!b.is_closed());
    assert_eq!(a.submit(|| Ok::<_, ()>(())), Err(Error::PoolClosed));

    let handle = b.submit_with_handle(|| Ok::<_, ()>(())).unwrap();
    assert_eq!(handle.join(), Ok(()));
    b.close();
}

#[test]
fn clones_share_one_pool() {
    let pool = WorkerPool::new(limit(2));
    let clone = pool.clone();

    let completed = Arc::new(AtomicCounter::new(0));
    let done = Arc::clone(&completed);
    clone
        .submit(move || {
            thread::sleep(Duration::from_millis(10));
            done.increment();
            Ok::<_, ()>(())
        })
        .unwrap();

    pool.close();
    assert_eq!(completed.value(), 1);
    assert!(clone.is_closed());
    assert_eq!(clone.submit(|| Ok::<_, ()>(())), Err(Error::PoolClosed));
}

#[test]
fn active_tasks_excludes_pending_admission() {
    let pool = WorkerPool::new(limit(1));
    let gate = Arc::new(Barrier::new(2));

    let task_gate = Arc::clone(&gate);
    pool.submit(move || {
        task_gate.wait();
        Ok::<_, ()>(())
    })
    .unwrap();
    thread::sleep(Duration::from_millis(20));
    for _ in 0..3 {
        pool.submit(|| Ok::<_, ()>(())).unwrap();
    }

    thread::sleep(Duration::from_millis(50));
    assert_eq!(pool.active_tasks(), 1);
    assert_eq!(pool.outstanding(), 4);

    gate.wait();
    pool.close();
    assert_eq!(pool.active_tasks(), 0);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn debug_reports_state() {
    let pool = WorkerPool::new(limit(2));
    pool.close();
    let dbg = format!("{pool:?}");
    assert!(dbg.contains("limit: 2"));
    assert!(dbg.contains("closed: true"));
}
