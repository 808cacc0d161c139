//! Lock primitives used by the thread-backed pool.
//!
//! With the `parking-lot` feature the pool uses [`parking_lot`]'s mutex and
//! condition variable; otherwise it uses the standard library's. The helpers
//! below paper over the two APIs so the pool code is written once.
//!
//! No caller code ever runs while one of these locks is held, so a poisoned
//! std lock can only mean a panic inside the pool's own bookkeeping, which
//! leaves the guarded counters consistent. Poisoned guards are therefore
//! recovered rather than reported.

#[cfg(feature = "parking-lot")]
pub(crate) use parking_lot::{Condvar, Mutex, MutexGuard};
#[cfg(not(feature = "parking-lot"))]
pub(crate) use std::sync::{Condvar, Mutex, MutexGuard};

#[cfg(not(feature = "parking-lot"))]
use std::sync::PoisonError;

#[cfg(feature = "parking-lot")]
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock()
}

#[cfg(not(feature = "parking-lot"))]
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Blocks on `condvar`, releasing `guard` while asleep, and returns the
/// re-acquired guard.
#[cfg(feature = "parking-lot")]
#[inline]
pub(crate) fn wait<'a, T>(condvar: &Condvar, mut guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    condvar.wait(&mut guard);
    guard
}

#[cfg(not(feature = "parking-lot"))]
#[inline]
pub(crate) fn wait<'a, T>(condvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
}
