use core::fmt;

use portable_atomic::{AtomicI64, Ordering};

/// A lock-free 64-bit signed counter that can be shared across threads.
///
/// Every operation is a single atomic instruction on the underlying
/// [`AtomicI64`]; nothing blocks and nothing fails. Read-modify-write
/// operations use acquire/release ordering, so a value published through the
/// counter (for example, claiming a slot with [`Self::compare_and_swap`])
/// synchronizes with whoever observes it. No ordering is promised relative to
/// unrelated atomics.
///
/// Arithmetic wraps on overflow.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Lock-free on every target with native 64-bit atomics
/// - ❌ No floor at zero: [`Self::decrement`] happily goes negative
///
/// ## Caveats
/// [`Self::reset`] races with concurrent updates like any other store. A reset
/// interleaved with an increment may leave either `0` or `1` behind. Callers
/// that need a synchronized reset-and-drain must coordinate externally.
pub struct AtomicCounter {
    #[cfg(feature = "cache-padded")]
    value: crossbeam_utils::CachePadded<AtomicI64>,
    #[cfg(not(feature = "cache-padded"))]
    value: AtomicI64,
}

impl AtomicCounter {
    /// Creates a counter holding `initial`.
    ///
    /// # Example
    /// ```
    /// use corral::AtomicCounter;
    ///
    /// let counter = AtomicCounter::new(41);
    /// assert_eq!(counter.increment(), 42);
    /// ```
    pub fn new(initial: i64) -> Self {
        Self {
            #[cfg(feature = "cache-padded")]
            value: crossbeam_utils::CachePadded::new(AtomicI64::new(initial)),
            #[cfg(not(feature = "cache-padded"))]
            value: AtomicI64::new(initial),
        }
    }

    /// Adds one and returns the new value.
    #[inline]
    pub fn increment(&self) -> i64 {
        self.add(1)
    }

    /// Subtracts one and returns the new value.
    ///
    /// There is no floor: decrementing zero yields `-1`.
    #[inline]
    pub fn decrement(&self) -> i64 {
        self.add(-1)
    }

    /// Adds `delta` (which may be negative) and returns the new value.
    #[inline]
    pub fn add(&self, delta: i64) -> i64 {
        self.value
            .fetch_add(delta, Ordering::AcqRel)
            .wrapping_add(delta)
    }

    /// Returns the current value.
    #[inline]
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Sets the value to zero regardless of what it held.
    #[inline]
    pub fn reset(&self) {
        self.value.store(0, Ordering::Release);
    }

    /// Stores `new` only if the current value equals `expected`.
    ///
    /// Returns `true` if the swap happened. On failure the value is left
    /// untouched.
    ///
    /// # Example
    /// ```
    /// use corral::AtomicCounter;
    ///
    /// let slot = AtomicCounter::new(0);
    /// assert!(slot.compare_and_swap(0, 7));
    /// assert!(!slot.compare_and_swap(0, 9));
    /// assert_eq!(slot.value(), 7);
    /// ```
    #[inline]
    pub fn compare_and_swap(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new(0)
    }
}

impl From<i64> for AtomicCounter {
    fn from(initial: i64) -> Self {
        Self::new(initial)
    }
}

impl fmt::Debug for AtomicCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicCounter").field(&self.value()).finish()
    }
}
