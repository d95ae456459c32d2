/*!
 * Sequence Counter
 *
 * A cache-line-padded 64-bit counter used as a monotonically increasing
 * ticket allocator. Mutating operations (other than plain stores) are
 * compare-and-swap retry loops: read, compute, attempt, retry on failure.
 * Nothing here ever blocks; contention degrades into retries.
 *
 * # Memory Ordering
 *
 * Reads, stores, and read-modify-writes are sequentially consistent. The
 * counters do double duty: they serialize producer/consumer claims AND
 * participate in the waiter-registration handshake of the blocking queue,
 * which needs a total order between "ticket published" and "waiter
 * registered". `lazy_set` is the one escape hatch: a release store for
 * eventual-visibility writes that do not need the full fence.
 */

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Padded atomic 64-bit ticket counter.
///
/// The `align(64)` layout keeps each counter on its own cache line so that
/// `head` and `tail` allocated side by side never false-share.
#[repr(C, align(64))]
pub struct Sequence {
    value: AtomicI64,
}

impl Sequence {
    /// Create a counter with the given initial value.
    pub const fn new(initial: i64) -> Self {
        Self {
            value: AtomicI64::new(initial),
        }
    }

    /// Get the current value.
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Set to the given value.
    #[inline]
    pub fn set(&self, new_value: i64) {
        self.value.store(new_value, Ordering::SeqCst);
    }

    /// Eventually set to the given value.
    ///
    /// A release store without the full fence `set` carries. Writers that
    /// only need eventual visibility (caches, diagnostics) use this.
    #[inline]
    pub fn lazy_set(&self, new_value: i64) {
        self.value.store(new_value, Ordering::Release);
    }

    /// Set to `update` iff the current value equals `expect`.
    ///
    /// Returns `true` on success. Failure means the observed value differed
    /// from `expect`; the caller decides whether to retry.
    #[inline]
    pub fn compare_and_set(&self, expect: i64, update: i64) -> bool {
        self.value
            .compare_exchange(expect, update, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Atomically add `delta`, returning the previous value.
    #[inline]
    pub fn get_and_add(&self, delta: i64) -> i64 {
        loop {
            let current = self.value.load(Ordering::SeqCst);
            let next = current.wrapping_add(delta);
            if self
                .value
                .compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return current;
            }
        }
    }

    /// Atomically increment, returning the previous value.
    #[inline]
    pub fn get_and_increment(&self) -> i64 {
        self.get_and_add(1)
    }

    /// Atomically decrement, returning the previous value.
    #[inline]
    pub fn get_and_decrement(&self) -> i64 {
        self.get_and_add(-1)
    }

    /// Atomically add `delta`, returning the updated value.
    #[inline]
    pub fn add_and_get(&self, delta: i64) -> i64 {
        loop {
            let current = self.value.load(Ordering::SeqCst);
            let next = current.wrapping_add(delta);
            if self
                .value
                .compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return next;
            }
        }
    }

    /// Atomically increment, returning the updated value.
    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    /// Atomically decrement, returning the updated value.
    #[inline]
    pub fn decrement_and_get(&self) -> i64 {
        self.add_and_get(-1)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sequence").field(&self.get()).finish()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
