/*!
 * Ring Slot
 *
 * One storage cell, reused every `capacity` tickets. A slot is EMPTY or
 * FULL; the transitions between them pass through a transient exclusive
 * BUSY claim taken by a single CAS on the state byte. Whoever wins that
 * CAS owns the payload cell until it publishes the next state, so no
 * check-then-act on the value is ever visible to other threads.
 */

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const BUSY: u8 = 1;
const FULL: u8 = 2;

pub(crate) struct Slot<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// The payload cell is only ever touched by the thread holding the BUSY
// claim, which makes the slot safe to share whenever T itself can move
// between threads.
unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}

impl<T> Slot<T> {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Single attempt to move EMPTY -> FULL with `value`.
    ///
    /// Returns the value back on failure so the caller can retry or give
    /// up without losing it.
    pub fn try_install(&self, value: T) -> Result<(), T> {
        if self
            .state
            .compare_exchange(EMPTY, BUSY, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(value);
        }
        unsafe { (*self.value.get()).write(value) };
        self.state.store(FULL, Ordering::Release);
        Ok(())
    }

    /// Single attempt to move FULL -> EMPTY, returning the occupant.
    pub fn try_remove(&self) -> Option<T> {
        if self
            .state
            .compare_exchange(FULL, BUSY, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        let value = unsafe { (*self.value.get()).assume_init_read() };
        self.state.store(EMPTY, Ordering::Release);
        Some(value)
    }

    /// Non-destructive best-effort read. `None` when the slot is empty or
    /// momentarily claimed by another thread.
    pub fn read(&self) -> Option<T>
    where
        T: Clone,
    {
        if self
            .state
            .compare_exchange(FULL, BUSY, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        let value = unsafe { (*self.value.get()).assume_init_ref() }.clone();
        self.state.store(FULL, Ordering::Release);
        Some(value)
    }

    /// Best-effort equality probe without cloning.
    pub fn matches(&self, expected: &T) -> bool
    where
        T: PartialEq,
    {
        if self
            .state
            .compare_exchange(FULL, BUSY, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        let found = unsafe { (*self.value.get()).assume_init_ref() } == expected;
        self.state.store(FULL, Ordering::Release);
        found
    }

    /// Replace (or clear, when `update` is `None`) the occupant iff it
    /// equals `expected`. Returns `true` on success.
    pub fn compare_and_set(&self, expected: &T, update: Option<T>) -> bool
    where
        T: PartialEq,
    {
        if self
            .state
            .compare_exchange(FULL, BUSY, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        let cell = self.value.get();
        if unsafe { (*cell).assume_init_ref() } != expected {
            self.state.store(FULL, Ordering::Release);
            return false;
        }
        unsafe { (*cell).assume_init_drop() };
        match update {
            Some(value) => {
                unsafe { (*cell).write(value) };
                self.state.store(FULL, Ordering::Release);
            }
            None => self.state.store(EMPTY, Ordering::Release),
        }
        true
    }

    /// Whether the slot currently holds (or is about to hold) an occupant.
    /// BUSY counts as occupied: a claim in flight resolves in nanoseconds
    /// and treating it as empty would let two producers target one cell.
    pub fn is_occupied(&self) -> bool {
        self.state.load(Ordering::Acquire) != EMPTY
    }
}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == FULL {
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}
