/*!
 * Wait Gate
 *
 * Monitor-style suspend/resume for consumers waiting on ticket
 * availability. One gate serves a whole queue: producers publish a ticket
 * and wake, consumers re-check their condition before first sleeping and
 * after every wake (guarded suspension), so wakeups lost to timing and
 * spurious wakes are both tolerated.
 *
 * # Registration
 *
 * Waiters are counted so producers can skip the lock entirely when nobody
 * is parked. Registration is an RAII guard taken under the gate lock;
 * timeout, cancellation, and panic all deregister on drop before the abort
 * propagates.
 */

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Why a blocking wait ended without the condition holding.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    #[error("wait timed out before a ticket became consumable")]
    Timeout,

    #[error("wait was cancelled")]
    Cancelled,
}

/// Decrements the waiter count when the waiting scope exits, however it
/// exits.
struct WaiterGuard<'a> {
    waiters: &'a AtomicUsize,
}

impl<'a> WaiterGuard<'a> {
    fn register(waiters: &'a AtomicUsize) -> Self {
        waiters.fetch_add(1, Ordering::SeqCst);
        Self { waiters }
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Waiter-counted mutex/condvar pair associated with a queue's `head`
/// counter.
pub(crate) struct WaitGate {
    lock: Mutex<()>,
    available: Condvar,
    waiters: AtomicUsize,
}

impl WaitGate {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            available: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Suspend until `stalled` reports false, the deadline passes, or the
    /// cancel token fires.
    ///
    /// The predicate runs under the gate lock; it must be cheap and must
    /// read its condition from shared atomics (the `head` counter), not
    /// from state captured before the call. Checking it before the first
    /// sleep closes the window where the condition changed between the
    /// caller's last look and registration.
    pub fn wait_while<F>(
        &self,
        deadline: Option<Instant>,
        cancel: Option<&CancelToken>,
        mut stalled: F,
    ) -> Result<(), WaitError>
    where
        F: FnMut() -> bool,
    {
        let mut guard = self.lock.lock();
        let _registration = WaiterGuard::register(&self.waiters);

        loop {
            if !stalled() {
                return Ok(());
            }
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(WaitError::Cancelled);
                }
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        tracing::trace!("wait deadline elapsed");
                        return Err(WaitError::Timeout);
                    }
                    // Timed out or woken, the loop re-checks either way.
                    let _ = self.available.wait_until(&mut guard, deadline);
                }
                None => self.available.wait(&mut guard),
            }
        }
    }

    /// Wake every parked waiter. Cheap no-op when none are registered.
    ///
    /// All waiters are woken (rather than one) because several may race for
    /// the same newly published ticket; losers re-check and park again.
    pub fn wake_all(&self) {
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return;
        }
        // Taking the lock orders this notify after any in-flight
        // registration that has not yet reached its condvar wait.
        let _guard = self.lock.lock();
        self.available.notify_all();
    }

    /// Approximate number of registered waiters (diagnostics only).
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }
}

/// Handle for aborting blocked `take`/timed `poll` calls on one queue.
///
/// Cloned tokens share the same flag: cancelling any clone aborts every
/// wait that was given one of them.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    gate: Arc<WaitGate>,
}

impl CancelToken {
    pub(crate) fn new(gate: Arc<WaitGate>) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            gate,
        }
    }

    /// Fire the token: pending and future waits carrying it abort with
    /// [`WaitError::Cancelled`].
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::trace!("cancel token fired, waking waiters");
            self.gate.wake_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wake_releases_waiter() {
        let gate = Arc::new(WaitGate::new());
        let ready = Arc::new(AtomicBool::new(false));

        let gate_clone = gate.clone();
        let ready_clone = ready.clone();
        let handle = thread::spawn(move || {
            gate_clone.wait_while(None, None, || !ready_clone.load(Ordering::SeqCst))
        });

        thread::sleep(Duration::from_millis(50));
        ready.store(true, Ordering::SeqCst);
        gate.wake_all();

        assert!(handle.join().unwrap().is_ok());
        assert_eq!(gate.waiter_count(), 0);
    }

    #[test]
    fn test_condition_already_met_skips_sleep() {
        let gate = WaitGate::new();
        let result = gate.wait_while(None, None, || false);
        assert!(result.is_ok());
    }

    #[test]
    fn test_timeout_deregisters() {
        let gate = WaitGate::new();
        let start = Instant::now();
        let deadline = start + Duration::from_millis(50);

        let result = gate.wait_while(Some(deadline), None, || true);

        assert_eq!(result, Err(WaitError::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(gate.waiter_count(), 0);
    }

    #[test]
    fn test_cancel_wakes_and_deregisters() {
        let gate = Arc::new(WaitGate::new());
        let token = CancelToken::new(gate.clone());

        let gate_clone = gate.clone();
        let token_clone = token.clone();
        let handle =
            thread::spawn(move || gate_clone.wait_while(None, Some(&token_clone), || true));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(gate.waiter_count(), 1);
        token.cancel();

        assert_eq!(handle.join().unwrap(), Err(WaitError::Cancelled));
        assert_eq!(gate.waiter_count(), 0);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_spurious_wakes_recheck_condition() {
        let gate = Arc::new(WaitGate::new());
        let counter = Arc::new(AtomicI64::new(0));

        let gate_clone = gate.clone();
        let counter_clone = counter.clone();
        let handle = thread::spawn(move || {
            gate_clone.wait_while(None, None, || counter_clone.load(Ordering::SeqCst) < 3)
        });

        // Wake repeatedly while the condition still holds; the waiter must
        // go back to sleep each time until the counter reaches 3.
        for i in 1..=3 {
            thread::sleep(Duration::from_millis(20));
            counter.store(i, Ordering::SeqCst);
            gate.wake_all();
        }

        assert!(handle.join().unwrap().is_ok());
    }
}
