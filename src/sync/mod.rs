/*!
 * Synchronization Primitives
 *
 * Coordination pieces shared by both queue flavors:
 * - Configurable backoff for the lock-free retry sites
 * - A waiter-counted gate for the blocking queue's guarded suspension
 *
 * The data path never takes a lock; the gate's mutex is touched only when
 * a consumer has nothing to consume or a producer sees registered waiters.
 */

mod backoff;
mod gate;

pub use backoff::{Backoff, BackoffPolicy};
pub use gate::{CancelToken, WaitError};

pub(crate) use gate::WaitGate;
