/*!
 * Queue Module
 * Non-blocking and blocking bounded MPMC queues over the sharded ring
 */

pub mod blocking;
pub mod nonblocking;

// Re-export public API
pub use blocking::BlockingShardQueue;
pub use nonblocking::{Iter, ShardQueue};
