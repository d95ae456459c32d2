/*!
 * shardq
 *
 * Lock-free, fixed-capacity MPMC queues for pipelines where throughput
 * and latency matter more than unbounded flexibility. Two ticket counters
 * allocate positions, a sharded ring stores occupants, and coordination
 * is compare-and-swap all the way down; the blocking variant adds
 * wait/timeout semantics on top without putting a lock on the data path.
 */

pub mod core;
pub mod errors;
pub mod queue;
pub mod sync;

mod ring;

// Re-exports
pub use crate::core::Sequence;
pub use errors::QueueError;
pub use queue::{BlockingShardQueue, ShardQueue};
pub use sync::{BackoffPolicy, CancelToken, WaitError};
