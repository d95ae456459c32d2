/*!
 * Sharded Slot Store
 *
 * A fixed circular array of slots addressed by unbounded logical tickets,
 * split into independent shards so producers and consumers contending on
 * different ring positions touch different allocations. Ticket `i` lives
 * in shard `(i & (C-1)) >> log2(C/S)` at in-shard index `i & (C/S - 1)`;
 * the same physical slot serves `i` again every `C` tickets.
 */

use super::slot::Slot;
use crate::core::limits::SHARD_SLOT_LEVEL;
use crate::sync::{Backoff, BackoffPolicy};

pub(crate) struct ShardedRing<T> {
    shards: Box<[Box<[Slot<T>]>]>,
    shard_mask: u64,
    index_mask: u64,
    shard_bits: u32,
}

impl<T> ShardedRing<T> {
    /// `capacity` must already be a validated power of two; the queue
    /// constructors enforce the public bounds.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());

        let shard_count = (capacity >> SHARD_SLOT_LEVEL).max(1);
        let shard_len = capacity / shard_count;

        let shards = (0..shard_count)
            .map(|_| (0..shard_len).map(|_| Slot::new()).collect())
            .collect();

        Self {
            shards,
            shard_mask: (capacity - 1) as u64,
            index_mask: (shard_len - 1) as u64,
            shard_bits: shard_len.trailing_zeros(),
        }
    }

    #[inline]
    fn slot(&self, ticket: i64) -> &Slot<T> {
        let position = ticket as u64;
        let shard = ((position & self.shard_mask) >> self.shard_bits) as usize;
        let index = (position & self.index_mask) as usize;
        &self.shards[shard][index]
    }

    /// Publish `value` at `ticket`, waiting out a wrapped ring.
    ///
    /// When the slot still holds the occupant from one lap ago, the
    /// producer backs off between attempts instead of busy-spinning so
    /// consumer threads can drain it.
    pub fn put(&self, ticket: i64, value: T, policy: BackoffPolicy) {
        let mut pending = value;
        let mut backoff = Backoff::new(policy);
        loop {
            match self.offer(ticket, pending) {
                Ok(()) => return,
                Err(value) => {
                    pending = value;
                    backoff.snooze();
                }
            }
        }
    }

    /// Single publication attempt, no waiting. The value comes back on
    /// failure.
    pub fn offer(&self, ticket: i64, value: T) -> Result<(), T> {
        self.slot(ticket).try_install(value)
    }

    /// Consume the occupant at `ticket`.
    ///
    /// The claimant of a consumer ticket may arrive before the producer
    /// holding the same ticket has published; in that case the occupant is
    /// imminent, so yield and retry until it lands.
    pub fn take(&self, ticket: i64, policy: BackoffPolicy) -> T {
        let slot = self.slot(ticket);
        let mut backoff = Backoff::new(policy);
        loop {
            if let Some(value) = slot.try_remove() {
                return value;
            }
            backoff.snooze();
        }
    }

    /// Best-effort non-destructive read at `ticket`.
    pub fn get(&self, ticket: i64) -> Option<T>
    where
        T: Clone,
    {
        self.slot(ticket).read()
    }

    /// Best-effort equality probe at `ticket` without cloning.
    pub fn matches(&self, ticket: i64, expected: &T) -> bool
    where
        T: PartialEq,
    {
        self.slot(ticket).matches(expected)
    }

    /// Conditionally replace or clear the occupant at `ticket`. Used for
    /// out-of-order removal.
    pub fn compare_and_set(&self, ticket: i64, expected: &T, update: Option<T>) -> bool
    where
        T: PartialEq,
    {
        self.slot(ticket).compare_and_set(expected, update)
    }

    pub fn is_occupied(&self, ticket: i64) -> bool {
        self.slot(ticket).is_occupied()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}
