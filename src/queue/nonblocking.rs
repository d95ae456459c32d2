/*!
 * Non-blocking Queue
 *
 * Bounded MPMC queue over two ticket counters and the sharded ring.
 * `head` is the next ticket a producer may claim, `tail` the next a
 * consumer may claim; a claim is one CAS, after which the claimant owns
 * its ring position. FIFO holds in ticket order; nothing is guaranteed
 * about which producer's write lands first in wall-clock time beyond
 * that.
 */

use crate::core::limits::MAX_CAPACITY;
use crate::core::Sequence;
use crate::errors::QueueError;
use crate::ring::ShardedRing;
use crate::sync::{Backoff, BackoffPolicy};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Lock-free bounded MPMC queue.
///
/// Capacity is fixed at construction: the requested size is rounded up to
/// the next power of two, capped at 2^30. All operations are safe to call
/// from any number of producer and consumer threads; none of them take a
/// lock.
pub struct ShardQueue<T> {
    pub(crate) ring: ShardedRing<T>,
    pub(crate) capacity: usize,
    pub(crate) policy: BackoffPolicy,
    pub(crate) head: Sequence,
    pub(crate) tail: Sequence,
    /// Consumer-side cache of `head`, refreshed only when it no longer
    /// admits the ticket being checked. Keeps `poll` from contending on
    /// `head` every call.
    head_cache: AtomicI64,
}

impl<T> ShardQueue<T> {
    /// Create a queue with the default backoff policy.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        Self::with_policy(capacity, BackoffPolicy::default())
    }

    /// Create a queue with an explicit backoff policy.
    pub fn with_policy(requested: usize, policy: BackoffPolicy) -> Result<Self, QueueError> {
        if requested < 1 {
            return Err(QueueError::CapacityTooSmall);
        }
        if requested > MAX_CAPACITY {
            return Err(QueueError::CapacityExceeded(requested));
        }
        let capacity = requested.next_power_of_two();
        let ring = ShardedRing::new(capacity);
        tracing::debug!(
            requested,
            capacity,
            shards = ring.shard_count(),
            "created queue"
        );
        Ok(Self {
            ring,
            capacity,
            policy,
            head: Sequence::new(0),
            tail: Sequence::new(0),
            head_cache: AtomicI64::new(0),
        })
    }

    /// Enqueue without blocking. On failure the item comes back in `Err`.
    ///
    /// An occupied target slot means the ring has wrapped into an entry
    /// nobody consumed yet: the queue is full at that position. A few
    /// retries with backoff absorb transient wrap races, then the call
    /// reports failure as backpressure. Under heavy CAS contention this
    /// can fail even when the ring is not logically full; that bounded
    /// worst case is deliberate, `offer` never waits indefinitely.
    pub fn offer(&self, item: T) -> Result<(), T> {
        let mut backoff = Backoff::new(self.policy);
        let mut full_retries = 0u32;
        loop {
            let ticket = self.head.get();
            if self.ring.is_occupied(ticket) && self.head.get() == ticket {
                if full_retries >= self.policy.offer_retries {
                    return Err(item);
                }
                full_retries += 1;
                backoff.snooze();
                continue;
            }
            if self.head.compare_and_set(ticket, ticket + 1) {
                self.ring.put(ticket, item, self.policy);
                return Ok(());
            }
            // Lost the ticket race; the winner made progress.
            backoff.spin();
        }
    }

    /// Dequeue without blocking. `None` when nothing is consumable.
    pub fn poll(&self) -> Option<T> {
        let mut backoff = Backoff::new(self.policy);
        loop {
            let ticket = self.tail.get();
            if !self.consumable(ticket) {
                return None;
            }
            if self.tail.compare_and_set(ticket, ticket + 1) {
                return Some(self.ring.take(ticket, self.policy));
            }
            backoff.spin();
        }
    }

    /// Non-destructive look at the next consumable item.
    ///
    /// Best-effort: a racing consumer may claim the ticket between the
    /// check and the read, in which case this returns `None`.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let ticket = self.tail.get();
        if !self.consumable(ticket) {
            return None;
        }
        self.ring.get(ticket)
    }

    /// Whether `ticket` is admitted by `head`.
    ///
    /// The cache only ever holds a previously observed `head`, and `head`
    /// is monotonic, so a cache hit can never admit a ticket the real
    /// counter has not.
    pub(crate) fn consumable(&self, ticket: i64) -> bool {
        if self.head_cache.load(Ordering::Relaxed) > ticket {
            return true;
        }
        let head = self.head.get();
        self.head_cache.store(head, Ordering::Relaxed);
        head > ticket
    }

    /// Momentary size estimate: `max(head - tail, 0)`.
    ///
    /// Not linearizable under concurrent mutation; callers get a value
    /// that was true at some instant near the call.
    pub fn len(&self) -> usize {
        let head = self.head.get();
        let tail = self.tail.get();
        head.saturating_sub(tail).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The constructed (power-of-two) capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Capacity minus the current size estimate, floored at zero.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.len())
    }

    /// Best-effort membership scan over the live ticket range.
    ///
    /// Weakly consistent: concurrent producers and consumers may add or
    /// remove the item while the scan runs.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let mut ticket = self.tail.get();
        while ticket < self.head.get() {
            if self.ring.matches(ticket, item) {
                return true;
            }
            ticket += 1;
        }
        false
    }

    /// Best-effort removal of the first occupant equal to `item`.
    ///
    /// Weakly consistent, like [`contains`](Self::contains). An
    /// out-of-order removal empties a position mid-ring; the consumer
    /// that later claims that ticket will not complete until a producer
    /// laps the ring into the same physical slot, so removal is meant
    /// for queues that keep flowing, not for draining.
    pub fn remove(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let mut ticket = self.tail.get();
        while ticket < self.head.get() {
            if self.ring.compare_and_set(ticket, item, None) {
                return true;
            }
            ticket += 1;
        }
        false
    }

    /// Weakly consistent iterator over the live ticket range.
    ///
    /// Yields clones of the occupants observed while scanning from `tail`
    /// toward `head`; items consumed or produced mid-iteration may or may
    /// not appear.
    pub fn iter(&self) -> Iter<'_, T>
    where
        T: Clone,
    {
        Iter {
            queue: self,
            next_ticket: self.tail.get(),
        }
    }

    /// Snapshot of the live contents, same semantics as [`iter`](Self::iter).
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().collect()
    }
}

impl<T> fmt::Debug for ShardQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

/// See [`ShardQueue::iter`].
pub struct Iter<'a, T> {
    queue: &'a ShardQueue<T>,
    next_ticket: i64,
}

impl<T: Clone> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let head = self.queue.head.get();
        let mut ticket = self.next_ticket.max(self.queue.tail.get());
        while ticket < head {
            let value = self.queue.ring.get(ticket);
            ticket += 1;
            if let Some(value) = value {
                self.next_ticket = ticket;
                return Some(value);
            }
        }
        self.next_ticket = ticket;
        None
    }
}

impl<'a, T: Clone> IntoIterator for &'a ShardQueue<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
