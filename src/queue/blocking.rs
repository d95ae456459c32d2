/*!
 * Blocking Queue
 *
 * Wraps the non-blocking queue with blocking `put`/`take`, timed
 * `poll`/`offer`, and bulk `drain_to`. The only place a thread suspends
 * (rather than spins) is a consumer with nothing to consume; producers
 * wake the gate after publishing, and woken consumers re-validate before
 * racing for the ticket.
 */

use super::nonblocking::{Iter, ShardQueue};
use crate::errors::QueueError;
use crate::sync::{Backoff, BackoffPolicy, CancelToken, WaitError, WaitGate};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Blocking bounded MPMC queue.
///
/// Built on [`ShardQueue`]; the non-blocking operations remain available
/// and interoperate with the blocking ones on the same instance.
pub struct BlockingShardQueue<T> {
    queue: ShardQueue<T>,
    gate: Arc<WaitGate>,
}

impl<T> BlockingShardQueue<T> {
    /// Create a queue with the default backoff policy.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        Self::with_policy(capacity, BackoffPolicy::default())
    }

    /// Create a queue with an explicit backoff policy.
    pub fn with_policy(capacity: usize, policy: BackoffPolicy) -> Result<Self, QueueError> {
        Ok(Self {
            queue: ShardQueue::with_policy(capacity, policy)?,
            gate: Arc::new(WaitGate::new()),
        })
    }

    /// Enqueue unconditionally and wake waiting consumers.
    ///
    /// `put` performs no capacity check: it always claims the next ticket,
    /// and when the ring is full it waits out the wrapped slot rather than
    /// failing. Callers that need admission control consult
    /// [`remaining_capacity`](Self::remaining_capacity) themselves.
    pub fn put(&self, item: T) {
        let ticket = self.queue.head.get_and_increment();
        self.queue.ring.put(ticket, item, self.queue.policy);
        self.gate.wake_all();
    }

    /// Non-blocking enqueue that wakes waiting consumers on success.
    pub fn offer(&self, item: T) -> Result<(), T> {
        let result = self.queue.offer(item);
        if result.is_ok() {
            self.gate.wake_all();
        }
        result
    }

    /// Dequeue, suspending until an item is available.
    pub fn take(&self) -> T {
        match self.claim_ticket(None, None) {
            Ok(ticket) => self.queue.ring.take(ticket, self.queue.policy),
            Err(_) => unreachable!("wait without deadline or cancellation cannot fail"),
        }
    }

    /// Dequeue, suspending until an item is available or `cancel` fires.
    pub fn take_with(&self, cancel: &CancelToken) -> Result<T, WaitError> {
        self.claim_ticket(None, Some(cancel))
            .map(|ticket| self.queue.ring.take(ticket, self.queue.policy))
    }

    /// Dequeue, suspending up to `timeout`. `None` on expiry.
    pub fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now().checked_add(timeout);
        match self.claim_ticket(deadline, None) {
            Ok(ticket) => Some(self.queue.ring.take(ticket, self.queue.policy)),
            // Without a token the only failure is the deadline.
            Err(_) => None,
        }
    }

    /// Dequeue with both a timeout and a cancel token. Expiry is an empty
    /// result; cancellation is an error.
    pub fn poll_timeout_with(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Option<T>, WaitError> {
        let deadline = Instant::now().checked_add(timeout);
        match self.claim_ticket(deadline, Some(cancel)) {
            Ok(ticket) => Ok(Some(self.queue.ring.take(ticket, self.queue.policy))),
            Err(WaitError::Timeout) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Retry the non-blocking offer until success or `timeout` elapses.
    /// The item comes back in `Err` on expiry.
    pub fn offer_timeout(&self, item: T, timeout: Duration) -> Result<(), T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut pending = item;
        let mut backoff = Backoff::new(self.queue.policy);
        loop {
            match self.offer(pending) {
                Ok(()) => return Ok(()),
                Err(item) => {
                    let expired = deadline.map_or(false, |d| Instant::now() >= d);
                    if expired {
                        return Err(item);
                    }
                    pending = item;
                    backoff.snooze();
                }
            }
        }
    }

    /// Move up to `max_elements` items into `sink`, returning the count.
    ///
    /// One CAS on `tail` reserves the whole contiguous ticket run, so
    /// concurrent drains and polls never receive overlapping ranges. The
    /// reserved slots are then taken in ticket order; a reserved ticket
    /// whose producer is still publishing is waited out. The destination
    /// cannot alias the queue (`&mut Vec<T>` vs `&self`), and a zero
    /// `max_elements` drains nothing.
    pub fn drain_to(&self, sink: &mut Vec<T>, max_elements: usize) -> usize {
        if max_elements == 0 {
            return 0;
        }
        let limit = max_elements.min(i64::MAX as usize) as i64;
        let mut backoff = Backoff::new(self.queue.policy);
        let (start, end) = loop {
            let start = self.queue.tail.get();
            let end = self.queue.head.get().min(start.saturating_add(limit));
            if end <= start {
                return 0;
            }
            if self.queue.tail.compare_and_set(start, end) {
                break (start, end);
            }
            backoff.spin();
        };

        let count = (end - start) as usize;
        sink.reserve(count);
        for ticket in start..end {
            sink.push(self.queue.ring.take(ticket, self.queue.policy));
        }
        tracing::trace!(count, "drained reserved tickets");
        count
    }

    /// [`drain_to`](Self::drain_to) without an element bound.
    pub fn drain_all_to(&self, sink: &mut Vec<T>) -> usize {
        self.drain_to(sink, usize::MAX)
    }

    /// A token that aborts any blocked `take_with`/`poll_timeout_with`
    /// call on this queue when fired.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken::new(self.gate.clone())
    }

    /// Approximate number of consumers currently suspended (diagnostics).
    pub fn waiter_count(&self) -> usize {
        self.gate.waiter_count()
    }

    /// Claim the next consumable ticket, suspending while none exists.
    ///
    /// Guarded suspension: the gate re-checks ticket availability before
    /// first sleeping and after every wake, and several woken consumers
    /// may race for one ticket, so a lost CAS loops back around (possibly
    /// to wait again for a later ticket).
    fn claim_ticket(
        &self,
        deadline: Option<Instant>,
        cancel: Option<&CancelToken>,
    ) -> Result<i64, WaitError> {
        let mut backoff = Backoff::new(self.queue.policy);
        loop {
            let ticket = self.queue.tail.get();
            if !self.queue.consumable(ticket) {
                self.gate
                    .wait_while(deadline, cancel, || !self.queue.consumable(ticket))?;
                backoff.reset();
                continue;
            }
            if self.queue.tail.compare_and_set(ticket, ticket + 1) {
                return Ok(ticket);
            }
            backoff.spin();
        }
    }

    // Non-blocking operations, delegated unchanged.

    /// See [`ShardQueue::poll`].
    pub fn poll(&self) -> Option<T> {
        self.queue.poll()
    }

    /// See [`ShardQueue::peek`].
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.queue.peek()
    }

    /// See [`ShardQueue::len`].
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// See [`ShardQueue::remaining_capacity`]. A backlog of unconditional
    /// `put` claims can push the size estimate past nominal capacity, in
    /// which case this floors at zero.
    pub fn remaining_capacity(&self) -> usize {
        self.queue.remaining_capacity()
    }

    /// See [`ShardQueue::contains`].
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.queue.contains(item)
    }

    /// See [`ShardQueue::remove`].
    pub fn remove(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.queue.remove(item)
    }

    /// See [`ShardQueue::iter`].
    pub fn iter(&self) -> Iter<'_, T>
    where
        T: Clone,
    {
        self.queue.iter()
    }

    /// See [`ShardQueue::to_vec`].
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.queue.to_vec()
    }

    /// The underlying non-blocking queue.
    pub fn nonblocking(&self) -> &ShardQueue<T> {
        &self.queue
    }
}

impl<T> fmt::Debug for BlockingShardQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingShardQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("waiters", &self.waiter_count())
            .finish()
    }
}
