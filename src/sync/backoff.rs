/*!
 * Backoff Policy
 *
 * Configurable spin/yield/park escalation for the contended retry sites:
 * slot publication on a wrapped ring, ticket CAS races, and bounded-retry
 * offers. The limits are a policy value rather than per-site constants so a
 * deployment can tune or replace them without touching the algorithms.
 */

use std::thread;
use std::time::Duration;

/// Escalation limits for one contended call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Busy-spins (CPU `spin_loop` hints) before the first yield
    pub spin_limit: u32,
    /// Cooperative yields before parking
    pub yield_limit: u32,
    /// Sleep quantum once spins and yields are exhausted
    pub park_interval: Duration,
    /// Full-slot retries a non-blocking offer makes before reporting failure
    pub offer_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            spin_limit: 64,
            yield_limit: 32,
            park_interval: Duration::from_micros(1),
            offer_retries: 4,
        }
    }
}

impl BackoffPolicy {
    /// Policy for latency-critical pipelines: spin much longer before
    /// surrendering the CPU.
    pub const fn low_latency() -> Self {
        Self {
            spin_limit: 512,
            yield_limit: 128,
            park_interval: Duration::from_micros(1),
            offer_retries: 16,
        }
    }

    /// Policy for oversubscribed hosts: yield almost immediately so peer
    /// threads can drain the ring.
    pub const fn cooperative() -> Self {
        Self {
            spin_limit: 4,
            yield_limit: 16,
            park_interval: Duration::from_micros(10),
            offer_retries: 4,
        }
    }
}

/// Per-call-site escalation state.
///
/// Create one `Backoff` per operation attempt; it walks the policy's
/// spin -> yield -> park ladder as `snooze` is called.
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    step: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, step: 0 }
    }

    /// Wait out one round of contention, escalating from busy-spin to
    /// cooperative yield to a brief park.
    #[inline]
    pub fn snooze(&mut self) {
        if self.step < self.policy.spin_limit {
            std::hint::spin_loop();
        } else if self.step < self.policy.spin_limit + self.policy.yield_limit {
            thread::yield_now();
        } else {
            thread::sleep(self.policy.park_interval);
        }
        self.step = self.step.saturating_add(1);
    }

    /// Brief pause for a lost CAS race. Never parks: the loser of a ticket
    /// race retries immediately because the winner made progress.
    #[inline]
    pub fn spin(&mut self) {
        std::hint::spin_loop();
        if self.step >= self.policy.spin_limit {
            thread::yield_now();
        }
        self.step = self.step.saturating_add(1);
    }

    /// Restart the escalation ladder.
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_bounds() {
        let policy = BackoffPolicy::default();
        assert!(policy.spin_limit > 0);
        assert!(policy.offer_retries > 0);
    }

    #[test]
    fn test_snooze_escalates_without_panicking() {
        let mut backoff = Backoff::new(BackoffPolicy {
            spin_limit: 2,
            yield_limit: 2,
            park_interval: Duration::from_nanos(1),
            offer_retries: 1,
        });
        // Walk through spin, yield, and park phases.
        for _ in 0..8 {
            backoff.snooze();
        }
        backoff.reset();
        backoff.spin();
    }

    #[test]
    fn test_presets_differ() {
        assert_ne!(BackoffPolicy::low_latency(), BackoffPolicy::cooperative());
    }
}
