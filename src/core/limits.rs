/*!
 * Queue Limits and Constants
 *
 * Centralized location for capacity bounds and layout thresholds.
 * Values include rationale comments explaining why they exist.
 */

/// Maximum constructible capacity (2^30 slots)
/// Larger rings exceed any realistic in-process buffering need while the
/// ticket counters still need headroom before signed wraparound
/// [PERF] The cap is itself a power of two, so it is a legal capacity
pub const MAX_CAPACITY: usize = 1 << 30;

/// Per-shard slot count exponent (2^15 slots per shard)
/// Rings larger than this are split into independent shards so producers
/// and consumers contending on different positions touch different
/// allocations
/// [PERF] Trades shard count against per-shard allocation overhead
pub const SHARD_SLOT_LEVEL: u32 = 15;

/// Cache line size for padding calculations
/// Most modern architectures use 64-byte cache lines (x86-64, ARM64, RISC-V)
pub const CACHE_LINE: usize = 64;
