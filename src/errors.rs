/*!
 * Error Types
 * Centralized error handling with thiserror
 */

use crate::core::limits::MAX_CAPACITY;
use thiserror::Error;

/// Construction-time errors.
///
/// The data path itself never errors: a full ring surfaces as a failed
/// `offer`, an empty one as an absent `poll`, and deadline expiry as an
/// empty/false timed result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("capacity must be at least 1")]
    CapacityTooSmall,

    #[error("capacity {0} exceeds the maximum of {MAX_CAPACITY}")]
    CapacityExceeded(usize),
}
