//! Bitmask value tracking which constituents of a composite event occurred.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Most constituents a single composite event may track.
///
/// Bits must fit the signed integer representation hosts commonly store.
pub const MAX_CONSTITUENTS: usize = 31;

/// Accumulated constituent bits, owned and stored by the host instance.
///
/// # Example
///
/// ```rust
/// use statecraft::core::CompositeEventStatus;
///
/// let status = CompositeEventStatus::new().with(0b01).with(0b10);
/// assert_eq!(status.bits(), 3);
/// assert!(status.is_complete(0b11));
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeEventStatus(u32);

impl CompositeEventStatus {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Status with `flag` set in addition to the current bits.
    pub fn with(self, flag: u32) -> Self {
        Self(self.0 | flag)
    }

    pub fn is_set(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    pub fn is_complete(&self, complete: u32) -> bool {
        self.0 == complete
    }
}

impl fmt::Debug for CompositeEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompositeEventStatus({:#b})", self.0)
    }
}

impl From<u32> for CompositeEventStatus {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_a_flag_is_idempotent() {
        let once = CompositeEventStatus::new().with(0b100);
        let twice = once.with(0b100);

        assert_eq!(once, twice);
        assert!(twice.is_set(0b100));
        assert!(!twice.is_set(0b001));
    }

    #[test]
    fn complete_requires_exact_mask() {
        let partial = CompositeEventStatus::from_bits(0b01);
        assert!(!partial.is_complete(0b11));
        assert!(partial.with(0b10).is_complete(0b11));
    }

    #[test]
    fn status_serializes_as_plain_integer() {
        let status = CompositeEventStatus::from_bits(5);
        assert_eq!(serde_json::to_string(&status).unwrap(), "5");
    }
}
