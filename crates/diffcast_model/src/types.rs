//! Core scalar types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Commit sequence number assigned by the host.
///
/// Strictly increasing across the host's committed transactions. Stamped
/// into every published payload so consumers can order and deduplicate
/// events per entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[inline]
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

impl From<u64> for SequenceNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SequenceNumber> for u64 {
    fn from(seq: SequenceNumber) -> Self {
        seq.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_ordering() {
        let a = SequenceNumber::new(1);
        let b = SequenceNumber::new(2);
        assert!(a < b);
        assert_eq!(a.next(), b);
    }

    #[test]
    fn sequence_number_display() {
        assert_eq!(SequenceNumber::new(42).to_string(), "seq:42");
    }

    #[test]
    fn sequence_number_serde_is_transparent() {
        let seq = SequenceNumber::new(7);
        assert_eq!(serde_json::to_string(&seq).unwrap(), "7");
    }
}
