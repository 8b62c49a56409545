//! Per-transaction change sets.

use crate::{NodeChange, RelationshipChange, SequenceNumber};
use serde::{Deserialize, Serialize};

/// All graph changes made by one committed transaction.
///
/// The vectors hold changes in the order the host reported them; that
/// order is preserved all the way to the broker, which is what gives
/// consumers per-entity ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDiff {
    /// Commit sequence number of the transaction.
    pub sequence: SequenceNumber,
    /// Node changes, in host order.
    #[serde(default)]
    pub nodes: Vec<NodeChange>,
    /// Relationship changes, in host order.
    #[serde(default)]
    pub relationships: Vec<RelationshipChange>,
}

impl TransactionDiff {
    /// Creates an empty diff for the given commit sequence.
    #[must_use]
    pub fn new(sequence: SequenceNumber) -> Self {
        Self {
            sequence,
            nodes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Starts a builder for the given commit sequence.
    #[must_use]
    pub fn builder(sequence: impl Into<SequenceNumber>) -> DiffBuilder {
        DiffBuilder::new(sequence)
    }

    /// Returns `true` if the transaction changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    /// Total number of changes in the diff.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.nodes.len() + self.relationships.len()
    }
}

/// Builder for [`TransactionDiff`].
///
/// Infallible; hosts append changes in commit order and call
/// [`DiffBuilder::build`].
#[derive(Debug, Clone)]
pub struct DiffBuilder {
    diff: TransactionDiff,
}

impl DiffBuilder {
    /// Creates a builder for the given commit sequence.
    #[must_use]
    pub fn new(sequence: impl Into<SequenceNumber>) -> Self {
        Self {
            diff: TransactionDiff::new(sequence.into()),
        }
    }

    /// Appends a node change.
    #[must_use]
    pub fn node(mut self, change: NodeChange) -> Self {
        self.diff.nodes.push(change);
        self
    }

    /// Appends a relationship change.
    #[must_use]
    pub fn relationship(mut self, change: RelationshipChange) -> Self {
        self.diff.relationships.push(change);
        self
    }

    /// Finishes the diff.
    #[must_use]
    pub fn build(self) -> TransactionDiff {
        self.diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityId, PropertyMap};

    #[test]
    fn empty_diff() {
        let diff = TransactionDiff::new(SequenceNumber::new(1));
        assert!(diff.is_empty());
        assert_eq!(diff.change_count(), 0);
    }

    #[test]
    fn builder_preserves_order() {
        let a = EntityId::from_bytes([1u8; 16]);
        let b = EntityId::from_bytes([2u8; 16]);
        let diff = TransactionDiff::builder(7u64)
            .node(NodeChange::created(a, vec![], PropertyMap::new()))
            .node(NodeChange::deleted(b))
            .relationship(RelationshipChange::deleted(
                EntityId::from_bytes([3u8; 16]),
                a,
                b,
                "KNOWS",
            ))
            .build();

        assert_eq!(diff.sequence, SequenceNumber::new(7));
        assert_eq!(diff.change_count(), 3);
        assert_eq!(diff.nodes[0].id, a);
        assert_eq!(diff.nodes[1].id, b);
        assert_eq!(diff.relationships.len(), 1);
    }

    #[test]
    fn diff_json_roundtrip() {
        let diff = TransactionDiff::builder(3u64)
            .node(NodeChange::deleted(EntityId::from_bytes([5u8; 16])))
            .build();
        let json = serde_json::to_string(&diff).unwrap();
        let back: TransactionDiff = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diff);
    }

    #[test]
    fn missing_vectors_default_to_empty() {
        let diff: TransactionDiff = serde_json::from_str("{\"sequence\":9}").unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.sequence, SequenceNumber::new(9));
    }
}
