//! Records handed to a broker producer.

use crate::error::WireResult;
use crate::payload::EventPayload;
use bytes::Bytes;
use diffcast_model::{NodeChange, RelationshipChange, SequenceNumber};
use std::fmt;

/// One record bound for a broker topic.
///
/// Every change in a committed diff maps to exactly one record. The key
/// is the changed entity's partition key, so a partitioned broker keeps
/// all records for one entity on one partition, in send order.
#[derive(Clone, PartialEq, Eq)]
pub struct PublishRecord {
    /// Destination topic.
    pub topic: String,
    /// Partition key.
    pub key: String,
    /// Canonical payload bytes.
    pub payload: Bytes,
}

impl PublishRecord {
    /// Creates a record from parts.
    #[must_use]
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            payload: payload.into(),
        }
    }

    /// Builds the record for a node change.
    pub fn for_node(
        topic: &str,
        sequence: SequenceNumber,
        change: &NodeChange,
    ) -> WireResult<Self> {
        let payload = EventPayload::node(sequence, change.clone()).encode()?;
        Ok(Self {
            topic: topic.to_string(),
            key: change.id.partition_key(),
            payload: Bytes::from(payload),
        })
    }

    /// Builds the record for a relationship change.
    ///
    /// Keyed by the relationship's own id, not its endpoints.
    pub fn for_relationship(
        topic: &str,
        sequence: SequenceNumber,
        change: &RelationshipChange,
    ) -> WireResult<Self> {
        let payload = EventPayload::relationship(sequence, change.clone()).encode()?;
        Ok(Self {
            topic: topic.to_string(),
            key: change.id.partition_key(),
            payload: Bytes::from(payload),
        })
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

impl fmt::Debug for PublishRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishRecord")
            .field("topic", &self.topic)
            .field("key", &self.key)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
