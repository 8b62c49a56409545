//! Bounded send buffer.

use diffcast_wire::PublishRecord;
use std::collections::VecDeque;

/// A bounded FIFO of records awaiting delivery.
///
/// The buffer preserves append order, which is what gives buffered
/// producers their per-key ordering: records for the same key are
/// drained in the order they were appended.
#[derive(Debug)]
pub struct SendBuffer {
    records: VecDeque<PublishRecord>,
    capacity: usize,
}

impl SendBuffer {
    /// Creates a buffer holding at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends a record, or hands it back when the buffer is full.
    pub fn try_append(&mut self, record: PublishRecord) -> Result<(), PublishRecord> {
        if self.records.len() >= self.capacity {
            return Err(record);
        }
        self.records.push_back(record);
        Ok(())
    }

    /// Returns up to `max` records from the front without removing them.
    ///
    /// Payload bytes are reference-counted, so the clones are cheap.
    #[must_use]
    pub fn pending_batch(&self, max: usize) -> Vec<PublishRecord> {
        self.records.iter().take(max).cloned().collect()
    }

    /// Removes the first `count` records after the broker accepted them.
    pub fn acknowledge(&mut self, count: usize) {
        let count = count.min(self.records.len());
        self.records.drain(..count);
    }

    /// Number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns `true` when another append would be refused.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Maximum number of records the buffer holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str) -> PublishRecord {
        PublishRecord::new("nodes", key, vec![0u8])
    }

    #[test]
    fn append_preserves_order() {
        let mut buffer = SendBuffer::new(8);
        buffer.try_append(record("a")).unwrap();
        buffer.try_append(record("b")).unwrap();
        buffer.try_append(record("c")).unwrap();

        let batch = buffer.pending_batch(10);
        let keys: Vec<_> = batch.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn full_buffer_returns_the_record() {
        let mut buffer = SendBuffer::new(2);
        buffer.try_append(record("a")).unwrap();
        buffer.try_append(record("b")).unwrap();
        assert!(buffer.is_full());

        let rejected = buffer.try_append(record("c")).unwrap_err();
        assert_eq!(rejected.key, "c");
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn acknowledge_removes_from_front() {
        let mut buffer = SendBuffer::new(8);
        for key in ["a", "b", "c", "d"] {
            buffer.try_append(record(key)).unwrap();
        }

        buffer.acknowledge(2);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.pending_batch(1)[0].key, "c");
    }

    #[test]
    fn acknowledge_past_the_end_empties() {
        let mut buffer = SendBuffer::new(8);
        buffer.try_append(record("a")).unwrap();
        buffer.acknowledge(100);
        assert!(buffer.is_empty());
    }

    #[test]
    fn pending_batch_does_not_consume() {
        let mut buffer = SendBuffer::new(8);
        buffer.try_append(record("a")).unwrap();

        let first = buffer.pending_batch(10);
        let second = buffer.pending_batch(10);
        assert_eq!(first, second);
        assert_eq!(buffer.len(), 1);
    }
}
