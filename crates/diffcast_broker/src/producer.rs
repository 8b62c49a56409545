//! Producer client abstraction.

use crate::error::{BrokerError, BrokerResult};
use diffcast_wire::PublishRecord;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// A producer client delivers records to a broker.
///
/// This trait is the seam between the publish pipeline and the broker:
/// implementations decide transport (in-process, framed channel, a real
/// broker driver) while callers rely on these semantics:
///
/// - `send` appends records in call order and never reorders records
///   that share a key
/// - `flush` attempts every buffered record, even when some fail, and
///   enumerates each failure in the outcome
/// - after `close`, `send` and `flush` fail with [`BrokerError::Closed`]
///
/// All methods are synchronous and run on the caller's thread.
pub trait ProducerClient: Send + Sync {
    /// Establishes the connection.
    ///
    /// Implementations that own dialing use `servers`; pre-bound
    /// transports validate reachability with a handshake instead.
    fn connect(&self, servers: &[String]) -> BrokerResult<()>;

    /// Sends one record, honoring the configured ack level.
    fn send(&self, record: PublishRecord) -> BrokerResult<SendAck>;

    /// Drains the send buffer within the given time budget.
    fn flush(&self, deadline: Duration) -> BrokerResult<FlushOutcome>;

    /// Closes the producer. Does not flush; callers flush first.
    fn close(&self) -> BrokerResult<()>;

    /// Returns `true` while the producer holds a usable connection.
    fn is_connected(&self) -> bool;
}

/// What a successful `send` observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendAck {
    /// The record sits in the local send buffer.
    Buffered,
    /// The broker acknowledged the append at this log offset.
    Acknowledged {
        /// Offset assigned by the broker.
        offset: u64,
    },
}

/// One record that could not be delivered.
///
/// The unit of partial-failure reporting: flush outcomes, publish errors,
/// and stop reports all enumerate these rather than collapsing into a
/// single generic error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelivery {
    /// Destination topic.
    pub topic: String,
    /// Partition key.
    pub key: String,
    /// Why delivery failed.
    pub reason: String,
}

impl FailedDelivery {
    /// Creates a failure entry.
    pub fn new(
        topic: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a failure entry for a record.
    #[must_use]
    pub fn for_record(record: &PublishRecord, reason: impl Into<String>) -> Self {
        Self::new(&record.topic, &record.key, reason)
    }
}

/// Result of draining the send buffer.
#[derive(Debug, Clone, Default)]
pub struct FlushOutcome {
    /// Records delivered to the broker.
    pub delivered: usize,
    /// Records that could not be delivered, in buffer order.
    pub failed: Vec<FailedDelivery>,
}

impl FlushOutcome {
    /// An outcome with nothing delivered and nothing failed.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` when every record was delivered.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A scripted producer for tests.
///
/// Successful sends are recorded for assertions; failures are scripted
/// per key, per connect, or per flush.
#[derive(Debug, Default)]
pub struct ScriptedProducer {
    connected: AtomicBool,
    closed: AtomicBool,
    next_offset: AtomicU64,
    connect_error: Mutex<Option<String>>,
    fail_keys: Mutex<HashSet<String>>,
    flush_failures: Mutex<Vec<FailedDelivery>>,
    sent: Mutex<Vec<PublishRecord>>,
}

impl ScriptedProducer {
    /// Creates a producer that starts disconnected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `connect` fail with this message.
    pub fn set_connect_error(&self, message: impl Into<String>) {
        *self.connect_error.lock() = Some(message.into());
    }

    /// Makes every send for this key fail terminally.
    pub fn fail_key(&self, key: impl Into<String>) {
        self.fail_keys.lock().insert(key.into());
    }

    /// Makes the next flush report these failures.
    pub fn set_flush_failures(&self, failures: Vec<FailedDelivery>) {
        *self.flush_failures.lock() = failures;
    }

    /// Returns every successfully sent record.
    #[must_use]
    pub fn sent(&self) -> Vec<PublishRecord> {
        self.sent.lock().clone()
    }

    /// Returns the keys of successfully sent records, in send order.
    #[must_use]
    pub fn sent_keys(&self) -> Vec<String> {
        self.sent.lock().iter().map(|r| r.key.clone()).collect()
    }
}

impl ProducerClient for ScriptedProducer {
    fn connect(&self, _servers: &[String]) -> BrokerResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        if let Some(message) = self.connect_error.lock().take() {
            return Err(BrokerError::connect(message));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, record: PublishRecord) -> BrokerResult<SendAck> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        if self.fail_keys.lock().contains(&record.key) {
            return Err(BrokerError::delivery(
                &record.topic,
                &record.key,
                "scripted failure",
                false,
            ));
        }
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(record);
        Ok(SendAck::Acknowledged { offset })
    }

    fn flush(&self, _deadline: Duration) -> BrokerResult<FlushOutcome> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        let failed = std::mem::take(&mut *self.flush_failures.lock());
        Ok(FlushOutcome {
            delivered: 0,
            failed,
        })
    }

    fn close(&self) -> BrokerResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }
}
