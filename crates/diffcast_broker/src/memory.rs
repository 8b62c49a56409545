//! In-memory broker for tests, tools, and embedded use.

use crate::buffer::SendBuffer;
use crate::config::{AckLevel, ProducerConfig};
use crate::error::{BrokerError, BrokerResult};
use crate::producer::{FailedDelivery, FlushOutcome, ProducerClient, SendAck};
use bytes::Bytes;
use diffcast_wire::{
    CompressionCodec, Frame, HelloRequest, HelloResponse, ProduceRequest, ProduceResponse,
    PublishRecord, RejectedEntry, PROTOCOL_VERSION,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One record as stored by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Offset within the topic log.
    pub offset: u64,
    /// Partition key.
    pub key: String,
    /// Record payload.
    pub payload: Bytes,
}

/// Why the broker rejected an append.
#[derive(Debug, Clone)]
pub struct AppendRejection {
    /// Broker-side reason.
    pub reason: String,
    /// Whether retrying may help.
    pub retryable: bool,
}

impl AppendRejection {
    fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: false,
        }
    }

    fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: true,
        }
    }
}

/// An in-process broker holding topic logs in memory.
///
/// The broker maintains:
/// - One append-only log per topic, offsets assigned per topic
/// - The compression codec declared by the last handshake
/// - Fault injection switches for connection, key, and append failures
///
/// It serves both producers directly ([`MemoryProducer`]) and framed
/// clients (`LoopbackChannel` routes encoded frames to [`Self::handle_frame`]).
pub struct MemoryBroker {
    topics: RwLock<HashMap<String, Vec<StoredRecord>>>,
    declared_compression: RwLock<Option<CompressionCodec>>,
    refuse_connections: AtomicBool,
    refused_keys: Mutex<HashSet<String>>,
    fail_next: AtomicU64,
}

impl MemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            declared_compression: RwLock::new(None),
            refuse_connections: AtomicBool::new(false),
            refused_keys: Mutex::new(HashSet::new()),
            fail_next: AtomicU64::new(0),
        }
    }

    /// Appends one record to a topic log.
    pub fn append(&self, topic: &str, key: &str, payload: Bytes) -> Result<u64, AppendRejection> {
        if self.refused_keys.lock().contains(key) {
            return Err(AppendRejection::permanent("key refused by broker"));
        }

        let inject = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject {
            return Err(AppendRejection::transient("injected append failure"));
        }

        let mut topics = self.topics.write();
        let log = topics.entry(topic.to_string()).or_default();
        let offset = log.len() as u64;
        log.push(StoredRecord {
            offset,
            key: key.to_string(),
            payload,
        });
        Ok(offset)
    }

    /// Handles a handshake.
    pub fn handle_hello(&self, request: &HelloRequest) -> HelloResponse {
        if self.refuse_connections.load(Ordering::SeqCst) {
            return HelloResponse::refused("broker unavailable");
        }
        if request.protocol_version != PROTOCOL_VERSION {
            return HelloResponse::refused(format!(
                "unsupported protocol version {}",
                request.protocol_version
            ));
        }

        *self.declared_compression.write() = Some(request.compression);
        HelloResponse::accepted()
    }

    /// Handles a produce request, appending entries in order.
    ///
    /// Rejected entries are reported by index; the remaining entries are
    /// still appended.
    pub fn handle_produce(&self, request: &ProduceRequest) -> ProduceResponse {
        let mut accepted = 0u64;
        let mut base_offset = 0u64;
        let mut rejected = Vec::new();

        for (index, entry) in request.entries.iter().enumerate() {
            match self.append(&request.topic, &entry.key, entry.payload.clone()) {
                Ok(offset) => {
                    if accepted == 0 {
                        base_offset = offset;
                    }
                    accepted += 1;
                }
                Err(rejection) => {
                    warn!(
                        topic = %request.topic,
                        key = %entry.key,
                        reason = %rejection.reason,
                        "entry rejected"
                    );
                    rejected.push(RejectedEntry {
                        index: index as u32,
                        reason: rejection.reason,
                    });
                }
            }
        }

        if rejected.is_empty() {
            ProduceResponse::accepted(accepted, base_offset)
        } else {
            ProduceResponse::partial(accepted, base_offset, rejected)
        }
    }

    /// Handles one encoded request frame and returns the encoded response.
    ///
    /// Transport-level failures (undecodable bytes, a response frame sent
    /// as a request) are reported as `Err`; broker-level refusals travel
    /// inside the response frame.
    pub fn handle_frame(&self, request: &[u8]) -> Result<Vec<u8>, String> {
        let frame = Frame::decode(request).map_err(|e| e.to_string())?;
        let response = match frame {
            Frame::Hello(hello) => Frame::HelloAck(self.handle_hello(&hello)),
            Frame::Produce(produce) => Frame::ProduceAck(self.handle_produce(&produce)),
            Frame::HelloAck(_) | Frame::ProduceAck(_) => {
                return Err("response frame sent as request".to_string());
            }
        };
        response.encode().map_err(|e| e.to_string())
    }

    /// Returns every record in a topic, in offset order.
    #[must_use]
    pub fn records(&self, topic: &str) -> Vec<StoredRecord> {
        self.topics.read().get(topic).cloned().unwrap_or_default()
    }

    /// Returns the records for one key in a topic, in offset order.
    #[must_use]
    pub fn records_for_key(&self, topic: &str, key: &str) -> Vec<StoredRecord> {
        self.topics
            .read()
            .get(topic)
            .map(|log| log.iter().filter(|r| r.key == key).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of records in a topic.
    #[must_use]
    pub fn topic_len(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }

    /// Returns the topic names that hold at least one record, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// The compression codec declared by the last successful handshake.
    #[must_use]
    pub fn declared_compression(&self) -> Option<CompressionCodec> {
        *self.declared_compression.read()
    }

    /// Makes handshakes fail until reset.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Makes every append for this key fail terminally.
    pub fn refuse_key(&self, key: impl Into<String>) {
        self.refused_keys.lock().insert(key.into());
    }

    /// Makes the next `count` appends fail transiently.
    pub fn fail_next_appends(&self, count: u64) {
        self.fail_next.store(count, Ordering::SeqCst);
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// A producer appending straight into a [`MemoryBroker`].
///
/// This is the reference [`ProducerClient`]: the same ack, buffer, retry,
/// and flush semantics as the framed producer, without a wire format in
/// between.
pub struct MemoryProducer {
    broker: Arc<MemoryBroker>,
    config: ProducerConfig,
    buffer: Mutex<SendBuffer>,
    connected: AtomicBool,
    closed: AtomicBool,
}

impl MemoryProducer {
    /// Creates a producer for the given broker.
    #[must_use]
    pub fn new(broker: Arc<MemoryBroker>, config: ProducerConfig) -> Self {
        let buffer = SendBuffer::new(config.buffer_capacity);
        Self {
            broker,
            config,
            buffer: Mutex::new(buffer),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// The configuration this producer runs with.
    #[must_use]
    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Number of records waiting in the send buffer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }

    fn append_with_retry(&self, record: &PublishRecord) -> BrokerResult<u64> {
        let policy = &self.config.retry;
        let mut attempt = 0u32;
        loop {
            match self
                .broker
                .append(&record.topic, &record.key, record.payload.clone())
            {
                Ok(offset) => return Ok(offset),
                Err(rejection) => {
                    attempt += 1;
                    if !rejection.retryable || attempt >= policy.max_attempts {
                        return Err(BrokerError::delivery(
                            &record.topic,
                            &record.key,
                            rejection.reason,
                            rejection.retryable,
                        ));
                    }
                    debug!(
                        topic = %record.topic,
                        key = %record.key,
                        attempt,
                        "append rejected, retrying"
                    );
                    std::thread::sleep(policy.delay_for_attempt(attempt));
                }
            }
        }
    }
}

impl ProducerClient for MemoryProducer {
    fn connect(&self, _servers: &[String]) -> BrokerResult<()> {
        self.ensure_open()?;
        let hello = HelloRequest::new("memory", self.config.compression);
        let response = self.broker.handle_hello(&hello);
        if !response.success {
            let message = response
                .error
                .unwrap_or_else(|| "connection refused".to_string());
            return Err(BrokerError::connect(message));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, record: PublishRecord) -> BrokerResult<SendAck> {
        self.ensure_open()?;
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }

        match self.config.ack_level {
            AckLevel::Buffered => {
                let mut buffer = self.buffer.lock();
                match buffer.try_append(record) {
                    Ok(()) => Ok(SendAck::Buffered),
                    Err(_) => Err(BrokerError::BufferFull {
                        capacity: buffer.capacity(),
                    }),
                }
            }
            AckLevel::Acknowledged => {
                let offset = self.append_with_retry(&record)?;
                Ok(SendAck::Acknowledged { offset })
            }
        }
    }

    fn flush(&self, deadline: Duration) -> BrokerResult<FlushOutcome> {
        self.ensure_open()?;
        let started = Instant::now();
        let mut buffer = self.buffer.lock();
        let pending = buffer.pending_batch(buffer.len());
        let mut outcome = FlushOutcome::empty();

        for (index, record) in pending.iter().enumerate() {
            if started.elapsed() >= deadline {
                warn!(remaining = pending.len() - index, "flush deadline exceeded");
                for record in &pending[index..] {
                    outcome
                        .failed
                        .push(FailedDelivery::for_record(record, "flush deadline exceeded"));
                }
                break;
            }
            match self.append_with_retry(record) {
                Ok(_) => outcome.delivered += 1,
                Err(err) => {
                    outcome
                        .failed
                        .push(FailedDelivery::for_record(record, err.to_string()));
                }
            }
        }

        let len = buffer.len();
        buffer.acknowledge(len);
        debug!(
            delivered = outcome.delivered,
            failed = outcome.failed.len(),
            "flush complete"
        );
        Ok(outcome)
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
