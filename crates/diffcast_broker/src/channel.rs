//! Framed producer over a byte-exchange channel.
//!
//! The actual carrier is abstracted via a trait so the producer logic
//! works over different transports (TCP, unix sockets, an in-process
//! broker) without modification.

use crate::buffer::SendBuffer;
use crate::config::{AckLevel, ProducerConfig};
use crate::error::{BrokerError, BrokerResult};
use crate::memory::MemoryBroker;
use crate::producer::{FailedDelivery, FlushOutcome, ProducerClient, SendAck};
use diffcast_wire::{
    Frame, HelloRequest, ProduceEntry, ProduceRequest, ProduceResponse, PublishRecord,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Byte-level exchange with a broker.
///
/// Implement this trait to provide the actual transport. One call
/// carries one encoded request frame and returns the encoded response
/// frame.
pub trait BrokerChannel: Send + Sync {
    /// Sends a request frame and returns the response frame.
    fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, String>;

    /// Checks if the channel is usable.
    fn is_healthy(&self) -> bool;
}

/// A producer that speaks the frame protocol over a [`BrokerChannel`].
///
/// Requests are stateless, so a transport blip does not require a new
/// handshake: a later successful exchange restores the connected flag.
pub struct ChannelProducer<C: BrokerChannel> {
    channel: C,
    config: ProducerConfig,
    client_name: String,
    buffer: Mutex<SendBuffer>,
    connected: AtomicBool,
    closed: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: BrokerChannel> ChannelProducer<C> {
    /// Creates a producer over the given channel.
    pub fn new(channel: C, client_name: impl Into<String>, config: ProducerConfig) -> Self {
        let buffer = SendBuffer::new(config.buffer_capacity);
        Self {
            channel,
            config,
            client_name: client_name.into(),
            buffer: Mutex::new(buffer),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            last_error: RwLock::new(None),
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

    /// Returns the last transport error message.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }

    fn round_trip(&self, request: &Frame) -> BrokerResult<Frame> {
        let body = request.encode()?;
        let response = self.channel.exchange(&body).map_err(|e| {
            self.set_error(&e);
            self.connected.store(false, Ordering::SeqCst);
            BrokerError::transport_retryable(e)
        })?;
        Ok(Frame::decode(&response)?)
    }

    fn produce_once(&self, topic: &str, entries: &[ProduceEntry]) -> BrokerResult<ProduceResponse> {
        let request = ProduceRequest::new(topic, entries.to_vec());
        match self.round_trip(&Frame::Produce(request))? {
            Frame::ProduceAck(response) => Ok(response),
            other => Err(BrokerError::transport_fatal(format!(
                "unexpected response frame type {}",
                other.type_code()
            ))),
        }
    }

    /// Sends one produce request, retrying transport errors and
    /// whole-request refusals per the retry policy.
    ///
    /// A response with per-entry rejections is returned as-is; those
    /// rejections are terminal and the caller maps them to failures.
    fn produce_with_retry(
        &self,
        topic: &str,
        entries: &[ProduceEntry],
    ) -> BrokerResult<ProduceResponse> {
        let policy = &self.config.retry;
        let mut attempt = 0u32;
        loop {
            let result = self.produce_once(topic, entries).and_then(|response| {
                if !response.success && response.rejected.is_empty() {
                    let message = response
                        .error
                        .clone()
                        .unwrap_or_else(|| "request refused".to_string());
                    Err(BrokerError::Refused(message))
                } else {
                    Ok(response)
                }
            });

            match result {
                Ok(response) => {
                    self.connected.store(true, Ordering::SeqCst);
                    self.clear_error();
                    return Ok(response);
                }
                Err(err) => {
                    attempt += 1;
                    if !err.is_retryable() || attempt >= policy.max_attempts {
                        return Err(err);
                    }
                    debug!(topic, attempt, error = %err, "produce failed, retrying");
                    std::thread::sleep(policy.delay_for_attempt(attempt));
                }
            }
        }
    }
}

impl<C: BrokerChannel> ProducerClient for ChannelProducer<C> {
    fn connect(&self, _servers: &[String]) -> BrokerResult<()> {
        self.ensure_open()?;
        let hello = HelloRequest::new(self.client_name.clone(), self.config.compression);
        match self.round_trip(&Frame::Hello(hello)) {
            Ok(Frame::HelloAck(ack)) if ack.success => {
                self.connected.store(true, Ordering::SeqCst);
                self.clear_error();
                Ok(())
            }
            Ok(Frame::HelloAck(ack)) => {
                let message = ack
                    .error
                    .unwrap_or_else(|| "handshake refused".to_string());
                self.set_error(&message);
                Err(BrokerError::connect(message))
            }
            Ok(other) => Err(BrokerError::transport_fatal(format!(
                "unexpected response frame type {}",
                other.type_code()
            ))),
            Err(err) => Err(BrokerError::connect(err.to_string())),
        }
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
                let entry = ProduceEntry::from(&record);
                let response =
                    self.produce_with_retry(&record.topic, std::slice::from_ref(&entry))?;
                if let Some(rejection) = response.rejected.first() {
                    return Err(BrokerError::delivery(
                        &record.topic,
                        &record.key,
                        rejection.reason.clone(),
                        false,
                    ));
                }
                Ok(SendAck::Acknowledged {
                    offset: response.base_offset,
                })
            }
        }
    }

    fn flush(&self, deadline: Duration) -> BrokerResult<FlushOutcome> {
        self.ensure_open()?;
        let started = Instant::now();
        let mut buffer = self.buffer.lock();
        let mut outcome = FlushOutcome::empty();

        // Batches are split on topic boundaries; the deadline is checked
        // between requests, so one in-flight request may overshoot it.
        while !buffer.is_empty() {
            if started.elapsed() >= deadline {
                let remaining = buffer.pending_batch(buffer.len());
                warn!(remaining = remaining.len(), "flush deadline exceeded");
                for record in &remaining {
                    outcome
                        .failed
                        .push(FailedDelivery::for_record(record, "flush deadline exceeded"));
                }
                let len = buffer.len();
                buffer.acknowledge(len);
                break;
            }

            let batch = buffer.pending_batch(self.config.batch_size);
            let Some(first) = batch.first() else { break };
            let topic = first.topic.clone();
            let run: Vec<&PublishRecord> =
                batch.iter().take_while(|r| r.topic == topic).collect();
            let entries: Vec<ProduceEntry> =
                run.iter().map(|record| ProduceEntry::from(*record)).collect();

            match self.produce_with_retry(&topic, &entries) {
                Ok(response) => {
                    let mut rejected: HashMap<u32, &str> = HashMap::new();
                    for entry in &response.rejected {
                        rejected.insert(entry.index, entry.reason.as_str());
                    }
                    for (index, record) in run.iter().enumerate() {
                        match rejected.get(&(index as u32)) {
                            Some(reason) => {
                                outcome.failed.push(FailedDelivery::for_record(record, *reason));
                            }
                            None => outcome.delivered += 1,
                        }
                    }
                }
                Err(err) => {
                    for record in &run {
                        outcome
                            .failed
                            .push(FailedDelivery::for_record(record, err.to_string()));
                    }
                }
            }

            buffer.acknowledge(run.len());
        }

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
        self.connected.load(Ordering::SeqCst)
            && !self.closed.load(Ordering::SeqCst)
            && self.channel.is_healthy()
    }
}

/// A channel routing frames straight into an in-process [`MemoryBroker`].
///
/// Useful for tests and tools that want the full frame path without a
/// network.
pub struct LoopbackChannel {
    broker: Arc<MemoryBroker>,
}

impl LoopbackChannel {
    /// Creates a channel bound to the given broker.
    #[must_use]
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self { broker }
    }

    /// The broker this channel delivers to.
    #[must_use]
    pub fn broker(&self) -> &Arc<MemoryBroker> {
        &self.broker
    }
}

impl BrokerChannel for LoopbackChannel {
    fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, String> {
        self.broker.handle_frame(request)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
