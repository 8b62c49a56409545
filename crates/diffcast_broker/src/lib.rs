//! # Diffcast Broker
//!
//! Producer clients that deliver change records to a broker.
//!
//! This crate provides:
//! - Producer abstraction ([`ProducerClient`]) with ack levels
//! - Bounded send buffering and flush with a time budget
//! - Retry with exponential backoff for transient failures
//! - An in-memory broker with fault injection
//! - A framed producer over a pluggable byte channel
//!
//! ## Architecture
//!
//! Producers are synchronous: `send` and `flush` run on the caller's
//! thread and block until the configured acknowledgement arrives. Two
//! implementations ship here, sharing the same semantics:
//! 1. [`MemoryProducer`] appends straight into a [`MemoryBroker`]
//! 2. [`ChannelProducer`] speaks the frame protocol over a
//!    [`BrokerChannel`]
//!
//! ## Key Invariants
//!
//! - Records with the same key are delivered in send order
//! - Failed deliveries are enumerated per record, never collapsed
//! - `flush` drains the buffer completely, even when records fail
//! - `close` never flushes; callers flush first

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod channel;
mod config;
mod error;
mod memory;
mod producer;

pub use buffer::SendBuffer;
pub use channel::{BrokerChannel, ChannelProducer, LoopbackChannel};
pub use config::{AckLevel, ProducerConfig, RetryPolicy};
pub use error::{BrokerError, BrokerResult};
pub use memory::{AppendRejection, MemoryBroker, MemoryProducer, StoredRecord};
pub use producer::{FailedDelivery, FlushOutcome, ProducerClient, ScriptedProducer, SendAck};
