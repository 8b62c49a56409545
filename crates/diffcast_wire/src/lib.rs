//! # Diffcast Wire
//!
//! Deterministic payload encoding and broker wire frames for diffcast.
//!
//! This crate provides:
//! - `EventPayload`, the self-describing change envelope
//! - `PublishRecord`, one keyed record per change
//! - Broker frames (Hello, Produce) and their CBOR codecs
//! - `CompressionCodec` declared at handshake
//!
//! All encoding is canonical CBOR (RFC 8949 map-key ordering): equal
//! logical content always produces identical bytes, so consumers can
//! deduplicate at-least-once redeliveries by comparing payloads.
//!
//! This is a pure codec crate with no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod canonical;
mod error;
mod frames;
mod payload;
mod record;

pub use error::{WireError, WireResult};
pub use frames::{
    CompressionCodec, Frame, HelloRequest, HelloResponse, ProduceEntry, ProduceRequest,
    ProduceResponse, RejectedEntry, PROTOCOL_VERSION,
};
pub use payload::{EventPayload, PAYLOAD_VERSION};
pub use record::PublishRecord;
