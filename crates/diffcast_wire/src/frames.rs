//! Request/response frames spoken between a producer and a broker.

use crate::canonical::{
    decode_map, opt_bool, opt_text, req_array, req_bytes, req_text, req_u64, MapBuilder,
};
use crate::error::{WireError, WireResult};
use crate::record::PublishRecord;
use bytes::Bytes;
use ciborium::value::{Integer, Value};
use std::fmt;
use std::str::FromStr;

/// Protocol version spoken by this build.
pub const PROTOCOL_VERSION: u16 = 1;

/// Compression codec a producer declares at handshake.
///
/// The reference broker stores payloads as sent; the declaration exists
/// so a real broker client can negotiate wire compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionCodec {
    /// No compression.
    None,
    /// Snappy block compression.
    #[default]
    Snappy,
    /// LZ4 frame compression.
    Lz4,
}

impl CompressionCodec {
    /// Returns the wire name of the codec.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Snappy => "snappy",
            Self::Lz4 => "lz4",
        }
    }
}

impl fmt::Display for CompressionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionCodec {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "snappy" => Ok(Self::Snappy),
            "lz4" => Ok(Self::Lz4),
            other => Err(WireError::malformed(format!(
                "unknown compression codec {other:?}"
            ))),
        }
    }
}

/// Connection handshake from a producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloRequest {
    /// Client name, for broker-side diagnostics.
    pub client: String,
    /// Protocol version the client speaks.
    pub protocol_version: u16,
    /// Compression the client will apply to payloads.
    pub compression: CompressionCodec,
}

impl HelloRequest {
    /// Creates a handshake for the current protocol version.
    pub fn new(client: impl Into<String>, compression: CompressionCodec) -> Self {
        Self {
            client: client.into(),
            protocol_version: PROTOCOL_VERSION,
            compression,
        }
    }

    /// Encodes to canonical CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        MapBuilder::new()
            .field("client", Value::Text(self.client.clone()))
            .field(
                "version",
                Value::Integer(Integer::from(self.protocol_version)),
            )
            .field(
                "compression",
                Value::Text(self.compression.as_str().to_string()),
            )
            .into_bytes()
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        let map = decode_map(bytes)?;
        let protocol_version = u16::try_from(req_u64(&map, "version")?)
            .map_err(|_| WireError::malformed("protocol version out of range"))?;
        let compression = req_text(&map, "compression")?.parse()?;
        Ok(Self {
            client: req_text(&map, "client")?.to_string(),
            protocol_version,
            compression,
        })
    }
}

/// Broker's answer to a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloResponse {
    /// Whether the connection was accepted.
    pub success: bool,
    /// Refusal reason if not.
    pub error: Option<String>,
    /// Protocol version the broker speaks.
    pub protocol_version: u16,
}

impl HelloResponse {
    /// Creates an accepting response.
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            success: true,
            error: None,
            protocol_version: PROTOCOL_VERSION,
        }
    }

    /// Creates a refusing response.
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            protocol_version: PROTOCOL_VERSION,
        }
    }

    /// Encodes to canonical CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        MapBuilder::new()
            .field("success", Value::Bool(self.success))
            .field(
                "version",
                Value::Integer(Integer::from(self.protocol_version)),
            )
            .optional_text("error", self.error.as_deref())
            .into_bytes()
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        let map = decode_map(bytes)?;
        let protocol_version = u16::try_from(req_u64(&map, "version")?)
            .map_err(|_| WireError::malformed("protocol version out of range"))?;
        Ok(Self {
            success: opt_bool(&map, "success", false),
            error: opt_text(&map, "error").map(str::to_string),
            protocol_version,
        })
    }
}

/// One keyed payload inside a produce request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceEntry {
    /// Partition key.
    pub key: String,
    /// Payload bytes.
    pub payload: Bytes,
}

impl From<&PublishRecord> for ProduceEntry {
    fn from(record: &PublishRecord) -> Self {
        Self {
            key: record.key.clone(),
            payload: record.payload.clone(),
        }
    }
}

/// Batched append to one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequest {
    /// Destination topic.
    pub topic: String,
    /// Entries in send order.
    pub entries: Vec<ProduceEntry>,
}

impl ProduceRequest {
    /// Creates a produce request.
    pub fn new(topic: impl Into<String>, entries: Vec<ProduceEntry>) -> Self {
        Self {
            topic: topic.into(),
            entries,
        }
    }

    /// Encodes to canonical CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        let entries: Vec<Value> = self
            .entries
            .iter()
            .map(|entry| {
                MapBuilder::new()
                    .field("key", Value::Text(entry.key.clone()))
                    .field("payload", Value::Bytes(entry.payload.to_vec()))
                    .into_value()
            })
            .collect();

        MapBuilder::new()
            .field("topic", Value::Text(self.topic.clone()))
            .field("entries", Value::Array(entries))
            .into_bytes()
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        let map = decode_map(bytes)?;
        let topic = req_text(&map, "topic")?.to_string();
        let entries = req_array(&map, "entries")?
            .iter()
            .map(|value| {
                let entry = value
                    .as_map()
                    .map(Vec::as_slice)
                    .ok_or_else(|| WireError::malformed("produce entry is not a map"))?;
                Ok(ProduceEntry {
                    key: req_text(entry, "key")?.to_string(),
                    payload: Bytes::from(req_bytes(entry, "payload")?.to_vec()),
                })
            })
            .collect::<WireResult<Vec<_>>>()?;
        Ok(Self { topic, entries })
    }
}

/// A rejected entry inside a produce response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// Index into the request's entries.
    pub index: u32,
    /// Why the broker refused it.
    pub reason: String,
}

/// Broker's answer to a produce request.
///
/// Rejections are reported per entry; a response is only `success` when
/// every entry was appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponse {
    /// Whether every entry was appended.
    pub success: bool,
    /// Request-level failure, when nothing was attempted.
    pub error: Option<String>,
    /// Number of entries appended.
    pub accepted: u64,
    /// Log offset of the first appended entry. Meaningless when
    /// `accepted` is zero.
    pub base_offset: u64,
    /// Entries the broker refused.
    pub rejected: Vec<RejectedEntry>,
}

impl ProduceResponse {
    /// Creates an all-accepted response.
    #[must_use]
    pub fn accepted(count: u64, base_offset: u64) -> Self {
        Self {
            success: true,
            error: None,
            accepted: count,
            base_offset,
            rejected: Vec::new(),
        }
    }

    /// Creates a response with per-entry rejections.
    #[must_use]
    pub fn partial(accepted: u64, base_offset: u64, rejected: Vec<RejectedEntry>) -> Self {
        Self {
            success: rejected.is_empty(),
            error: None,
            accepted,
            base_offset,
            rejected,
        }
    }

    /// Creates a request-level refusal.
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            accepted: 0,
            base_offset: 0,
            rejected: Vec::new(),
        }
    }

    /// Encodes to canonical CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        let rejected: Vec<Value> = self
            .rejected
            .iter()
            .map(|entry| {
                MapBuilder::new()
                    .field("index", Value::Integer(Integer::from(entry.index)))
                    .field("reason", Value::Text(entry.reason.clone()))
                    .into_value()
            })
            .collect();

        MapBuilder::new()
            .field("success", Value::Bool(self.success))
            .field("accepted", Value::Integer(Integer::from(self.accepted)))
            .field("base", Value::Integer(Integer::from(self.base_offset)))
            .field("rejected", Value::Array(rejected))
            .optional_text("error", self.error.as_deref())
            .into_bytes()
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        let map = decode_map(bytes)?;
        let rejected = req_array(&map, "rejected")?
            .iter()
            .map(|value| {
                let entry = value
                    .as_map()
                    .map(Vec::as_slice)
                    .ok_or_else(|| WireError::malformed("rejected entry is not a map"))?;
                let index = u32::try_from(req_u64(entry, "index")?)
                    .map_err(|_| WireError::malformed("rejected index out of range"))?;
                Ok(RejectedEntry {
                    index,
                    reason: req_text(entry, "reason")?.to_string(),
                })
            })
            .collect::<WireResult<Vec<_>>>()?;
        Ok(Self {
            success: opt_bool(&map, "success", false),
            error: opt_text(&map, "error").map(str::to_string),
            accepted: req_u64(&map, "accepted")?,
            base_offset: req_u64(&map, "base")?,
            rejected,
        })
    }
}

/// A tagged frame, so one byte-level exchange can carry any message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Handshake request.
    Hello(HelloRequest),
    /// Handshake response.
    HelloAck(HelloResponse),
    /// Produce request.
    Produce(ProduceRequest),
    /// Produce response.
    ProduceAck(ProduceResponse),
}

impl Frame {
    /// Returns the frame type code.
    #[must_use]
    pub fn type_code(&self) -> u8 {
        match self {
            Frame::Hello(_) => 1,
            Frame::HelloAck(_) => 2,
            Frame::Produce(_) => 3,
            Frame::ProduceAck(_) => 4,
        }
    }

    /// Encodes the frame with its type tag.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        let body = match self {
            Frame::Hello(msg) => msg.encode()?,
            Frame::HelloAck(msg) => msg.encode()?,
            Frame::Produce(msg) => msg.encode()?,
            Frame::ProduceAck(msg) => msg.encode()?,
        };
        MapBuilder::new()
            .field("t", Value::Integer(Integer::from(self.type_code())))
            .field("body", Value::Bytes(body))
            .into_bytes()
    }

    /// Decodes a tagged frame.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        let map = decode_map(bytes)?;
        let code = u8::try_from(req_u64(&map, "t")?)
            .map_err(|_| WireError::malformed("frame type code out of range"))?;
        let body = req_bytes(&map, "body")?;
        match code {
            1 => Ok(Frame::Hello(HelloRequest::decode(body)?)),
            2 => Ok(Frame::HelloAck(HelloResponse::decode(body)?)),
            3 => Ok(Frame::Produce(ProduceRequest::decode(body)?)),
            4 => Ok(Frame::ProduceAck(ProduceResponse::decode(body)?)),
            other => Err(WireError::UnknownFrame(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_roundtrip() {
        let req = HelloRequest::new("diffcast", CompressionCodec::Snappy);
        let decoded = HelloRequest::decode(&req.encode().unwrap()).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(decoded.protocol_version, PROTOCOL_VERSION);
    }

    #[test]
    fn hello_refusal_carries_reason() {
        let resp = HelloResponse::refused("broker unavailable");
        let decoded = HelloResponse::decode(&resp.encode().unwrap()).unwrap();
        assert!(!decoded.success);
        assert_eq!(decoded.error.as_deref(), Some("broker unavailable"));
    }

    #[test]
    fn produce_request_roundtrip() {
        let req = ProduceRequest::new(
            "nodes",
            vec![
                ProduceEntry {
                    key: "a".into(),
                    payload: Bytes::from_static(&[1, 2, 3]),
                },
                ProduceEntry {
                    key: "b".into(),
                    payload: Bytes::from_static(&[4]),
                },
            ],
        );
        let decoded = ProduceRequest::decode(&req.encode().unwrap()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn produce_response_partial_enumerates_rejections() {
        let resp = ProduceResponse::partial(
            3,
            17,
            vec![RejectedEntry {
                index: 1,
                reason: "key refused".into(),
            }],
        );
        assert!(!resp.success);
        let decoded = ProduceResponse::decode(&resp.encode().unwrap()).unwrap();
        assert_eq!(decoded.accepted, 3);
        assert_eq!(decoded.base_offset, 17);
        assert_eq!(decoded.rejected.len(), 1);
        assert_eq!(decoded.rejected[0].index, 1);
    }

    #[test]
    fn frame_dispatch() {
        let frame = Frame::Hello(HelloRequest::new("client", CompressionCodec::None));
        let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.type_code(), 1);
    }

    #[test]
    fn unknown_frame_code_is_an_error() {
        let bytes = MapBuilder::new()
            .field("t", Value::Integer(Integer::from(99u8)))
            .field("body", Value::Bytes(vec![]))
            .into_bytes()
            .unwrap();
        assert!(matches!(
            Frame::decode(&bytes),
            Err(WireError::UnknownFrame(99))
        ));
    }

    #[test]
    fn compression_codec_parses() {
        assert_eq!(
            "snappy".parse::<CompressionCodec>().unwrap(),
            CompressionCodec::Snappy
        );
        assert!("zstd".parse::<CompressionCodec>().is_err());
        assert_eq!(CompressionCodec::default(), CompressionCodec::Snappy);
    }
}
