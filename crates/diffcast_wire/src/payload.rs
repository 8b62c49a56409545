//! Self-describing event payloads.

use crate::canonical::{
    cbor_to_property_map, decode_map, property_map_to_cbor, req_array, req_entity_id, req_map,
    req_text, req_u64, MapBuilder,
};
use crate::error::{WireError, WireResult};
use ciborium::value::{Integer, Value};
use diffcast_model::{ChangeKind, EntityId, NodeChange, RelationshipChange, SequenceNumber};

/// Payload format version written by this build.
pub const PAYLOAD_VERSION: u8 = 1;

/// The event carried in a published record's payload.
///
/// Payloads are canonical CBOR maps: the same event encodes to the same
/// bytes on every call and every platform, so consumers can deduplicate
/// redeliveries byte-for-byte. Each payload is self-describing (version,
/// entity discriminant, change kind) and decodes without topic context.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// A node change.
    Node {
        /// Commit sequence of the owning transaction.
        sequence: SequenceNumber,
        /// The change.
        change: NodeChange,
    },
    /// A relationship change.
    Relationship {
        /// Commit sequence of the owning transaction.
        sequence: SequenceNumber,
        /// The change.
        change: RelationshipChange,
    },
}

impl EventPayload {
    /// Wraps a node change.
    #[must_use]
    pub fn node(sequence: SequenceNumber, change: NodeChange) -> Self {
        Self::Node { sequence, change }
    }

    /// Wraps a relationship change.
    #[must_use]
    pub fn relationship(sequence: SequenceNumber, change: RelationshipChange) -> Self {
        Self::Relationship { sequence, change }
    }

    /// Commit sequence of the owning transaction.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        match self {
            Self::Node { sequence, .. } | Self::Relationship { sequence, .. } => *sequence,
        }
    }

    /// ID of the changed entity.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Node { change, .. } => change.id,
            Self::Relationship { change, .. } => change.id,
        }
    }

    /// What happened to the entity.
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Node { change, .. } => change.kind,
            Self::Relationship { change, .. } => change.kind,
        }
    }

    /// The entity discriminant as written on the wire.
    #[must_use]
    pub fn entity_label(&self) -> &'static str {
        match self {
            Self::Node { .. } => "node",
            Self::Relationship { .. } => "relationship",
        }
    }

    /// Encodes to canonical CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        let builder = MapBuilder::new()
            .field("v", Value::Integer(Integer::from(PAYLOAD_VERSION)))
            .field("entity", Value::Text(self.entity_label().to_string()))
            .field(
                "seq",
                Value::Integer(Integer::from(self.sequence().as_u64())),
            )
            .field("kind", Value::Integer(Integer::from(self.kind().to_code())))
            .field(
                "id",
                Value::Bytes(self.entity_id().as_bytes().to_vec()),
            );

        let builder = match self {
            Self::Node { change, .. } => builder
                .field(
                    "labels",
                    Value::Array(
                        change
                            .labels
                            .iter()
                            .map(|l| Value::Text(l.clone()))
                            .collect(),
                    ),
                )
                .field("props", property_map_to_cbor(&change.properties)),
            Self::Relationship { change, .. } => builder
                .field("start", Value::Bytes(change.start.as_bytes().to_vec()))
                .field("end", Value::Bytes(change.end.as_bytes().to_vec()))
                .field("type", Value::Text(change.rel_type.clone()))
                .field("props", property_map_to_cbor(&change.properties)),
        };

        builder.into_bytes()
    }

    /// Decodes a payload.
    ///
    /// Truncated input, unknown discriminants, and unsupported versions
    /// are errors; decoding never panics.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        let map = decode_map(bytes)?;

        let version = req_u64(&map, "v")?;
        if version != u64::from(PAYLOAD_VERSION) {
            return Err(WireError::UnsupportedVersion {
                found: version,
                supported: PAYLOAD_VERSION,
            });
        }

        let sequence = SequenceNumber::new(req_u64(&map, "seq")?);
        let kind_code = u8::try_from(req_u64(&map, "kind")?)
            .map_err(|_| WireError::malformed("kind code out of range"))?;
        let kind = ChangeKind::from_code(kind_code).ok_or(WireError::UnknownKind(kind_code))?;
        let id = req_entity_id(&map, "id")?;

        match req_text(&map, "entity")? {
            "node" => {
                let labels = req_array(&map, "labels")?
                    .iter()
                    .map(|v| {
                        v.as_text()
                            .map(str::to_string)
                            .ok_or_else(|| WireError::malformed("label is not text"))
                    })
                    .collect::<WireResult<Vec<_>>>()?;
                let properties = cbor_to_property_map(req_map(&map, "props")?)?;
                Ok(Self::Node {
                    sequence,
                    change: NodeChange {
                        id,
                        kind,
                        labels,
                        properties,
                    },
                })
            }
            "relationship" => {
                let start = req_entity_id(&map, "start")?;
                let end = req_entity_id(&map, "end")?;
                let rel_type = req_text(&map, "type")?.to_string();
                let properties = cbor_to_property_map(req_map(&map, "props")?)?;
                Ok(Self::Relationship {
                    sequence,
                    change: RelationshipChange {
                        id,
                        kind,
                        start,
                        end,
                        rel_type,
                        properties,
                    },
                })
            }
            other => Err(WireError::malformed(format!(
                "unknown entity discriminant {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffcast_model::{PropertyMap, PropertyValue};
    use proptest::prelude::*;

    fn sample_node() -> NodeChange {
        let mut props = PropertyMap::new();
        props.insert("name".into(), PropertyValue::from("Alice"));
        props.insert("age".into(), PropertyValue::from(33i64));
        props.insert(
            "scores".into(),
            PropertyValue::List(vec![PropertyValue::Int(1), PropertyValue::Float(0.5)]),
        );
        NodeChange::created(
            EntityId::from_bytes([1u8; 16]),
            vec!["Person".into(), "Employee".into()],
            props,
        )
    }

    fn sample_relationship() -> RelationshipChange {
        let mut props = PropertyMap::new();
        props.insert("since".into(), PropertyValue::from(2020i64));
        RelationshipChange::created(
            EntityId::from_bytes([9u8; 16]),
            EntityId::from_bytes([1u8; 16]),
            EntityId::from_bytes([2u8; 16]),
            "KNOWS",
            props,
        )
    }

    #[test]
    fn node_payload_roundtrip() {
        let payload = EventPayload::node(SequenceNumber::new(42), sample_node());
        let bytes = payload.encode().unwrap();
        assert_eq!(EventPayload::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn relationship_payload_roundtrip() {
        let payload = EventPayload::relationship(SequenceNumber::new(7), sample_relationship());
        let bytes = payload.encode().unwrap();
        let decoded = EventPayload::decode(&bytes).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.entity_label(), "relationship");
    }

    #[test]
    fn deleted_node_payload_is_minimal_but_complete() {
        let payload = EventPayload::node(
            SequenceNumber::new(3),
            NodeChange::deleted(EntityId::from_bytes([5u8; 16])),
        );
        let decoded = EventPayload::decode(&payload.encode().unwrap()).unwrap();
        assert_eq!(decoded.kind(), ChangeKind::Deleted);
        assert_eq!(decoded.entity_id(), EntityId::from_bytes([5u8; 16]));
    }

    #[test]
    fn unknown_kind_code_is_an_error() {
        let bytes = MapBuilder::new()
            .field("v", Value::Integer(Integer::from(PAYLOAD_VERSION)))
            .field("entity", Value::Text("node".into()))
            .field("seq", Value::Integer(Integer::from(1u8)))
            .field("kind", Value::Integer(Integer::from(99u8)))
            .field("id", Value::Bytes(vec![0u8; 16]))
            .field("labels", Value::Array(vec![]))
            .field("props", Value::Map(vec![]))
            .into_bytes()
            .unwrap();
        assert!(matches!(
            EventPayload::decode(&bytes),
            Err(WireError::UnknownKind(99))
        ));
    }

    #[test]
    fn future_version_is_an_error() {
        let bytes = MapBuilder::new()
            .field("v", Value::Integer(Integer::from(9u8)))
            .field("entity", Value::Text("node".into()))
            .field("seq", Value::Integer(Integer::from(1u8)))
            .field("kind", Value::Integer(Integer::from(1u8)))
            .field("id", Value::Bytes(vec![0u8; 16]))
            .into_bytes()
            .unwrap();
        assert!(matches!(
            EventPayload::decode(&bytes),
            Err(WireError::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let bytes = EventPayload::node(SequenceNumber::new(1), sample_node())
            .encode()
            .unwrap();
        assert!(EventPayload::decode(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn unknown_entity_discriminant_is_an_error() {
        let bytes = MapBuilder::new()
            .field("v", Value::Integer(Integer::from(PAYLOAD_VERSION)))
            .field("entity", Value::Text("hyperedge".into()))
            .field("seq", Value::Integer(Integer::from(1u8)))
            .field("kind", Value::Integer(Integer::from(1u8)))
            .field("id", Value::Bytes(vec![0u8; 16]))
            .into_bytes()
            .unwrap();
        let err = EventPayload::decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("hyperedge"));
    }

    fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
        any::<[u8; 16]>().prop_map(EntityId::from_bytes)
    }

    fn property_value_strategy() -> impl Strategy<Value = PropertyValue> {
        let leaf = prop_oneof![
            Just(PropertyValue::Null),
            any::<bool>().prop_map(PropertyValue::Bool),
            any::<i64>().prop_map(PropertyValue::Int),
            prop::num::f64::NORMAL.prop_map(PropertyValue::Float),
            "[a-z]{0,8}".prop_map(PropertyValue::Text),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(PropertyValue::Bytes),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(PropertyValue::List)
        })
    }

    fn node_change_strategy() -> impl Strategy<Value = NodeChange> {
        (
            entity_id_strategy(),
            1u8..=3,
            prop::collection::vec("[A-Z][a-z]{0,6}", 0..3),
            prop::collection::btree_map("[a-z_]{1,8}", property_value_strategy(), 0..5),
        )
            .prop_map(|(id, code, labels, properties)| NodeChange {
                id,
                kind: ChangeKind::from_code(code).unwrap(),
                labels,
                properties,
            })
    }

    proptest! {
        #[test]
        fn arbitrary_node_payloads_roundtrip(
            change in node_change_strategy(),
            seq in any::<u64>(),
        ) {
            let payload = EventPayload::node(SequenceNumber::new(seq), change);
            let bytes = payload.encode().unwrap();
            prop_assert_eq!(EventPayload::decode(&bytes).unwrap(), payload);
        }

        #[test]
        fn encoding_is_deterministic(change in node_change_strategy()) {
            let payload = EventPayload::node(SequenceNumber::new(1), change);
            prop_assert_eq!(payload.encode().unwrap(), payload.encode().unwrap());
        }
    }
}
