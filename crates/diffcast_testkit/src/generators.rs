//! Property-based test generators using proptest.
//!
//! Strategies produce model values that respect the same invariants the
//! constructors enforce, so generated deletes carry no payload and
//! generated maps have valid keys.

use diffcast_model::{
    ChangeKind, DiffBuilder, EntityId, NodeChange, PropertyMap, PropertyValue, RelationshipChange,
    TransactionDiff,
};
use proptest::prelude::*;

/// Strategy for generating entity IDs.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntityId::from_bytes)
}

/// Strategy for generating node labels.
pub fn label_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z]{0,15}").expect("Invalid regex")
}

/// Strategy for generating property keys.
pub fn property_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating change kinds.
pub fn change_kind_strategy() -> impl Strategy<Value = ChangeKind> {
    prop_oneof![
        Just(ChangeKind::Created),
        Just(ChangeKind::Updated),
        Just(ChangeKind::Deleted),
    ]
}

/// Strategy for generating property values, including nested lists.
pub fn property_value_strategy() -> impl Strategy<Value = PropertyValue> {
    let leaf = prop_oneof![
        Just(PropertyValue::Null),
        any::<bool>().prop_map(PropertyValue::Bool),
        any::<i64>().prop_map(PropertyValue::Int),
        prop::num::f64::NORMAL.prop_map(PropertyValue::Float),
        ".{0,24}".prop_map(PropertyValue::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(PropertyValue::Bytes),
    ];
    leaf.prop_recursive(3, 24, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(PropertyValue::List)
    })
}

/// Strategy for generating property maps with up to `max_entries`
/// entries.
pub fn property_map_strategy(max_entries: usize) -> impl Strategy<Value = PropertyMap> {
    prop::collection::btree_map(
        property_key_strategy(),
        property_value_strategy(),
        0..max_entries.max(1),
    )
}

/// Strategy for generating node changes with kind-consistent payloads.
pub fn node_change_strategy() -> impl Strategy<Value = NodeChange> {
    (
        entity_id_strategy(),
        change_kind_strategy(),
        prop::collection::vec(label_strategy(), 0..4),
        property_map_strategy(6),
    )
        .prop_map(|(id, kind, labels, properties)| match kind {
            ChangeKind::Created => NodeChange::created(id, labels, properties),
            ChangeKind::Updated => NodeChange::updated(id, labels, properties),
            ChangeKind::Deleted => NodeChange::deleted(id),
        })
}

/// Strategy for generating relationship changes.
pub fn relationship_change_strategy() -> impl Strategy<Value = RelationshipChange> {
    (
        entity_id_strategy(),
        entity_id_strategy(),
        entity_id_strategy(),
        change_kind_strategy(),
        label_strategy(),
        property_map_strategy(6),
    )
        .prop_map(|(id, start, end, kind, rel_type, properties)| match kind {
            ChangeKind::Created => {
                RelationshipChange::created(id, start, end, rel_type, properties)
            }
            ChangeKind::Updated => {
                RelationshipChange::updated(id, start, end, rel_type, properties)
            }
            ChangeKind::Deleted => RelationshipChange::deleted(id, start, end, rel_type),
        })
}

/// Strategy for generating whole transaction diffs.
pub fn transaction_diff_strategy(max_changes: usize) -> impl Strategy<Value = TransactionDiff> {
    let limit = max_changes.max(1);
    (
        any::<u64>(),
        prop::collection::vec(node_change_strategy(), 0..limit),
        prop::collection::vec(relationship_change_strategy(), 0..limit),
    )
        .prop_map(|(sequence, nodes, relationships)| {
            let mut builder = DiffBuilder::new(sequence);
            for node in nodes {
                builder = builder.node(node);
            }
            for relationship in relationships {
                builder = builder.relationship(relationship);
            }
            builder.build()
        })
}
