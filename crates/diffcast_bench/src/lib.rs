//! # Diffcast Bench
//!
//! Workload generators shared by the diffcast benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use diffcast_model::{
    DiffBuilder, EntityId, NodeChange, PropertyMap, PropertyValue, RelationshipChange,
    TransactionDiff,
};
use rand::Rng;

/// Random lowercase text of the given length.
pub fn random_text(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// A property map with `count` mixed-type entries.
pub fn property_map(count: usize) -> PropertyMap {
    let mut properties = PropertyMap::new();
    for index in 0..count {
        let value = match index % 4 {
            0 => PropertyValue::Int(index as i64),
            1 => PropertyValue::Text(random_text(24)),
            2 => PropertyValue::Bool(index % 8 == 1),
            _ => PropertyValue::Float(index as f64 * 0.5),
        };
        properties.insert(format!("prop_{index:03}"), value);
    }
    properties
}

/// A created node with `property_count` properties.
pub fn node_change(property_count: usize) -> NodeChange {
    NodeChange::created(
        EntityId::new(),
        vec!["Person".to_string()],
        property_map(property_count),
    )
}

/// A created relationship with `property_count` properties.
pub fn relationship_change(property_count: usize) -> RelationshipChange {
    RelationshipChange::created(
        EntityId::new(),
        EntityId::new(),
        EntityId::new(),
        "KNOWS",
        property_map(property_count),
    )
}

/// A committed diff carrying the given number of node and relationship
/// changes, each touching a fresh entity.
pub fn transaction_diff(sequence: u64, nodes: usize, relationships: usize) -> TransactionDiff {
    let mut builder = DiffBuilder::new(sequence);
    for _ in 0..nodes {
        builder = builder.node(node_change(8));
    }
    for _ in 0..relationships {
        builder = builder.relationship(relationship_change(4));
    }
    builder.build()
}
