//! Node and relationship changes.

use crate::{EntityId, PropertyMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to an entity in a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The entity was created.
    Created,
    /// One or more of the entity's properties (or labels) changed.
    Updated,
    /// The entity was deleted.
    Deleted,
}

impl ChangeKind {
    /// Returns the stable wire code for this kind.
    #[must_use]
    pub fn to_code(self) -> u8 {
        match self {
            Self::Created => 1,
            Self::Updated => 2,
            Self::Deleted => 3,
        }
    }

    /// Parses a wire code.
    ///
    /// Returns `None` for unknown codes.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Created),
            2 => Some(Self::Updated),
            3 => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Returns the lowercase name used in logs and JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to a single node.
///
/// For `Created` and `Updated`, `labels` and `properties` describe the
/// node's state after the transaction. For `Deleted` they describe the
/// node as of deletion and may be empty when the host no longer has them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeChange {
    /// Entity ID of the node.
    pub id: EntityId,
    /// What happened.
    pub kind: ChangeKind,
    /// Labels on the node.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Properties of the node.
    #[serde(default)]
    pub properties: PropertyMap,
}

impl NodeChange {
    /// Creates a `Created` change.
    #[must_use]
    pub fn created(id: EntityId, labels: Vec<String>, properties: PropertyMap) -> Self {
        Self {
            id,
            kind: ChangeKind::Created,
            labels,
            properties,
        }
    }

    /// Creates an `Updated` change carrying the node's post-transaction
    /// state.
    #[must_use]
    pub fn updated(id: EntityId, labels: Vec<String>, properties: PropertyMap) -> Self {
        Self {
            id,
            kind: ChangeKind::Updated,
            labels,
            properties,
        }
    }

    /// Creates a `Deleted` change with no residual state.
    #[must_use]
    pub fn deleted(id: EntityId) -> Self {
        Self {
            id,
            kind: ChangeKind::Deleted,
            labels: Vec::new(),
            properties: PropertyMap::new(),
        }
    }
}

/// A change to a single relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipChange {
    /// Entity ID of the relationship.
    pub id: EntityId,
    /// What happened.
    pub kind: ChangeKind,
    /// Entity ID of the start node.
    pub start: EntityId,
    /// Entity ID of the end node.
    pub end: EntityId,
    /// Relationship type name.
    pub rel_type: String,
    /// Properties of the relationship.
    #[serde(default)]
    pub properties: PropertyMap,
}

impl RelationshipChange {
    /// Creates a `Created` change.
    #[must_use]
    pub fn created(
        id: EntityId,
        start: EntityId,
        end: EntityId,
        rel_type: impl Into<String>,
        properties: PropertyMap,
    ) -> Self {
        Self {
            id,
            kind: ChangeKind::Created,
            start,
            end,
            rel_type: rel_type.into(),
            properties,
        }
    }

    /// Creates an `Updated` change carrying the relationship's
    /// post-transaction state.
    #[must_use]
    pub fn updated(
        id: EntityId,
        start: EntityId,
        end: EntityId,
        rel_type: impl Into<String>,
        properties: PropertyMap,
    ) -> Self {
        Self {
            id,
            kind: ChangeKind::Updated,
            start,
            end,
            rel_type: rel_type.into(),
            properties,
        }
    }

    /// Creates a `Deleted` change.
    ///
    /// Endpoints and type are still carried; consumers of a deletion
    /// usually need the key and topology more than the body.
    #[must_use]
    pub fn deleted(
        id: EntityId,
        start: EntityId,
        end: EntityId,
        rel_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind: ChangeKind::Deleted,
            start,
            end,
            rel_type: rel_type.into(),
            properties: PropertyMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyValue;

    #[test]
    fn kind_code_roundtrip() {
        for kind in [ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted] {
            assert_eq!(ChangeKind::from_code(kind.to_code()), Some(kind));
        }
        assert_eq!(ChangeKind::from_code(0), None);
        assert_eq!(ChangeKind::from_code(4), None);
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::Created).unwrap(),
            "\"created\""
        );
    }

    #[test]
    fn node_constructors_set_kind() {
        let id = EntityId::from_bytes([1u8; 16]);
        let mut props = PropertyMap::new();
        props.insert("name".into(), PropertyValue::from("Alice"));

        let created = NodeChange::created(id, vec!["Person".into()], props.clone());
        assert_eq!(created.kind, ChangeKind::Created);
        assert_eq!(created.labels, vec!["Person"]);

        let deleted = NodeChange::deleted(id);
        assert_eq!(deleted.kind, ChangeKind::Deleted);
        assert!(deleted.labels.is_empty());
        assert!(deleted.properties.is_empty());
    }

    #[test]
    fn relationship_deleted_keeps_topology() {
        let rel = RelationshipChange::deleted(
            EntityId::from_bytes([1u8; 16]),
            EntityId::from_bytes([2u8; 16]),
            EntityId::from_bytes([3u8; 16]),
            "KNOWS",
        );
        assert_eq!(rel.kind, ChangeKind::Deleted);
        assert_eq!(rel.rel_type, "KNOWS");
        assert_ne!(rel.start, rel.end);
    }

    #[test]
    fn node_change_json_defaults() {
        let id = EntityId::from_bytes([9u8; 16]);
        let json = format!("{{\"id\":\"{id}\",\"kind\":\"deleted\"}}");
        let change: NodeChange = serde_json::from_str(&json).unwrap();
        assert_eq!(change, NodeChange::deleted(id));
    }
}
