//! # Diffcast Model
//!
//! Graph change data model for diffcast.
//!
//! This crate provides:
//! - `EntityId` and `SequenceNumber` identifiers
//! - `PropertyValue` / `PropertyMap` for graph properties
//! - `NodeChange` and `RelationshipChange` records
//! - `TransactionDiff`, the per-commit change set hosts hand to a publisher
//!
//! This is a pure data crate with no I/O. All containers are ordered so
//! that serialization downstream is deterministic.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod diff;
mod id;
mod property;
mod types;

pub use change::{ChangeKind, NodeChange, RelationshipChange};
pub use diff::{DiffBuilder, TransactionDiff};
pub use id::EntityId;
pub use property::{PropertyMap, PropertyValue};
pub use types::SequenceNumber;
