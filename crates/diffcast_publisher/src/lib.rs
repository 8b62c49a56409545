//! # Diffcast Publisher
//!
//! Publishes committed graph mutations as keyed broker records.
//!
//! This crate provides:
//! - [`ChangeEventPublisher`], the lifecycle-managed publishing pipeline
//! - [`CommitObserver`] and [`ObserverRegistry`], the host commit hook
//! - Publish and stop reporting with per-record failure enumeration
//! - Lifetime counters ([`PublisherStats`])
//!
//! ## Architecture
//!
//! The publisher sits between a graph host and a broker producer. The
//! host registers it as a commit observer; after every commit the host
//! hands over the transaction diff, and the publisher serializes each
//! change into one record and delivers it before returning. Everything
//! runs synchronously on the commit thread.
//!
//! ## Key Invariants
//!
//! - Publishes are only accepted while `Running`
//! - One change becomes exactly one record, keyed by its entity id
//! - Node records precede relationship records within a diff
//! - Delivery failures are enumerated per record, never masked
//! - `stop` flushes before closing; records lost anyway are reported

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod hook;
mod publisher;
mod state;

pub use config::PublisherConfig;
pub use error::{PublisherError, PublisherResult};
pub use hook::{CommitObserver, ObserverError, ObserverId, ObserverRegistry};
pub use publisher::ChangeEventPublisher;
pub use state::{LifecycleState, PublishReport, PublisherStats, StopReport};
