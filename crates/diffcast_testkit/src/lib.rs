//! # Diffcast Testkit
//!
//! Test utilities for diffcast.
//!
//! This crate provides:
//! - Graph fixtures (people, friendships, entity lifetimes)
//! - Brokers with scripted faults
//! - Pre-wired running publishers
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use diffcast_testkit::prelude::*;
//!
//! #[test]
//! fn publishes_a_social_graph() {
//!     let broker = broker();
//!     let publisher = running_publisher(&broker, ProducerConfig::new());
//!     publisher.publish(&social_graph_diff(1)).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
