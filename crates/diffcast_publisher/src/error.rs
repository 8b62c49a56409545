//! Publisher errors.

use crate::state::LifecycleState;
use diffcast_broker::{BrokerError, FailedDelivery};
use thiserror::Error;

/// Result type for publisher operations.
pub type PublisherResult<T> = Result<T, PublisherError>;

/// Errors raised by the publisher.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// The broker connection could not be established or was lost.
    #[error("broker connection failed: {message}")]
    Connection {
        /// What went wrong.
        message: String,
    },

    /// A change could not be serialized into a record.
    #[error("serialization failed for {context}: {message}")]
    Serialization {
        /// Which change failed.
        context: String,
        /// What went wrong.
        message: String,
    },

    /// Some records of a diff could not be delivered.
    ///
    /// Every failed record is listed; delivery of the remaining records
    /// was still attempted.
    #[error("publish failed for {} record(s)", failed.len())]
    Publish {
        /// The records that failed, in publish order.
        failed: Vec<FailedDelivery>,
    },

    /// The operation needs a running publisher.
    #[error("publisher is not running (state: {state})")]
    NotRunning {
        /// The state the publisher was in.
        state: LifecycleState,
    },

    /// The requested lifecycle transition is not allowed.
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: LifecycleState,
        /// Attempted target state.
        to: LifecycleState,
    },

    /// An underlying broker failure outside delivery reporting.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl PublisherError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Returns the failed deliveries when this is a publish error.
    #[must_use]
    pub fn failed_deliveries(&self) -> &[FailedDelivery] {
        match self {
            Self::Publish { failed } => failed,
            _ => &[],
        }
    }
}
