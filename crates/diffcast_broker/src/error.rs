//! Broker client errors.

use diffcast_wire::WireError;
use thiserror::Error;

/// Errors raised by broker producers.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Establishing the connection failed.
    #[error("connect failed: {message}")]
    Connect {
        /// What went wrong.
        message: String,
    },

    /// The byte-level exchange with the broker failed.
    #[error("transport error: {message}")]
    Transport {
        /// What went wrong.
        message: String,
        /// Whether retrying may help.
        retryable: bool,
    },

    /// The broker terminally refused one record.
    #[error("delivery failed for {topic}/{key}: {reason}")]
    Delivery {
        /// Destination topic.
        topic: String,
        /// Partition key.
        key: String,
        /// Broker-side reason.
        reason: String,
        /// Whether retrying may help.
        retryable: bool,
    },

    /// The broker refused a whole request.
    #[error("broker refused request: {0}")]
    Refused(String),

    /// An operation needs a connection that was never established or was
    /// lost.
    #[error("not connected to a broker")]
    NotConnected,

    /// The producer has been closed.
    #[error("producer is closed")]
    Closed,

    /// The local send buffer is at capacity.
    #[error("send buffer full ({capacity} records)")]
    BufferFull {
        /// Configured capacity.
        capacity: usize,
    },

    /// Wire encode/decode failure.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

impl BrokerError {
    /// Creates a connect error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a fatal transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a delivery error for one record.
    pub fn delivery(
        topic: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::Delivery {
            topic: topic.into(),
            key: key.into(),
            reason: reason.into(),
            retryable,
        }
    }

    /// Returns `true` if retrying the failed operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } | Self::Delivery { retryable, .. } => *retryable,
            Self::Refused(_) => true,
            Self::Connect { .. }
            | Self::NotConnected
            | Self::Closed
            | Self::BufferFull { .. }
            | Self::Wire(_) => false,
        }
    }
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
