//! Wire errors.

use thiserror::Error;

/// Errors produced while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum WireError {
    /// Input did not have the expected structure.
    #[error("malformed wire data: {message}")]
    Malformed {
        /// What was wrong.
        message: String,
    },

    /// The CBOR layer failed.
    #[error("cbor error: {0}")]
    Cbor(String),

    /// Unknown change kind code in a payload.
    #[error("unknown change kind code {0}")]
    UnknownKind(u8),

    /// Unknown frame type code on the wire.
    #[error("unknown frame type code {0}")]
    UnknownFrame(u8),

    /// Payload was written by a format version this build does not read.
    #[error("unsupported payload version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the payload.
        found: u64,
        /// Highest version this build reads.
        supported: u8,
    },
}

impl WireError {
    /// Creates a `Malformed` error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;
