//! Protocol error types for decoding and encoding frames.

use thiserror::Error;

/// Why an inbound frame was discarded or an outbound one could not be built
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON, or a message failed to encode
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame is valid JSON but not an object
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// The object has no usable `type` or its payload does not fit the type
    #[error("Malformed message: {0}")]
    Malformed(String),
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
