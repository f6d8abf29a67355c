//! Error types for the FANET core crate.

use thiserror::Error;

/// Failure to turn a wire payload into a protocol message.
///
/// The engine treats every codec error as "silently discard"; the variants
/// exist so callers (and the CLI `decode` command) can say why.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Payload is not a valid envelope
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Message type tag is not one of the seven protocol types
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// A field required by the message type is absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field is present but cannot be parsed
    #[error("invalid value for field {field}: {value:?}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Raw field value
        value: String,
    },
}

/// FANET error type
#[derive(Error, Debug)]
pub enum FanetError {
    /// Wire payload could not be decoded
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Simulation harness error
    #[error("simulation error: {0}")]
    Simulation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for FANET operations
pub type Result<T> = std::result::Result<T, FanetError>;
