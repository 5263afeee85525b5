//! Error types for the protocol layer.

/// Errors raised while encoding or decoding frames and records.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of a frame or record failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Bytes could not be parsed as the expected type.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
