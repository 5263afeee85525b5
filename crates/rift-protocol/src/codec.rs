//! Codec trait for turning frames into bytes and back.
//!
//! The replication layer never cares how an [`Envelope`](crate::Envelope)
//! is laid out on the wire; it just needs something implementing
//! [`Codec`]. [`JsonCodec`] is the only implementation today and is
//! behind the default `json` feature.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because the codec lives inside the core for
/// the whole session and may be touched from the driver task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or
    /// don't match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use rift_protocol::{Codec, Envelope, JsonCodec, Payload};
///
/// let codec = JsonCodec;
/// let frame = Envelope { seq: 1, timestamp_ms: 250, payload: Payload::Broadcasts(vec![]) };
///
/// let bytes = codec.encode(&frame).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Broadcast, Envelope, ModuleId, Payload};

    #[test]
    fn test_json_codec_preserves_broadcast_order() {
        let codec = JsonCodec;
        let frame = Envelope {
            seq: 3,
            timestamp_ms: 1000,
            payload: Payload::Broadcasts(vec![
                Broadcast {
                    module: ModuleId::Teams,
                    seq: 1,
                    key: serde_json::json!(0),
                    value: Some(serde_json::json!({ "size": 1 })),
                },
                Broadcast {
                    module: ModuleId::Teams,
                    seq: 2,
                    key: serde_json::json!(1),
                    value: None,
                },
            ]),
        };

        let bytes = codec.encode(&frame).unwrap();
        let decoded: Envelope = codec.decode(&bytes).unwrap();

        let Payload::Broadcasts(list) = decoded.payload else {
            panic!("expected broadcasts");
        };
        assert_eq!(list[0].seq, 1);
        assert_eq!(list[1].seq, 2);
        assert!(list[1].is_tombstone());
    }

    #[test]
    fn test_json_codec_decode_garbage_returns_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
