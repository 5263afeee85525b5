//! Unified error type for Rift.

use rift_protocol::ProtocolError;
use rift_room::RoomError;
use rift_session::SessionError;
use rift_state::StateError;
use rift_table::TableError;
use rift_transport::TransportError;

/// Top-level error wrapping every layer's error.
///
/// Each variant is `#[from]`, so `?` converts layer errors automatically
/// inside the core and in host code.
#[derive(Debug, thiserror::Error)]
pub enum RiftError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Table(#[from] TableError),

    /// A gameplay rule rejected the command.
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("invalid configuration: {0}")]
    Config(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_protocol::{PlayerId, RoomId};

    #[test]
    fn test_from_transport_error() {
        let err: RiftError = TransportError::NotConnected(PlayerId(2)).into();
        assert!(matches!(err, RiftError::Transport(_)));
        assert!(err.to_string().contains("P-2"));
    }

    #[test]
    fn test_from_state_error() {
        let err: RiftError = StateError::UnknownPlayer(PlayerId(1)).into();
        assert!(matches!(err, RiftError::State(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err: RiftError = RoomError::NotFound(RoomId(1)).into();
        assert!(matches!(err, RiftError::Room(_)));
        assert_eq!(err.to_string(), "room R-1 not found");
    }

    #[test]
    fn test_from_session_error() {
        let err: RiftError = SessionError::Expired(PlayerId(5)).into();
        assert!(matches!(err, RiftError::Session(_)));
    }
}
