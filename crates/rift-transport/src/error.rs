use rift_protocol::PlayerId;

/// Errors that can occur when handing frames to the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The addressed node is not part of the session.
    #[error("unknown peer {0}")]
    UnknownPeer(PlayerId),

    /// This node is currently disconnected and can't send.
    #[error("node {0} is not connected")]
    NotConnected(PlayerId),

    /// The network runner is gone.
    #[error("transport shut down")]
    Shutdown,
}
