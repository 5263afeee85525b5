//! Session transport boundary for Rift.
//!
//! The replication core never opens sockets. It talks to whatever network
//! runner hosts the session through the [`SessionTransport`] trait, and
//! receives lifecycle signals and inbound frames as [`TransportEvent`]s.
//!
//! [`LoopbackNetwork`] connects several in-process nodes through tokio
//! channels. It is what the tests and local sessions run on.

mod error;
mod loopback;

pub use error::TransportError;
pub use loopback::{LoopbackNetwork, LoopbackTransport};

use std::time::Duration;

use rift_protocol::{PlayerId, Recipient};

/// The contract between the replication core and the network runner.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` so the core (and the transport inside it) can
/// be moved into the driver task.
pub trait SessionTransport: Send + Sync + 'static {
    /// The id of the participant this node plays as.
    fn local_id(&self) -> PlayerId;

    /// Whether this node currently holds authority over the session.
    ///
    /// Assigned by the runner and never contested inside the core.
    fn is_authority(&self) -> bool;

    /// Current simulation time, shared by every node in the session.
    fn now(&self) -> Duration;

    /// Sends an encoded frame. Must not block: the tick loop calls this
    /// from inside the simulation step.
    ///
    /// Frames from one sender must arrive in the order they were sent.
    fn send(&self, to: Recipient, frame: Vec<u8>) -> Result<(), TransportError>;
}

/// Inbound signals from the network runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A participant joined the session.
    Joined(PlayerId),
    /// A participant left for good (clean leave).
    Left(PlayerId),
    /// A participant's connection dropped; they may come back.
    Disconnected(PlayerId),
    /// A participant that dropped is back and presents its token.
    Reconnected { player: PlayerId, token: String },
    /// The runner moved authority to another node.
    AuthorityChanged { authority: PlayerId },
    /// An encoded frame from another node.
    Frame { from: PlayerId, data: Vec<u8> },
}

impl TransportEvent {
    /// The participant this event is about (or came from).
    pub fn subject(&self) -> PlayerId {
        match self {
            Self::Joined(p) | Self::Left(p) | Self::Disconnected(p) => *p,
            Self::Reconnected { player, .. } => *player,
            Self::AuthorityChanged { authority } => *authority,
            Self::Frame { from, .. } => *from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_subject_matches_participant() {
        assert_eq!(TransportEvent::Joined(PlayerId(1)).subject(), PlayerId(1));
        let ev = TransportEvent::Reconnected {
            player: PlayerId(4),
            token: "abc".into(),
        };
        assert_eq!(ev.subject(), PlayerId(4));
        let ev = TransportEvent::Frame {
            from: PlayerId(2),
            data: vec![],
        };
        assert_eq!(ev.subject(), PlayerId(2));
    }
}
