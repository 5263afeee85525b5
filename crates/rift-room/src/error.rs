//! Error types for the room layer.

use rift_protocol::{MapId, MatchId, PlayerId, RoomId};
use rift_table::TableError;

/// Errors that can occur during room, queue, and voting operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error(transparent)]
    Table(#[from] TableError),

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Occupancy reached capacity.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    #[error("room {0} is locked")]
    Locked(RoomId),

    /// The room's match already started.
    #[error("room {0} is in game")]
    InGame(RoomId),

    #[error("player {0} is not in the matchmaking queue")]
    NotQueued(PlayerId),

    #[error("player {player} is already in match {match_id}")]
    AlreadyInMatch { player: PlayerId, match_id: MatchId },

    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    #[error("map voting is not open")]
    VotingClosed,

    #[error("map {0} is not a voting candidate")]
    UnknownCandidate(MapId),

    #[error("no maps in rotation")]
    NoMaps,
}
