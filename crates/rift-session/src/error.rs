//! Error types for the session layer.

use rift_protocol::PlayerId;
use rift_table::TableError;

/// Errors that can occur while tracking the match or reconnecting.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Table(#[from] TableError),

    /// No reconnect window is open for this participant. Either they
    /// never disconnected or the window already closed.
    #[error("no pending reconnect for player {0}")]
    NotPending(PlayerId),

    /// The token doesn't match the one issued on disconnect.
    #[error("invalid reconnection token for player {player} (attempt {attempts})")]
    InvalidToken { player: PlayerId, attempts: u32 },

    /// The reconnect window ran out; the participant has been evicted.
    #[error("reconnect window expired for player {0}")]
    Expired(PlayerId),
}
