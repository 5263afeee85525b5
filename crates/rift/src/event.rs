//! What the core reports back to its host.

use rift_protocol::{EntityId, MapId, MatchId, PlayerId};
use rift_session::PhaseChange;
use rift_state::CaptureEvent;

/// Something that happened during a tick or while handling a transport
/// event. Hosts use these to drive UI, persistence and logging.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    PhaseChanged(PhaseChange),
    SkillEnded(EntityId),
    ProjectileRemoved(EntityId),
    ObjectiveCaptured(CaptureEvent),
    MatchFormed(MatchId),
    MatchTornDown(MatchId),
    QueueTimedOut(PlayerId),
    MapChosen(MapId),

    Joined(PlayerId),
    Left(PlayerId),
    /// A reconnect window opened. `token` is what the participant must
    /// present to come back.
    Disconnected { player: PlayerId, token: String },
    /// The participant is back and was sent a full snapshot.
    Reconnected(PlayerId),
    /// Wrong token, or no window open. The window (if any) stays open.
    ReconnectRejected(PlayerId),
    /// The participant's reconnect window ran out.
    Evicted(PlayerId),

    /// A full snapshot replaced local state.
    Resynced,
    AuthorityChanged { authority: PlayerId, local: bool },
}
