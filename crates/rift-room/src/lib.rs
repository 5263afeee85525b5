//! Lobby-side coordination for Rift.
//!
//! - [`RoomDirectory`]: named rooms with capacity, lock and in-game flags.
//! - [`MatchQueue`]: FIFO matchmaking that forms two-roster matches.
//! - [`MapVoting`]: timed, one-vote-per-participant map selection.
//!
//! Like the gameplay modules, each is built on replicated tables and
//! mutated only through a [`Writer`](rift_table::Writer).

mod config;
mod directory;
mod error;
mod queue;
mod voting;

pub use config::{LobbyConfig, MapInfo};
pub use directory::{RoomDirectory, RoomRecord, RoomSettings};
pub use error::RoomError;
pub use queue::{ActiveMatch, MatchQueue, QueueEntry, QueueTick};
pub use voting::{MapVoting, VoteTally, VoteWindow};
