//! Wire-level vocabulary for Rift.
//!
//! - **Types** ([`PlayerId`], [`RoomId`], [`TeamId`], [`Vec2`], ...):
//!   identifiers and small values embedded in replicated records.
//! - **Wire** ([`Broadcast`], [`Envelope`], [`TableSnapshot`]): the
//!   messages the authority fans out to replicas.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how frames become bytes.
//!
//! ```text
//! Domain modules → ReplicatedTable → Broadcast → Envelope → Codec → transport
//! ```

mod codec;
mod error;
mod types;
mod wire;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    EntityId, ItemId, MapId, MatchId, ObjectiveId, PlayerId, Recipient, RoomId, TeamId, Vec2,
};
pub use wire::{Broadcast, Envelope, ModuleId, Payload, SnapshotEntry, TableSnapshot};
