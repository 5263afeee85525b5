//! # Rift
//!
//! Server-authoritative replicated game state and session coordination
//! for small arena matches.
//!
//! One node holds authority. It mutates a [`World`] of replicated tables
//! through [`RiftCore::command`] and [`RiftCore::tick`]; every write is
//! broadcast and applied by the other nodes, which never mutate state on
//! their own. A node that drops and returns within the reconnect window
//! gets a full snapshot.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rift::prelude::*;
//!
//! # async fn demo() {
//! let net = LoopbackNetwork::new();
//! let (transport, mut events) = net.join(PlayerId(1));
//! let mut core = RiftCore::new(transport, CoreConfig::default());
//! let mut scheduler = TickScheduler::new(core.config().tick.clone());
//!
//! rift::driver::run(&mut core, &mut events, &mut scheduler, std::future::pending(), |event| {
//!     println!("{event:?}");
//! })
//! .await;
//! # }
//! ```

mod config;
pub mod driver;
mod error;
mod event;
mod host;
pub mod logging;
mod world;

pub use config::CoreConfig;
pub use error::RiftError;
pub use event::CoreEvent;
pub use host::RiftCore;
pub use world::World;

pub mod prelude {
    pub use crate::{CoreConfig, CoreEvent, RiftCore, RiftError, World};
    pub use rift_protocol::{EntityId, MapId, MatchId, PlayerId, RoomId, TeamId, Vec2};
    pub use rift_room::LobbyConfig;
    pub use rift_session::{MatchPhase, SessionConfig};
    pub use rift_state::StateConfig;
    pub use rift_tick::{TickConfig, TickScheduler};
    pub use rift_transport::{LoopbackNetwork, SessionTransport, TransportEvent};
}
