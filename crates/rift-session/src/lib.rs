//! Match flow and reconnection for Rift.
//!
//! - [`SessionMachine`] moves the match through its phases
//!   (waiting → preparation → in progress → round end → game over) on a
//!   pausable timer.
//! - [`ReconnectTracker`] keeps a bounded window open for participants
//!   who dropped, and evicts them when it runs out.
//!
//! Both are replicated tables underneath, so every node sees the same
//! phase and the same pending reconnects. Timeouts are polled from the
//! authority's tick, never waited on.

mod config;
mod error;
mod phase;
mod reconnect;

pub use config::SessionConfig;
pub use error::SessionError;
pub use phase::{MatchPhase, PhaseChange, SessionMachine, SessionRecord};
pub use reconnect::{ReconnectEntry, ReconnectTracker};
