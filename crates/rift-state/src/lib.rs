//! Replicated gameplay state.
//!
//! One module per domain, each a thin layer of validation and derived
//! state over one or two [`ReplicatedTable`](rift_table::ReplicatedTable)s:
//!
//! | Module                | Tables                      |
//! |-----------------------|-----------------------------|
//! | [`PlayerModule`]      | players, participants       |
//! | [`ProjectileModule`]  | projectiles                 |
//! | [`SkillModule`]       | skill state, skill instances|
//! | [`EffectModule`]      | status effects, VFX         |
//! | [`ObjectiveModule`]   | capture points              |
//! | [`TeamModule`]        | teams, team membership      |
//! | [`ScoreModule`]       | score lines, top scorers    |
//! | [`ProgressionModule`] | progression / save data     |
//!
//! Every mutator takes a [`Writer`](rift_table::Writer), so none of them
//! can run on a replica. Operations that mint ids also take the shared
//! [`IdAllocator`](rift_table::IdAllocator). Validation failures come
//! back as [`StateError`] and leave state untouched.

mod config;
mod effect;
mod error;
mod objective;
mod player;
mod progression;
mod projectile;
mod score;
mod skill;
mod team;

pub use config::{SkillDefinition, StateConfig};
pub use effect::{ActiveEffect, EffectKind, EffectModule, PlayerEffects, VfxRecord};
pub use error::StateError;
pub use objective::{CaptureEvent, CapturePoint, ObjectiveModule};
pub use player::{ParticipantState, PlayerModule, PlayerRecord};
pub use progression::{ProgressionModule, ProgressionRecord};
pub use projectile::{ProjectileModule, ProjectileRecord};
pub use score::{ScoreLine, ScoreModule, ScoreRecord, TopEntry};
pub use skill::{ActiveSkillInstance, SkillModule, SkillSlot, SkillState};
pub use team::{TeamModule, TeamRecord};
