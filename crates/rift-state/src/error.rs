//! Error types for the gameplay state modules.
//!
//! Everything except [`StateError::Table`] is an expected game-flow
//! outcome (a rejected cast, a full team) that callers branch on.

use std::time::Duration;

use rift_protocol::{EntityId, ItemId, ObjectiveId, PlayerId, TeamId};
use rift_table::TableError;

/// Errors returned by state module mutators.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Table(#[from] TableError),

    // -- Players ----------------------------------------------------------
    #[error("player {0} is not registered")]
    UnknownPlayer(PlayerId),

    #[error("player {0} is already registered")]
    AlreadyRegistered(PlayerId),

    // -- Projectiles ------------------------------------------------------
    #[error("projectile {0} not found")]
    UnknownProjectile(EntityId),

    #[error("projectile {0} is no longer active")]
    ProjectileInactive(EntityId),

    /// Bounce counts only go up while a projectile is alive.
    #[error("projectile {id} bounce count went from {current} to {got}")]
    BounceRegression { id: EntityId, current: u32, got: u32 },

    // -- Skills -----------------------------------------------------------
    #[error("player {player} has no skill in slot {slot}")]
    UnknownSkillSlot { player: PlayerId, slot: usize },

    #[error("skill slot {slot} is disabled for player {player}")]
    SkillDisabled { player: PlayerId, slot: usize },

    #[error("skill slot {slot} of player {player} is cooling down ({remaining:?} left)")]
    OnCooldown {
        player: PlayerId,
        slot: usize,
        remaining: Duration,
    },

    #[error("player {player} has {available} energy, needs {needed}")]
    InsufficientEnergy {
        player: PlayerId,
        needed: f32,
        available: f32,
    },

    // -- Objectives -------------------------------------------------------
    #[error("objective {0} not found")]
    UnknownObjective(ObjectiveId),

    // -- Teams ------------------------------------------------------------
    #[error("team {0} not found")]
    UnknownTeam(TeamId),

    #[error("team {0} already exists")]
    TeamExists(TeamId),

    #[error("team {0} is locked")]
    TeamLocked(TeamId),

    #[error("team {team} is full ({size} members)")]
    TeamFull { team: TeamId, size: usize },

    #[error("no team has room for another player")]
    NoOpenTeam,

    // -- Scores -----------------------------------------------------------
    /// A counter in the new score line is lower than the stored one.
    #[error("score field `{field}` of player {player} would decrease")]
    ScoreRegression {
        player: PlayerId,
        field: &'static str,
    },

    /// The score grew faster than the configured rate allows.
    #[error("score of player {player} grew by {delta}, at most {allowed} allowed")]
    ScoreRateExceeded {
        player: PlayerId,
        delta: u32,
        allowed: f32,
    },

    // -- Progression ------------------------------------------------------
    #[error("item {0} is not unlocked")]
    NotUnlocked(ItemId),

    #[error("item {0} is already unlocked")]
    AlreadyUnlocked(ItemId),

    #[error("needs {needed} currency, has {available}")]
    InsufficientCurrency { needed: u64, available: u64 },

    #[error("save data is unreadable: {0}")]
    CorruptSave(#[source] serde_json::Error),
}
