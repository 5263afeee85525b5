//! Player simulation records and per-participant session state.
//!
//! Two tables because they change at different rates: [`PlayerRecord`]
//! is rewritten by the simulation every few ticks, [`ParticipantState`]
//! only on lobby and round events.

use rift_protocol::{ModuleId, PlayerId, TeamId, Vec2};
use rift_table::{Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::{StateConfig, StateError};

/// Where a player is and how healthy they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub position: Vec2,
    pub rotation: f32,
    pub team: Option<TeamId>,
    /// Equal to `health > 0` after every write.
    pub alive: bool,
    pub health: f32,
    pub energy: f32,
}

/// Lobby and round bookkeeping for one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantState {
    pub connected: bool,
    pub ready: bool,
    pub loaded: bool,
    /// 0.0 to 1.0. Reaching 1.0 sets `loaded`.
    pub load_progress: f32,
    pub score: i64,
    pub round_wins: u32,
}

impl Default for ParticipantState {
    fn default() -> Self {
        Self {
            connected: true,
            ready: false,
            loaded: false,
            load_progress: 0.0,
            score: 0,
            round_wins: 0,
        }
    }
}

/// Players table plus participant session state.
pub struct PlayerModule {
    players: ReplicatedTable<PlayerId, PlayerRecord>,
    participants: ReplicatedTable<PlayerId, ParticipantState>,
    max_health: f32,
    max_energy: f32,
}

impl PlayerModule {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            players: ReplicatedTable::new(ModuleId::Players),
            participants: ReplicatedTable::new(ModuleId::Participants),
            max_health: config.max_health,
            max_energy: config.max_energy,
        }
    }

    // -----------------------------------------------------------------------
    // Simulation record
    // -----------------------------------------------------------------------

    /// Adds a player at full health and energy.
    ///
    /// Also creates their participant state if the lobby hasn't already.
    pub fn register_player(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        team: Option<TeamId>,
        spawn: Vec2,
    ) -> Result<(), StateError> {
        if self.players.contains_key(&id) {
            return Err(StateError::AlreadyRegistered(id));
        }
        self.players.set(
            w,
            id,
            PlayerRecord {
                position: spawn,
                rotation: 0.0,
                team,
                alive: true,
                health: self.max_health,
                energy: self.max_energy,
            },
        )?;
        if !self.participants.contains_key(&id) {
            self.participants.set(w, id, ParticipantState::default())?;
        }
        tracing::info!(player_id = %id, ?team, "player registered");
        Ok(())
    }

    /// Moves a player. Health and energy are untouched.
    pub fn update_position(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        position: Vec2,
        rotation: f32,
    ) -> Result<(), StateError> {
        self.modify(w, id, |p| {
            p.position = position;
            p.rotation = rotation;
        })
    }

    /// Writes health and energy together, clamped to their maxima.
    pub fn update_status(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        health: f32,
        energy: f32,
    ) -> Result<(), StateError> {
        let (max_health, max_energy) = (self.max_health, self.max_energy);
        self.modify(w, id, |p| {
            p.health = health.clamp(0.0, max_health);
            p.energy = energy.clamp(0.0, max_energy);
            p.alive = p.health > 0.0;
        })
    }

    /// Mirrors the player's team membership onto their record. Callers
    /// that change membership are expected to call this in the same step.
    pub fn set_team(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        team: Option<TeamId>,
    ) -> Result<(), StateError> {
        self.modify(w, id, |p| p.team = team)
    }

    /// Subtracts `amount` health. Returns `true` if this hit killed.
    pub fn apply_damage(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        amount: f32,
    ) -> Result<bool, StateError> {
        let record = self.players.get(&id).ok_or(StateError::UnknownPlayer(id))?;
        if !record.alive {
            return Ok(false);
        }
        let health = (record.health - amount.max(0.0)).max(0.0);
        let energy = record.energy;
        self.update_status(w, id, health, energy)?;
        Ok(health <= 0.0)
    }

    /// Brings a player back at full health.
    pub fn respawn(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        at: Vec2,
    ) -> Result<(), StateError> {
        let (max_health, max_energy) = (self.max_health, self.max_energy);
        self.modify(w, id, |p| {
            p.position = at;
            p.health = max_health;
            p.energy = max_energy;
            p.alive = true;
        })
    }

    /// Drops both records. Returns `false` if the player was unknown.
    pub fn remove_player(&mut self, w: &mut Writer<'_>, id: PlayerId) -> Result<bool, StateError> {
        let had_player = self.players.remove(w, &id)?.is_some();
        let had_participant = self.participants.remove(w, &id)?.is_some();
        Ok(had_player || had_participant)
    }

    // -----------------------------------------------------------------------
    // Participant state
    // -----------------------------------------------------------------------

    /// Creates participant state for someone who joined the lobby but
    /// hasn't spawned yet. Does nothing if it already exists.
    pub fn add_participant(&mut self, w: &mut Writer<'_>, id: PlayerId) -> Result<(), StateError> {
        if !self.participants.contains_key(&id) {
            self.participants.set(w, id, ParticipantState::default())?;
        }
        Ok(())
    }

    /// Tracks transport connectivity; a disconnected participant does
    /// not count as ready.
    pub fn set_connected(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        connected: bool,
    ) -> Result<(), StateError> {
        self.modify_participant(w, id, |s| s.connected = connected)
    }

    pub fn set_ready(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        ready: bool,
    ) -> Result<(), StateError> {
        self.modify_participant(w, id, |s| s.ready = ready)
    }

    /// Records map loading progress, clamped to 0.0 to 1.0.
    pub fn set_load_progress(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        progress: f32,
    ) -> Result<(), StateError> {
        self.modify_participant(w, id, |s| {
            s.load_progress = progress.clamp(0.0, 1.0);
            s.loaded = s.load_progress >= 1.0;
        })
    }

    pub fn add_round_win(&mut self, w: &mut Writer<'_>, id: PlayerId) -> Result<(), StateError> {
        self.modify_participant(w, id, |s| s.round_wins += 1)
    }

    pub fn add_session_score(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        delta: i64,
    ) -> Result<(), StateError> {
        self.modify_participant(w, id, |s| s.score += delta)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_player(&self, id: PlayerId) -> Option<&PlayerRecord> {
        self.players.get(&id)
    }

    /// Lobby state, present from join until eviction.
    pub fn get_participant(&self, id: PlayerId) -> Option<&ParticipantState> {
        self.participants.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = (&PlayerId, &PlayerRecord)> {
        self.players.iter()
    }

    pub fn participants(&self) -> impl Iterator<Item = (&PlayerId, &ParticipantState)> {
        self.participants.iter()
    }

    /// Connected participants that marked themselves ready.
    pub fn ready_count(&self) -> usize {
        self.participants
            .values()
            .filter(|s| s.connected && s.ready)
            .count()
    }

    /// Both tables, for routing broadcasts and snapshots.
    pub fn replicas(&self) -> [&dyn Replica; 2] {
        [&self.players, &self.participants]
    }

    pub fn replicas_mut(&mut self) -> [&mut dyn Replica; 2] {
        [&mut self.players, &mut self.participants]
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn modify(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        f: impl FnOnce(&mut PlayerRecord),
    ) -> Result<(), StateError> {
        if self.players.update(w, &id, f)? {
            Ok(())
        } else {
            Err(StateError::UnknownPlayer(id))
        }
    }

    fn modify_participant(
        &mut self,
        w: &mut Writer<'_>,
        id: PlayerId,
        f: impl FnOnce(&mut ParticipantState),
    ) -> Result<(), StateError> {
        if self.participants.update(w, &id, f)? {
            Ok(())
        } else {
            Err(StateError::UnknownPlayer(id))
        }
    }
}
