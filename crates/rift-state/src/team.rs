//! Teams, their sizes, and who is on which.

use rift_protocol::{ModuleId, PlayerId, TeamId};
use rift_table::{Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::{StateConfig, StateError};

/// One team as every node sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub name: String,
    pub score: i64,
    pub locked: bool,
    /// Number of entries in the membership table pointing at this team.
    pub size: usize,
}

/// Teams plus one membership entry per assigned player.
pub struct TeamModule {
    teams: ReplicatedTable<TeamId, TeamRecord>,
    members: ReplicatedTable<PlayerId, TeamId>,
    max_team_size: usize,
}

impl TeamModule {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            teams: ReplicatedTable::new(ModuleId::Teams),
            members: ReplicatedTable::new(ModuleId::TeamMembers),
            max_team_size: config.max_team_size,
        }
    }

    /// Adds an empty, unlocked team.
    pub fn create_team(
        &mut self,
        w: &mut Writer<'_>,
        id: TeamId,
        name: impl Into<String>,
    ) -> Result<(), StateError> {
        if self.teams.contains_key(&id) {
            return Err(StateError::TeamExists(id));
        }
        self.teams.set(
            w,
            id,
            TeamRecord {
                name: name.into(),
                score: 0,
                locked: false,
                size: 0,
            },
        )?;
        Ok(())
    }

    /// Puts `player` on `team`, moving them off their current team.
    ///
    /// # Errors
    /// [`StateError::TeamLocked`] or [`StateError::TeamFull`] leave every
    /// team unchanged.
    pub fn assign_player_to_team(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        team: TeamId,
    ) -> Result<(), StateError> {
        let target = self.teams.get(&team).ok_or(StateError::UnknownTeam(team))?;
        let previous = self.members.get(&player).copied();
        if previous == Some(team) {
            return Ok(());
        }
        if target.locked {
            return Err(StateError::TeamLocked(team));
        }
        if target.size >= self.max_team_size {
            return Err(StateError::TeamFull {
                team,
                size: target.size,
            });
        }

        if let Some(old) = previous {
            self.teams
                .update(w, &old, |t| t.size = t.size.saturating_sub(1))?;
        }
        self.teams.update(w, &team, |t| t.size += 1)?;
        self.members.set(w, player, team)?;
        tracing::debug!(%player, %team, ?previous, "player assigned to team");
        Ok(())
    }

    /// Assigns `player` to the unlocked team with the fewest members,
    /// lowest id first on ties.
    pub fn auto_assign(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
    ) -> Result<TeamId, StateError> {
        if let Some(current) = self.members.get(&player) {
            return Ok(*current);
        }
        let team = self
            .teams
            .iter()
            .filter(|(_, t)| !t.locked && t.size < self.max_team_size)
            .min_by_key(|(id, t)| (t.size, **id))
            .map(|(id, _)| *id)
            .ok_or(StateError::NoOpenTeam)?;
        self.assign_player_to_team(w, player, team)?;
        Ok(team)
    }

    /// Takes `player` off their team. Returns the team they were on.
    pub fn remove_player(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
    ) -> Result<Option<TeamId>, StateError> {
        let Some(team) = self.members.remove(w, &player)? else {
            return Ok(None);
        };
        self.teams
            .update(w, &team, |t| t.size = t.size.saturating_sub(1))?;
        Ok(Some(team))
    }

    /// Closes or reopens a team to new members.
    pub fn set_locked(
        &mut self,
        w: &mut Writer<'_>,
        team: TeamId,
        locked: bool,
    ) -> Result<(), StateError> {
        if self.teams.update(w, &team, |t| t.locked = locked)? {
            Ok(())
        } else {
            Err(StateError::UnknownTeam(team))
        }
    }

    pub fn add_team_score(
        &mut self,
        w: &mut Writer<'_>,
        team: TeamId,
        delta: i64,
    ) -> Result<(), StateError> {
        if self.teams.update(w, &team, |t| t.score += delta)? {
            Ok(())
        } else {
            Err(StateError::UnknownTeam(team))
        }
    }

    /// The record for `team`, if it was created.
    pub fn get_team(&self, team: TeamId) -> Option<&TeamRecord> {
        self.teams.get(&team)
    }

    /// The team `player` is on. Authoritative over
    /// [`PlayerRecord::team`](crate::PlayerRecord::team).
    pub fn team_of(&self, player: PlayerId) -> Option<TeamId> {
        self.members.get(&player).copied()
    }

    /// Members of `team`, in player id order.
    pub fn members(&self, team: TeamId) -> Vec<PlayerId> {
        self.members
            .iter()
            .filter(|(_, t)| **t == team)
            .map(|(p, _)| *p)
            .collect()
    }

    pub fn teams(&self) -> impl Iterator<Item = (&TeamId, &TeamRecord)> {
        self.teams.iter()
    }

    pub fn replicas(&self) -> [&dyn Replica; 2] {
        [&self.teams, &self.members]
    }

    pub fn replicas_mut(&mut self) -> [&mut dyn Replica; 2] {
        [&mut self.teams, &mut self.members]
    }
}
