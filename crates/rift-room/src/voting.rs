//! Timed map voting.
//!
//! `start_map_voting` seeds one tally per map in rotation and opens a
//! window. Each participant gets one vote across all candidates; a
//! second vote, for any map, is ignored. When the window closes the
//! highest tally wins, ties going to the map registered first.

use std::collections::BTreeSet;
use std::time::Duration;

use rift_protocol::{MapId, ModuleId, PlayerId};
use rift_table::{Replica, ReplicatedCell, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::{LobbyConfig, MapInfo, RoomError};

/// Votes for one candidate map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    /// Registration order of the map; breaks ties.
    pub order: usize,
    /// Always equals `voters.len()`.
    pub votes: u32,
    /// Who voted for this map. A player appears in at most one tally.
    pub voters: BTreeSet<PlayerId>,
}

/// Whether a vote is running and until when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteWindow {
    pub open: bool,
    pub ends_at: Duration,
    /// Winner of the last closed vote.
    pub current_map: Option<MapId>,
}

/// Per-map tallies plus the single vote window.
pub struct MapVoting {
    tallies: ReplicatedTable<MapId, VoteTally>,
    window: ReplicatedCell<VoteWindow>,
    maps: Vec<MapInfo>,
}

impl MapVoting {
    pub fn new(config: &LobbyConfig) -> Self {
        Self {
            tallies: ReplicatedTable::new(ModuleId::Votes),
            window: ReplicatedCell::new(ModuleId::VoteWindow),
            maps: config.maps.clone(),
        }
    }

    /// Opens a vote lasting `duration` over every map in rotation.
    ///
    /// Tallies from a previous vote are cleared.
    pub fn start_map_voting(
        &mut self,
        w: &mut Writer<'_>,
        duration: Duration,
    ) -> Result<(), RoomError> {
        let candidates: Vec<&MapInfo> = self.maps.iter().filter(|m| m.in_rotation).collect();
        if candidates.is_empty() {
            return Err(RoomError::NoMaps);
        }

        self.tallies.remove_where(w, |_, _| true)?;
        for (order, map) in candidates.into_iter().enumerate() {
            self.tallies.set(
                w,
                map.id.clone(),
                VoteTally {
                    order,
                    votes: 0,
                    voters: BTreeSet::new(),
                },
            )?;
        }

        let current_map = self.current_map().cloned();
        self.window.set(
            w,
            VoteWindow {
                open: true,
                ends_at: w.now() + duration,
                current_map,
            },
        )?;
        tracing::info!(candidates = self.tallies.len(), ?duration, "map voting opened");
        Ok(())
    }

    /// Records `player`'s vote for `map`. Returns `false` if the player
    /// had already voted, in which case nothing changes.
    pub fn cast_vote(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        map: &MapId,
    ) -> Result<bool, RoomError> {
        if !self.is_open() {
            return Err(RoomError::VotingClosed);
        }
        if !self.tallies.contains_key(map) {
            return Err(RoomError::UnknownCandidate(map.clone()));
        }
        if self.tallies.values().any(|t| t.voters.contains(&player)) {
            return Ok(false);
        }

        self.tallies.update(w, map, |t| {
            t.votes += 1;
            t.voters.insert(player);
        })?;
        Ok(true)
    }

    /// Closes the window once its time is up and returns the winner.
    pub fn tick(&mut self, w: &mut Writer<'_>) -> Result<Option<MapId>, RoomError> {
        let Some(window) = self.window.get() else {
            return Ok(None);
        };
        if !window.open || w.now() < window.ends_at {
            return Ok(None);
        }
        let ends_at = window.ends_at;

        let winner = self
            .tallies
            .iter()
            .max_by(|(_, a), (_, b)| a.votes.cmp(&b.votes).then(b.order.cmp(&a.order)))
            .map(|(map, _)| map.clone());

        self.window.set(
            w,
            VoteWindow {
                open: false,
                ends_at,
                current_map: winner.clone(),
            },
        )?;
        if let Some(map) = &winner {
            tracing::info!(%map, "map vote closed");
        }
        Ok(winner)
    }

    // -- Queries ----------------------------------------------------------

    /// The tally for `map` in the current or last vote.
    pub fn get_vote(&self, map: &MapId) -> Option<&VoteTally> {
        self.tallies.get(map)
    }

    pub fn is_open(&self) -> bool {
        self.window.get().is_some_and(|v| v.open)
    }

    /// Winner of the most recent closed vote.
    pub fn current_map(&self) -> Option<&MapId> {
        self.window.get().and_then(|v| v.current_map.as_ref())
    }

    pub fn replicas(&self) -> [&dyn Replica; 2] {
        [&self.tallies, &self.window]
    }

    pub fn replicas_mut(&mut self) -> [&mut dyn Replica; 2] {
        [&mut self.tallies, &mut self.window]
    }
}
