//! Matchmaking queue and the matches it forms.
//!
//! Entries wait in FIFO order. Every `matchmaking_interval` the authority
//! takes ready entries oldest first, `party_size` at a time, and splits
//! each group into two rosters: the first half goes to roster A and the
//! second half to roster B. Matches are audited every tick; one with a
//! disconnected member is torn down.

use std::time::Duration;

use rift_protocol::{MatchId, ModuleId, PlayerId, TeamId};
use rift_table::{IdAllocator, Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::{LobbyConfig, RoomError};

/// One participant waiting for a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub mode: String,
    pub team_preference: Option<TeamId>,
    pub enqueued_at: Duration,
    /// Carried for clients; grouping is FIFO and ignores it.
    pub rating: u32,
    pub ready: bool,
    /// Arrival order among entries enqueued at the same instant.
    pub ticket: u64,
}

/// A formed match. Removed when it ends or is torn down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveMatch {
    /// Roster A, then roster B, each in queue order.
    pub rosters: [Vec<PlayerId>; 2],
    pub created_at: Duration,
    pub started: bool,
}

impl ActiveMatch {
    /// Whether `player` is on either roster.
    pub fn contains(&self, player: PlayerId) -> bool {
        self.players().any(|p| p == player)
    }

    /// Roster A members, then roster B.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.rosters.iter().flatten().copied()
    }
}

/// What one call to [`MatchQueue::tick`] changed.
#[derive(Debug, Default, PartialEq)]
pub struct QueueTick {
    pub formed: Vec<MatchId>,
    pub timed_out: Vec<PlayerId>,
    pub torn_down: Vec<MatchId>,
}

/// Queue entries plus the matches formed from them.
pub struct MatchQueue {
    entries: ReplicatedTable<PlayerId, QueueEntry>,
    matches: ReplicatedTable<MatchId, ActiveMatch>,
    party_size: usize,
    interval: Duration,
    max_wait: Duration,
    /// Time since the last grouping pass. Local to the authority.
    since_pass: Duration,
}

impl MatchQueue {
    pub fn new(config: &LobbyConfig) -> Self {
        Self {
            entries: ReplicatedTable::new(ModuleId::Queue),
            matches: ReplicatedTable::new(ModuleId::Matches),
            party_size: config.party_size,
            interval: config.matchmaking_interval(),
            max_wait: config.max_queue_wait(),
            since_pass: Duration::ZERO,
        }
    }

    /// Adds `player` to the back of the queue, not ready.
    ///
    /// Enqueueing again replaces the old entry and moves the player to the
    /// back.
    pub fn enqueue(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        mode: impl Into<String>,
        team_preference: Option<TeamId>,
        rating: u32,
    ) -> Result<(), RoomError> {
        if let Some(match_id) = self.match_of(player) {
            return Err(RoomError::AlreadyInMatch { player, match_id });
        }
        let ticket = self.entries.values().map(|e| e.ticket).max().unwrap_or(0) + 1;
        self.entries.set(
            w,
            player,
            QueueEntry {
                mode: mode.into(),
                team_preference,
                enqueued_at: w.now(),
                rating,
                ready: false,
                ticket,
            },
        )?;
        tracing::debug!(%player, queue_len = self.entries.len(), "enqueued");
        Ok(())
    }

    /// Marks a queued participant ready or not. Only ready entries are
    /// grouped.
    pub fn set_ready(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        ready: bool,
    ) -> Result<(), RoomError> {
        if self.entries.update(w, &player, |e| e.ready = ready)? {
            Ok(())
        } else {
            Err(RoomError::NotQueued(player))
        }
    }

    /// Returns whether the player was queued.
    pub fn leave_queue(&mut self, w: &mut Writer<'_>, player: PlayerId) -> Result<bool, RoomError> {
        Ok(self.entries.remove(w, &player)?.is_some())
    }

    /// Advances the matchmaking clock by `dt`.
    ///
    /// The match audit runs every call. Queue timeouts and grouping run
    /// once per interval.
    pub fn tick(
        &mut self,
        w: &mut Writer<'_>,
        ids: &mut IdAllocator,
        dt: Duration,
        is_connected: impl Fn(PlayerId) -> bool,
    ) -> Result<QueueTick, RoomError> {
        let mut out = QueueTick {
            torn_down: self.audit(w, &is_connected)?,
            ..QueueTick::default()
        };

        self.since_pass += dt;
        if self.since_pass < self.interval {
            return Ok(out);
        }
        self.since_pass = Duration::ZERO;

        let now = w.now();
        let max_wait = self.max_wait;
        out.timed_out = self
            .entries
            .remove_where(w, |_, e| now.saturating_sub(e.enqueued_at) > max_wait)?
            .into_iter()
            .map(|(player, _)| player)
            .collect();
        for player in &out.timed_out {
            tracing::info!(%player, "queue wait exceeded, entry dropped");
        }

        out.formed = self.form_matches(w, ids)?;
        Ok(out)
    }

    fn form_matches(
        &mut self,
        w: &mut Writer<'_>,
        ids: &mut IdAllocator,
    ) -> Result<Vec<MatchId>, RoomError> {
        if self.party_size == 0 {
            return Ok(Vec::new());
        }
        let mut ready: Vec<(&PlayerId, &QueueEntry)> =
            self.entries.iter().filter(|(_, e)| e.ready).collect();
        ready.sort_by_key(|(p, e)| (e.enqueued_at, e.ticket, **p));
        let ordered: Vec<PlayerId> = ready.into_iter().map(|(p, _)| *p).collect();

        let mut formed = Vec::new();
        for group in ordered.chunks_exact(self.party_size) {
            let half = group.len() / 2;
            let record = ActiveMatch {
                rosters: [group[..half].to_vec(), group[half..].to_vec()],
                created_at: w.now(),
                started: false,
            };
            for player in group {
                self.entries.remove(w, player)?;
            }
            let match_id = ids.next_match(w)?;
            tracing::info!(%match_id, players = group.len(), "match formed");
            self.matches.set(w, match_id, record)?;
            formed.push(match_id);
        }
        Ok(formed)
    }

    fn audit(
        &mut self,
        w: &mut Writer<'_>,
        is_connected: &impl Fn(PlayerId) -> bool,
    ) -> Result<Vec<MatchId>, RoomError> {
        let torn: Vec<MatchId> = self
            .matches
            .remove_where(w, |_, m| m.players().any(|p| !is_connected(p)))?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        for match_id in &torn {
            tracing::warn!(%match_id, "match member disconnected, match torn down");
        }
        Ok(torn)
    }

    /// Flags a formed match as started.
    pub fn start_match(&mut self, w: &mut Writer<'_>, match_id: MatchId) -> Result<(), RoomError> {
        if self.matches.update(w, &match_id, |m| m.started = true)? {
            Ok(())
        } else {
            Err(RoomError::MatchNotFound(match_id))
        }
    }

    /// Removes a match and returns its final record.
    pub fn end_match(
        &mut self,
        w: &mut Writer<'_>,
        match_id: MatchId,
    ) -> Result<ActiveMatch, RoomError> {
        self.matches
            .remove(w, &match_id)?
            .ok_or(RoomError::MatchNotFound(match_id))
    }

    /// Drops every trace of `player`: their queue entry and any match they
    /// were rostered in.
    pub fn remove_player(&mut self, w: &mut Writer<'_>, player: PlayerId) -> Result<(), RoomError> {
        self.entries.remove(w, &player)?;
        self.matches.remove_where(w, |_, m| m.contains(player))?;
        Ok(())
    }

    // -- Queries ----------------------------------------------------------

    pub fn get_entry(&self, player: PlayerId) -> Option<&QueueEntry> {
        self.entries.get(&player)
    }

    pub fn is_queued(&self, player: PlayerId) -> bool {
        self.entries.contains_key(&player)
    }

    pub fn queue_len(&self) -> usize {
        self.entries.len()
    }

    pub fn get_match(&self, match_id: MatchId) -> Option<&ActiveMatch> {
        self.matches.get(&match_id)
    }

    /// The match `player` is rostered in, if any.
    pub fn match_of(&self, player: PlayerId) -> Option<MatchId> {
        self.matches
            .iter()
            .find(|(_, m)| m.contains(player))
            .map(|(id, _)| *id)
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Entries then matches.
    pub fn replicas(&self) -> [&dyn Replica; 2] {
        [&self.entries, &self.matches]
    }

    pub fn replicas_mut(&mut self) -> [&mut dyn Replica; 2] {
        [&mut self.entries, &mut self.matches]
    }
}
