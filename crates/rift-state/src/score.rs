//! Per-player score lines and per-team top-scorer lists.
//!
//! Score lines only move forward. An update is rejected if any counter
//! decreases or if the score grew faster than `max_score_per_second`
//! since the last accepted update, measured in simulation time. That
//! keeps a replayed or corrupted command from inflating a score.

use std::collections::BTreeSet;
use std::time::Duration;

use rift_protocol::{ModuleId, PlayerId, TeamId};
use rift_table::{Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::{StateConfig, StateError};

/// The counters of one scoreboard line. Each only grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLine {
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub score: u32,
}

impl ScoreLine {
    /// The first counter that is lower in `next` than in `self`.
    fn first_regression(&self, next: &ScoreLine) -> Option<&'static str> {
        [
            ("kills", self.kills, next.kills),
            ("deaths", self.deaths, next.deaths),
            ("assists", self.assists, next.assists),
            ("score", self.score, next.score),
        ]
        .into_iter()
        .find(|(_, old, new)| new < old)
        .map(|(field, _, _)| field)
    }
}

/// One player's line and the team it counts for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub team: TeamId,
    pub line: ScoreLine,
    /// Simulation time of the last accepted update.
    pub updated_at: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopEntry {
    pub player: PlayerId,
    pub score: u32,
}

/// Score lines plus the derived top scorers of each team.
pub struct ScoreModule {
    scores: ReplicatedTable<PlayerId, ScoreRecord>,
    /// Highest score first.
    top: ReplicatedTable<TeamId, Vec<TopEntry>>,
    max_score_per_second: f32,
    top_k: usize,
}

impl ScoreModule {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            scores: ReplicatedTable::new(ModuleId::Scores),
            top: ReplicatedTable::new(ModuleId::TopScorers),
            max_score_per_second: config.max_score_per_second,
            top_k: config.top_scorers,
        }
    }

    /// Starts a zeroed score line for `player`. An existing line is
    /// kept and only moved to `team`.
    pub fn register(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        team: TeamId,
    ) -> Result<(), StateError> {
        let previous_team = self.scores.get(&player).map(|r| r.team);
        match previous_team {
            Some(old) if old == team => return Ok(()),
            Some(_) => {
                self.scores.update(w, &player, |r| r.team = team)?;
            }
            None => {
                self.scores.set(
                    w,
                    player,
                    ScoreRecord {
                        team,
                        line: ScoreLine::default(),
                        updated_at: w.now(),
                    },
                )?;
            }
        }
        self.refresh_top(w, team)?;
        if let Some(old) = previous_team {
            self.refresh_top(w, old)?;
        }
        Ok(())
    }

    /// Replaces a player's score line.
    ///
    /// # Errors
    /// - [`StateError::ScoreRegression`] if any counter would go down.
    /// - [`StateError::ScoreRateExceeded`] if the score delta is larger
    ///   than `elapsed × max_score_per_second`.
    ///
    /// Either way the stored record is left as it was.
    pub fn update_player_score(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        line: ScoreLine,
        team: TeamId,
    ) -> Result<(), StateError> {
        self.check_update(player, &line, w.now())?;
        self.commit(w, player, line, team)
    }

    /// Credits a kill to `killer` worth `points`, and a death to `victim`.
    ///
    /// Both lines are validated before either is written. A player who
    /// kills themselves only takes the death.
    pub fn record_kill(
        &mut self,
        w: &mut Writer<'_>,
        killer: PlayerId,
        victim: PlayerId,
        points: u32,
    ) -> Result<(), StateError> {
        let victim_record = self
            .scores
            .get(&victim)
            .ok_or(StateError::UnknownPlayer(victim))?;
        let victim_team = victim_record.team;
        let mut victim_line = victim_record.line;
        victim_line.deaths += 1;

        if killer == victim {
            return self.update_player_score(w, victim, victim_line, victim_team);
        }

        let killer_record = self
            .scores
            .get(&killer)
            .ok_or(StateError::UnknownPlayer(killer))?;
        let killer_team = killer_record.team;
        let mut killer_line = killer_record.line;
        killer_line.kills += 1;
        killer_line.score += points;

        let now = w.now();
        self.check_update(killer, &killer_line, now)?;
        self.check_update(victim, &victim_line, now)?;
        self.commit(w, killer, killer_line, killer_team)?;
        self.commit(w, victim, victim_line, victim_team)
    }

    /// Drops `player`'s line and refreshes their team's top list.
    pub fn remove_player(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
    ) -> Result<(), StateError> {
        if let Some(record) = self.scores.remove(w, &player)? {
            self.refresh_top(w, record.team)?;
        }
        Ok(())
    }

    pub fn get_score(&self, player: PlayerId) -> Option<&ScoreRecord> {
        self.scores.get(&player)
    }

    /// Up to `top_k` entries, highest score first. Empty for an unknown
    /// team.
    pub fn top_scorers(&self, team: TeamId) -> &[TopEntry] {
        self.top.get(&team).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn replicas(&self) -> [&dyn Replica; 2] {
        [&self.scores, &self.top]
    }

    pub fn replicas_mut(&mut self) -> [&mut dyn Replica; 2] {
        [&mut self.scores, &mut self.top]
    }

    /// Rejects `line` if it regresses any counter or grows the score
    /// faster than the rate cap allows since the last accepted update.
    fn check_update(
        &self,
        player: PlayerId,
        line: &ScoreLine,
        now: Duration,
    ) -> Result<(), StateError> {
        let current = self
            .scores
            .get(&player)
            .ok_or(StateError::UnknownPlayer(player))?;
        if let Some(field) = current.line.first_regression(line) {
            tracing::debug!(%player, field, "score update rejected: regression");
            return Err(StateError::ScoreRegression { player, field });
        }
        let elapsed = now.saturating_sub(current.updated_at).as_secs_f32();
        let delta = line.score - current.line.score;
        let allowed = elapsed * self.max_score_per_second;
        if delta as f32 > allowed {
            tracing::debug!(%player, delta, allowed, "score update rejected: rate cap");
            return Err(StateError::ScoreRateExceeded {
                player,
                delta,
                allowed,
            });
        }
        Ok(())
    }

    fn commit(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        line: ScoreLine,
        team: TeamId,
    ) -> Result<(), StateError> {
        let old_team = self.scores.get(&player).map(|r| r.team);
        let updated_at = w.now();
        self.scores.set(
            w,
            player,
            ScoreRecord {
                team,
                line,
                updated_at,
            },
        )?;
        self.refresh_top(w, team)?;
        if let Some(old) = old_team.filter(|old| *old != team) {
            self.refresh_top(w, old)?;
        }
        Ok(())
    }

    /// Recomputes the top-K list for `team` with a single scan that keeps
    /// the K largest seen so far, replacing the current minimum.
    fn refresh_top(&mut self, w: &mut Writer<'_>, team: TeamId) -> Result<(), StateError> {
        if self.top_k == 0 {
            return Ok(());
        }
        let mut best: Vec<TopEntry> = Vec::with_capacity(self.top_k);
        for (player, record) in self.scores.iter().filter(|(_, r)| r.team == team) {
            let entry = TopEntry {
                player: *player,
                score: record.line.score,
            };
            if best.len() < self.top_k {
                best.push(entry);
                continue;
            }
            let Some((min_idx, min)) = best
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| (e.score, std::cmp::Reverse(e.player)))
            else {
                continue;
            };
            if entry.score > min.score {
                best[min_idx] = entry;
            }
        }
        best.sort_by(|a, b| b.score.cmp(&a.score).then(a.player.cmp(&b.player)));

        if best.is_empty() {
            self.top.remove(w, &team)?;
        } else {
            self.top.set_if_changed(w, team, best)?;
        }
        Ok(())
    }

    /// Every team that currently has a score line.
    pub fn teams(&self) -> BTreeSet<TeamId> {
        self.scores.values().map(|r| r.team).collect()
    }
}
