//! The match phase machine.
//!
//! The whole machine is one replicated record, so every node sees phase
//! changes in the same order as the table writes around them.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use rift_protocol::{ModuleId, TeamId};
use rift_table::{Replica, ReplicatedCell, Writer};
use serde::{Deserialize, Serialize};

use crate::{SessionConfig, SessionError};

// ---------------------------------------------------------------------------
// MatchPhase
// ---------------------------------------------------------------------------

/// Where the match is.
///
/// ```text
/// WaitingForPlayers → Preparation → InProgress → RoundEnd ─┬→ Preparation
///                                                          └→ GameOver
/// ```
///
/// - **WaitingForPlayers**: not enough ready participants yet. No timer.
/// - **Preparation**: countdown before the round starts.
/// - **InProgress**: the round is running. Ends on timeout or reported
///   victory.
/// - **RoundEnd**: short delay showing the round result.
/// - **GameOver**: a team reached the round-win target. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    WaitingForPlayers,
    Preparation,
    InProgress,
    RoundEnd,
    GameOver,
}

impl MatchPhase {
    /// Returns `true` if moving from `self` to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::WaitingForPlayers, Self::Preparation)
                | (Self::Preparation, Self::InProgress)
                | (Self::InProgress, Self::RoundEnd)
                | (Self::RoundEnd, Self::Preparation)
                | (Self::RoundEnd, Self::GameOver)
        )
    }

    /// Returns `true` if this phase has a running timer.
    pub fn is_timed(self) -> bool {
        matches!(self, Self::Preparation | Self::InProgress | Self::RoundEnd)
    }

    /// No transition leaves this phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::GameOver)
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForPlayers => write!(f, "WaitingForPlayers"),
            Self::Preparation => write!(f, "Preparation"),
            Self::InProgress => write!(f, "InProgress"),
            Self::RoundEnd => write!(f, "RoundEnd"),
            Self::GameOver => write!(f, "GameOver"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// The replicated state of the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub phase: MatchPhase,
    /// 1-based once the first Preparation starts.
    pub round: u32,
    /// Time spent in the current phase. Reset on every transition and
    /// frozen while paused.
    pub elapsed: Duration,
    pub paused: bool,
    pub round_wins: BTreeMap<TeamId, u32>,
    /// Winner of the last finished round. `None` for a draw.
    pub last_winner: Option<TeamId>,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            phase: MatchPhase::WaitingForPlayers,
            round: 0,
            elapsed: Duration::ZERO,
            paused: false,
            round_wins: BTreeMap::new(),
            last_winner: None,
        }
    }
}

/// A transition that just happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: MatchPhase,
    pub to: MatchPhase,
    pub round: u32,
}

// ---------------------------------------------------------------------------
// SessionMachine
// ---------------------------------------------------------------------------

/// Drives [`SessionRecord`] through the match phases.
pub struct SessionMachine {
    cell: ReplicatedCell<SessionRecord>,
    config: SessionConfig,
}

impl SessionMachine {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            cell: ReplicatedCell::new(ModuleId::Session),
            config,
        }
    }

    /// The current record, or the initial one if nothing was written yet.
    pub fn record(&self) -> SessionRecord {
        self.cell.get().cloned().unwrap_or_default()
    }

    /// The replicated phase, or `WaitingForPlayers` before the first write.
    pub fn phase(&self) -> MatchPhase {
        self.cell
            .get()
            .map_or(MatchPhase::WaitingForPlayers, |r| r.phase)
    }

    pub fn is_paused(&self) -> bool {
        self.cell.get().is_some_and(|r| r.paused)
    }

    /// Time left in the current phase, or `None` for untimed phases.
    pub fn remaining(&self) -> Option<Duration> {
        let record = self.cell.get()?;
        let total = self.phase_duration(record.phase)?;
        Some(total.saturating_sub(record.elapsed))
    }

    /// Writes the initial record so replicas see `WaitingForPlayers`.
    pub fn init(&mut self, w: &mut Writer<'_>) -> Result<(), SessionError> {
        if !self.cell.is_set() {
            self.cell.set(w, SessionRecord::default())?;
        }
        Ok(())
    }

    /// Starts Preparation once `ready` reaches `min_players`.
    pub fn players_ready(
        &mut self,
        w: &mut Writer<'_>,
        ready: usize,
    ) -> Result<Option<PhaseChange>, SessionError> {
        if self.phase() != MatchPhase::WaitingForPlayers || ready < self.config.min_players {
            return Ok(None);
        }
        let mut record = self.record();
        record.round = 1;
        self.transition(w, record, MatchPhase::Preparation).map(Some)
    }

    /// Ends the running round with `winner` (`None` for a draw).
    ///
    /// Ignored outside `InProgress`.
    pub fn report_victory(
        &mut self,
        w: &mut Writer<'_>,
        winner: Option<TeamId>,
    ) -> Result<Option<PhaseChange>, SessionError> {
        if self.phase() != MatchPhase::InProgress {
            tracing::debug!(?winner, phase = %self.phase(), "victory report ignored");
            return Ok(None);
        }
        self.end_round(w, self.record(), winner).map(Some)
    }

    /// Freezes or resumes the phase timer. Returns whether it changed.
    pub fn set_paused(&mut self, w: &mut Writer<'_>, paused: bool) -> Result<bool, SessionError> {
        let mut record = self.record();
        if record.paused == paused || record.phase.is_terminal() {
            return Ok(false);
        }
        record.paused = paused;
        self.cell.set(w, record)?;
        tracing::info!(paused, "session pause toggled");
        Ok(true)
    }

    /// Advances the phase timer by `dt` and performs any timed transition.
    pub fn tick(
        &mut self,
        w: &mut Writer<'_>,
        dt: Duration,
    ) -> Result<Option<PhaseChange>, SessionError> {
        let Some(mut record) = self.cell.get().cloned() else {
            return Ok(None);
        };
        if record.paused || !record.phase.is_timed() {
            return Ok(None);
        }

        record.elapsed += dt;
        let Some(limit) = self.phase_duration(record.phase) else {
            return Ok(None);
        };
        if record.elapsed < limit {
            self.cell.set(w, record)?;
            return Ok(None);
        }

        let change = match record.phase {
            MatchPhase::Preparation => self.transition(w, record, MatchPhase::InProgress)?,
            MatchPhase::InProgress => self.end_round(w, record, None)?,
            MatchPhase::RoundEnd => {
                let won = record
                    .round_wins
                    .values()
                    .any(|wins| *wins >= self.config.rounds_to_win);
                if won {
                    self.transition(w, record, MatchPhase::GameOver)?
                } else {
                    record.round += 1;
                    self.transition(w, record, MatchPhase::Preparation)?
                }
            }
            MatchPhase::WaitingForPlayers | MatchPhase::GameOver => return Ok(None),
        };
        Ok(Some(change))
    }

    pub fn replica(&self) -> &dyn Replica {
        &self.cell
    }

    pub fn replica_mut(&mut self) -> &mut dyn Replica {
        &mut self.cell
    }

    fn phase_duration(&self, phase: MatchPhase) -> Option<Duration> {
        match phase {
            MatchPhase::Preparation => Some(self.config.preparation()),
            MatchPhase::InProgress => Some(self.config.round()),
            MatchPhase::RoundEnd => Some(self.config.round_end_delay()),
            MatchPhase::WaitingForPlayers | MatchPhase::GameOver => None,
        }
    }

    fn end_round(
        &mut self,
        w: &mut Writer<'_>,
        mut record: SessionRecord,
        winner: Option<TeamId>,
    ) -> Result<PhaseChange, SessionError> {
        if let Some(team) = winner {
            *record.round_wins.entry(team).or_insert(0) += 1;
        }
        record.last_winner = winner;
        self.transition(w, record, MatchPhase::RoundEnd)
    }

    /// The one place the phase changes: resets the timer and writes the
    /// record as a single broadcast.
    fn transition(
        &mut self,
        w: &mut Writer<'_>,
        mut record: SessionRecord,
        to: MatchPhase,
    ) -> Result<PhaseChange, SessionError> {
        let from = record.phase;
        debug_assert!(from.can_transition_to(to), "illegal phase edge {from} → {to}");
        record.phase = to;
        record.elapsed = Duration::ZERO;
        let round = record.round;
        self.cell.set(w, record)?;
        tracing::info!(%from, %to, round, "match phase changed");
        Ok(PhaseChange { from, to, round })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_table::Outbox;

    const SEC: Duration = Duration::from_secs(1);

    fn config() -> SessionConfig {
        SessionConfig {
            min_players: 2,
            preparation_secs: 3,
            round_secs: 10,
            round_end_delay_secs: 2,
            rounds_to_win: 2,
            ..SessionConfig::default()
        }
    }

    fn started(outbox: &mut Outbox) -> SessionMachine {
        let mut machine = SessionMachine::new(config());
        let mut w = Writer::authority(outbox, Duration::ZERO);
        machine.init(&mut w).unwrap();
        machine.players_ready(&mut w, 2).unwrap();
        machine
    }

    #[test]
    fn test_match_phase_can_transition_to() {
        assert!(MatchPhase::WaitingForPlayers.can_transition_to(MatchPhase::Preparation));
        assert!(MatchPhase::RoundEnd.can_transition_to(MatchPhase::Preparation));
        assert!(MatchPhase::RoundEnd.can_transition_to(MatchPhase::GameOver));
        assert!(!MatchPhase::InProgress.can_transition_to(MatchPhase::GameOver));
        assert!(!MatchPhase::GameOver.can_transition_to(MatchPhase::Preparation));
    }

    #[test]
    fn test_match_phase_display() {
        assert_eq!(MatchPhase::WaitingForPlayers.to_string(), "WaitingForPlayers");
        assert_eq!(MatchPhase::RoundEnd.to_string(), "RoundEnd");
    }

    #[test]
    fn test_players_ready_below_minimum_stays_waiting() {
        let mut machine = SessionMachine::new(config());
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        machine.init(&mut w).unwrap();

        assert_eq!(machine.players_ready(&mut w, 1).unwrap(), None);
        assert_eq!(machine.phase(), MatchPhase::WaitingForPlayers);
        assert_eq!(machine.remaining(), None);
    }

    #[test]
    fn test_tick_preparation_elapses_into_round() {
        let mut outbox = Outbox::new();
        let mut machine = started(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);

        assert_eq!(machine.tick(&mut w, 2 * SEC).unwrap(), None);
        assert_eq!(machine.remaining(), Some(SEC));

        let change = machine.tick(&mut w, SEC).unwrap().unwrap();
        assert_eq!(change.to, MatchPhase::InProgress);
        assert_eq!(machine.remaining(), Some(10 * SEC));
    }

    #[test]
    fn test_tick_round_timeout_ends_round_as_draw() {
        let mut outbox = Outbox::new();
        let mut machine = started(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        machine.tick(&mut w, 3 * SEC).unwrap();

        let change = machine.tick(&mut w, 10 * SEC).unwrap().unwrap();

        assert_eq!(change.from, MatchPhase::InProgress);
        assert_eq!(change.to, MatchPhase::RoundEnd);
        assert_eq!(machine.record().last_winner, None);
        assert_eq!(machine.record().elapsed, Duration::ZERO);
    }

    #[test]
    fn test_set_paused_freezes_timer() {
        let mut outbox = Outbox::new();
        let mut machine = started(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);

        assert!(machine.set_paused(&mut w, true).unwrap());
        assert!(!machine.set_paused(&mut w, true).unwrap());
        machine.tick(&mut w, 60 * SEC).unwrap();

        assert_eq!(machine.phase(), MatchPhase::Preparation);
        assert_eq!(machine.remaining(), Some(3 * SEC));
    }

    #[test]
    fn test_report_victory_outside_round_is_ignored() {
        let mut outbox = Outbox::new();
        let mut machine = started(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);

        let change = machine.report_victory(&mut w, Some(TeamId(0))).unwrap();

        assert_eq!(change, None);
        assert!(machine.record().round_wins.is_empty());
    }

    #[test]
    fn test_full_match_reaches_game_over_after_rounds_to_win() {
        let mut outbox = Outbox::new();
        let mut machine = started(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);

        for round in 1..=2 {
            assert_eq!(machine.record().round, round);
            machine.tick(&mut w, 3 * SEC).unwrap(); // → InProgress
            machine.report_victory(&mut w, Some(TeamId(1))).unwrap(); // → RoundEnd
            machine.tick(&mut w, 2 * SEC).unwrap(); // → Preparation | GameOver
        }

        assert_eq!(machine.phase(), MatchPhase::GameOver);
        assert_eq!(machine.record().round_wins.get(&TeamId(1)), Some(&2));
        assert_eq!(machine.tick(&mut w, 100 * SEC).unwrap(), None);
        assert!(!machine.set_paused(&mut w, true).unwrap());
    }
}
