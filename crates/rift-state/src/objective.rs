//! Central capture points.
//!
//! ```text
//! presence: {T0: 2}        → progress toward T0 at capture_rate/s
//! presence: {T0: 1, T1: 1} → contested, progress frozen
//! presence: {T1: 1}        → capturing team changed, progress resets
//! progress ≥ 1.0           → owner = capturing team, progress = 0
//! presence: {owner: 1}     → progress of any attacker is cleared
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use rift_protocol::{ModuleId, ObjectiveId, TeamId, Vec2};
use rift_table::{IdAllocator, Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::{StateConfig, StateError};

/// A zone teams fight over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturePoint {
    pub position: Vec2,
    pub radius: f32,
    pub owner: Option<TeamId>,
    /// The team progress is currently accruing for.
    pub capturing: Option<TeamId>,
    /// 0.0 to 1.0.
    pub progress: f32,
    /// Players inside the zone, per team. Teams with nobody present are
    /// absent.
    pub presence: BTreeMap<TeamId, u32>,
    pub contested: bool,
}

impl CapturePoint {
    /// The only team with anyone in the zone.
    pub fn sole_team(&self) -> Option<TeamId> {
        let mut teams = self.presence.keys();
        match (teams.next(), teams.next()) {
            (Some(team), None) => Some(*team),
            _ => None,
        }
    }
}

/// A point changed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureEvent {
    pub objective: ObjectiveId,
    pub team: TeamId,
    pub previous: Option<TeamId>,
}

/// Capture points and their progress.
pub struct ObjectiveModule {
    points: ReplicatedTable<ObjectiveId, CapturePoint>,
    capture_rate_per_sec: f32,
}

impl ObjectiveModule {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            points: ReplicatedTable::new(ModuleId::Objectives),
            capture_rate_per_sec: config.capture_rate_per_sec,
        }
    }

    /// Adds an unowned point and returns its id.
    pub fn create_point(
        &mut self,
        w: &mut Writer<'_>,
        ids: &mut IdAllocator,
        position: Vec2,
        radius: f32,
    ) -> Result<ObjectiveId, StateError> {
        let id = ids.next_objective(w)?;
        self.points.set(
            w,
            id,
            CapturePoint {
                position,
                radius,
                owner: None,
                capturing: None,
                progress: 0.0,
                presence: BTreeMap::new(),
                contested: false,
            },
        )?;
        Ok(id)
    }

    /// Counts one more `team` player inside the zone.
    pub fn enter_zone(
        &mut self,
        w: &mut Writer<'_>,
        id: ObjectiveId,
        team: TeamId,
    ) -> Result<(), StateError> {
        self.modify_presence(w, id, |presence| {
            *presence.entry(team).or_insert(0) += 1;
        })
    }

    /// Counts one fewer. Saturates at zero.
    pub fn leave_zone(
        &mut self,
        w: &mut Writer<'_>,
        id: ObjectiveId,
        team: TeamId,
    ) -> Result<(), StateError> {
        self.modify_presence(w, id, |presence| {
            if let Some(count) = presence.get_mut(&team) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    presence.remove(&team);
                }
            }
        })
    }

    /// Advances capture progress on every point.
    ///
    /// Only a change of owner produces a [`CaptureEvent`].
    pub fn tick(
        &mut self,
        w: &mut Writer<'_>,
        dt: Duration,
    ) -> Result<Vec<CaptureEvent>, StateError> {
        let gain = self.capture_rate_per_sec * dt.as_secs_f32();
        let mut events = Vec::new();

        let ids: Vec<ObjectiveId> = self.points.keys().copied().collect();
        for id in ids {
            let Some(mut point) = self.points.get(&id).cloned() else {
                continue;
            };
            let Some(team) = point.sole_team() else {
                continue;
            };
            if point.owner == Some(team) {
                if point.capturing.is_some() || point.progress > 0.0 {
                    point.capturing = None;
                    point.progress = 0.0;
                    self.points.set(w, id, point)?;
                }
                continue;
            }
            if point.capturing != Some(team) {
                point.capturing = Some(team);
                point.progress = 0.0;
            }
            point.progress += gain;
            if point.progress >= 1.0 {
                events.push(CaptureEvent {
                    objective: id,
                    team,
                    previous: point.owner,
                });
                tracing::info!(objective = %id, %team, "objective captured");
                point.owner = Some(team);
                point.capturing = None;
                point.progress = 0.0;
            }
            self.points.set(w, id, point)?;
        }
        Ok(events)
    }

    pub fn get_point(&self, id: ObjectiveId) -> Option<&CapturePoint> {
        self.points.get(&id)
    }

    pub fn owner_of(&self, id: ObjectiveId) -> Option<TeamId> {
        self.points.get(&id).and_then(|p| p.owner)
    }

    pub fn replica(&self) -> &dyn Replica {
        &self.points
    }

    pub fn replica_mut(&mut self) -> &mut dyn Replica {
        &mut self.points
    }

    fn modify_presence(
        &mut self,
        w: &mut Writer<'_>,
        id: ObjectiveId,
        f: impl FnOnce(&mut BTreeMap<TeamId, u32>),
    ) -> Result<(), StateError> {
        let updated = self.points.update(w, &id, |p| {
            f(&mut p.presence);
            p.contested = p.presence.len() > 1;
        })?;
        if updated {
            Ok(())
        } else {
            Err(StateError::UnknownObjective(id))
        }
    }
}
