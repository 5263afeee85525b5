//! Status effects on participants and transient world VFX.

use std::collections::BTreeMap;
use std::time::Duration;

use rift_protocol::{EntityId, ModuleId, PlayerId, Vec2};
use rift_table::{IdAllocator, Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::StateError;

/// The status effects a participant can carry, one slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    Slow,
    Haste,
    Stun,
    Shield,
    Burn,
    Invisible,
}

/// One status effect with its time left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub remaining: Duration,
    pub strength: f32,
}

/// All effects on one participant. Absent from the table when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerEffects {
    pub effects: BTreeMap<EffectKind, ActiveEffect>,
}

/// A visual effect placed in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VfxRecord {
    pub kind: String,
    pub position: Vec2,
    pub started_at: Duration,
    pub duration: Duration,
    /// Looping VFX live until stopped.
    pub looping: bool,
}

/// Status effects per participant plus world VFX.
pub struct EffectModule {
    effects: ReplicatedTable<PlayerId, PlayerEffects>,
    vfx: ReplicatedTable<EntityId, VfxRecord>,
}

impl EffectModule {
    pub fn new() -> Self {
        Self {
            effects: ReplicatedTable::new(ModuleId::Effects),
            vfx: ReplicatedTable::new(ModuleId::Vfx),
        }
    }

    /// Puts `kind` on a participant, replacing any running instance of it.
    pub fn apply_player_effect(
        &mut self,
        w: &mut Writer<'_>,
        participant: PlayerId,
        kind: EffectKind,
        duration: Duration,
        strength: f32,
    ) -> Result<(), StateError> {
        if duration.is_zero() {
            return Ok(());
        }
        let mut record = self.effects.get(&participant).cloned().unwrap_or_default();
        record.effects.insert(
            kind,
            ActiveEffect {
                remaining: duration,
                strength,
            },
        );
        self.effects.set(w, participant, record)?;
        Ok(())
    }

    /// Removes one effect. Returns `false` if it wasn't active.
    pub fn clear_effect(
        &mut self,
        w: &mut Writer<'_>,
        participant: PlayerId,
        kind: EffectKind,
    ) -> Result<bool, StateError> {
        let Some(mut record) = self.effects.get(&participant).cloned() else {
            return Ok(false);
        };
        if record.effects.remove(&kind).is_none() {
            return Ok(false);
        }
        self.write_or_remove(w, participant, record)?;
        Ok(true)
    }

    /// Drops every effect on `participant`.
    pub fn clear_player(
        &mut self,
        w: &mut Writer<'_>,
        participant: PlayerId,
    ) -> Result<(), StateError> {
        self.effects.remove(w, &participant)?;
        Ok(())
    }

    /// Places a visual effect and returns its id.
    pub fn spawn_vfx(
        &mut self,
        w: &mut Writer<'_>,
        ids: &mut IdAllocator,
        kind: impl Into<String>,
        position: Vec2,
        duration: Duration,
        looping: bool,
    ) -> Result<EntityId, StateError> {
        let id = ids.next_entity(w)?;
        self.vfx.set(
            w,
            id,
            VfxRecord {
                kind: kind.into(),
                position,
                started_at: w.now(),
                duration,
                looping,
            },
        )?;
        Ok(id)
    }

    /// Removes a VFX early. Returns `false` if it was already gone.
    pub fn stop_vfx(&mut self, w: &mut Writer<'_>, id: EntityId) -> Result<bool, StateError> {
        Ok(self.vfx.remove(w, &id)?.is_some())
    }

    /// Counts effect timers down by `dt`, dropping the ones that hit zero,
    /// and removes non-looping VFX whose duration has passed.
    pub fn tick(&mut self, w: &mut Writer<'_>, dt: Duration) -> Result<(), StateError> {
        let participants: Vec<PlayerId> = self.effects.keys().copied().collect();
        for participant in participants {
            let Some(mut record) = self.effects.get(&participant).cloned() else {
                continue;
            };
            record.effects.retain(|_, e| {
                e.remaining = e.remaining.saturating_sub(dt);
                !e.remaining.is_zero()
            });
            self.write_or_remove(w, participant, record)?;
        }

        let now = w.now();
        self.vfx
            .remove_where(w, |_, v| !v.looping && now.saturating_sub(v.started_at) >= v.duration)?;
        Ok(())
    }

    pub fn has_effect(&self, participant: PlayerId, kind: EffectKind) -> bool {
        self.effects
            .get(&participant)
            .is_some_and(|r| r.effects.contains_key(&kind))
    }

    /// Strength of `kind` on `participant`, if active.
    pub fn effect_strength(&self, participant: PlayerId, kind: EffectKind) -> Option<f32> {
        self.effects
            .get(&participant)
            .and_then(|r| r.effects.get(&kind))
            .map(|e| e.strength)
    }

    pub fn get_effects(&self, participant: PlayerId) -> Option<&PlayerEffects> {
        self.effects.get(&participant)
    }

    pub fn get_vfx(&self, id: EntityId) -> Option<&VfxRecord> {
        self.vfx.get(&id)
    }

    pub fn replicas(&self) -> [&dyn Replica; 2] {
        [&self.effects, &self.vfx]
    }

    pub fn replicas_mut(&mut self) -> [&mut dyn Replica; 2] {
        [&mut self.effects, &mut self.vfx]
    }

    fn write_or_remove(
        &mut self,
        w: &mut Writer<'_>,
        participant: PlayerId,
        record: PlayerEffects,
    ) -> Result<(), StateError> {
        if record.effects.is_empty() {
            self.effects.remove(w, &participant)?;
        } else {
            self.effects.set_if_changed(w, participant, record)?;
        }
        Ok(())
    }
}

impl Default for EffectModule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_table::Outbox;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    #[test]
    fn test_apply_player_effect_then_tick_clears_at_zero() {
        let mut effects = EffectModule::new();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        effects
            .apply_player_effect(&mut w, pid(1), EffectKind::Slow, Duration::from_secs(2), 0.5)
            .unwrap();

        effects.tick(&mut w, Duration::from_secs(1)).unwrap();
        assert_eq!(effects.effect_strength(pid(1), EffectKind::Slow), Some(0.5));

        effects.tick(&mut w, Duration::from_secs(1)).unwrap();
        assert!(!effects.has_effect(pid(1), EffectKind::Slow));
        assert!(effects.get_effects(pid(1)).is_none());
    }

    #[test]
    fn test_apply_player_effect_slots_are_independent() {
        let mut effects = EffectModule::new();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        effects
            .apply_player_effect(&mut w, pid(1), EffectKind::Burn, Duration::from_secs(1), 3.0)
            .unwrap();
        effects
            .apply_player_effect(&mut w, pid(1), EffectKind::Shield, Duration::from_secs(5), 1.0)
            .unwrap();

        effects.tick(&mut w, Duration::from_secs(1)).unwrap();

        assert!(!effects.has_effect(pid(1), EffectKind::Burn));
        assert!(effects.has_effect(pid(1), EffectKind::Shield));
    }

    #[test]
    fn test_clear_effect_inactive_returns_false() {
        let mut effects = EffectModule::new();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);

        assert!(!effects.clear_effect(&mut w, pid(1), EffectKind::Stun).unwrap());
    }

    #[test]
    fn test_vfx_expires_unless_looping() {
        let mut effects = EffectModule::new();
        let mut ids = IdAllocator::new();
        let mut outbox = Outbox::new();
        let (once, looped) = {
            let mut w = Writer::authority(&mut outbox, Duration::ZERO);
            let second = Duration::from_secs(1);
            (
                effects
                    .spawn_vfx(&mut w, &mut ids, "spark", Vec2::ZERO, second, false)
                    .unwrap(),
                effects
                    .spawn_vfx(&mut w, &mut ids, "aura", Vec2::ZERO, second, true)
                    .unwrap(),
            )
        };

        let mut w = Writer::authority(&mut outbox, Duration::from_secs(1));
        effects.tick(&mut w, Duration::from_secs(1)).unwrap();

        assert!(effects.get_vfx(once).is_none());
        assert!(effects.get_vfx(looped).is_some());
        assert!(effects.stop_vfx(&mut w, looped).unwrap());
    }
}
