//! Skill cooldowns, energy, and live skill instances.
//!
//! A successful cast is two record writes in the same command: the
//! caster's [`SkillState`] (cooldown started, energy spent) and a new
//! [`ActiveSkillInstance`]. A failed cast writes nothing.

use std::time::Duration;

use rift_protocol::{EntityId, ModuleId, PlayerId, Vec2};
use rift_table::{IdAllocator, Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::{StateConfig, StateError};

/// One slot of a player's loadout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSlot {
    pub cooldown_remaining: Duration,
    pub enabled: bool,
    pub level: u8,
}

/// Per-player skill state. One record, so cooldown and energy always
/// change together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillState {
    pub slots: Vec<SkillSlot>,
    pub energy: f32,
    pub last_cast: Option<Duration>,
}

/// A skill effect in the world, alive for the skill's duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSkillInstance {
    pub caster: PlayerId,
    pub slot: usize,
    pub position: Vec2,
    pub direction: Vec2,
    pub started_at: Duration,
    pub duration: Duration,
    pub active: bool,
}

/// Per-player skill slots and the live instances they cast.
pub struct SkillModule {
    states: ReplicatedTable<PlayerId, SkillState>,
    instances: ReplicatedTable<EntityId, ActiveSkillInstance>,
    config: StateConfig,
}

impl SkillModule {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            states: ReplicatedTable::new(ModuleId::Skills),
            instances: ReplicatedTable::new(ModuleId::ActiveSkills),
            config: config.clone(),
        }
    }

    /// Gives a player a fresh loadout with full energy.
    ///
    /// Slots with a skill definition start enabled.
    pub fn init_player(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
    ) -> Result<(), StateError> {
        let slots = (0..self.config.skill_slots)
            .map(|slot| SkillSlot {
                cooldown_remaining: Duration::ZERO,
                enabled: self.config.skill(slot).is_some(),
                level: 1,
            })
            .collect();
        self.states.set(
            w,
            player,
            SkillState {
                slots,
                energy: self.config.max_energy,
                last_cast: None,
            },
        )?;
        Ok(())
    }

    /// Casts the skill in `slot` and returns the spawned instance id.
    ///
    /// # Errors
    /// Fails without touching state if the slot has no skill, is
    /// disabled, is cooling down, or the caster lacks energy.
    pub fn cast_skill(
        &mut self,
        w: &mut Writer<'_>,
        ids: &mut IdAllocator,
        caster: PlayerId,
        slot: usize,
        position: Vec2,
        direction: Vec2,
    ) -> Result<EntityId, StateError> {
        let state = self
            .states
            .get(&caster)
            .ok_or(StateError::UnknownPlayer(caster))?;
        let (Some(def), Some(current)) = (self.config.skill(slot), state.slots.get(slot)) else {
            return Err(StateError::UnknownSkillSlot {
                player: caster,
                slot,
            });
        };
        if !current.enabled {
            return Err(StateError::SkillDisabled {
                player: caster,
                slot,
            });
        }
        if !current.cooldown_remaining.is_zero() {
            return Err(StateError::OnCooldown {
                player: caster,
                slot,
                remaining: current.cooldown_remaining,
            });
        }
        if state.energy < def.energy_cost {
            return Err(StateError::InsufficientEnergy {
                player: caster,
                needed: def.energy_cost,
                available: state.energy,
            });
        }

        let now = w.now();
        let mut next = state.clone();
        next.energy -= def.energy_cost;
        next.last_cast = Some(now);
        next.slots[slot].cooldown_remaining = def.cooldown;
        let instance = ActiveSkillInstance {
            caster,
            slot,
            position,
            direction: direction.normalized(),
            started_at: now,
            duration: def.duration,
            active: true,
        };

        let id = ids.next_entity(w)?;
        self.states.set(w, caster, next)?;
        self.instances.set(w, id, instance)?;
        tracing::debug!(%caster, slot, %id, "skill cast");
        Ok(id)
    }

    /// Ends a live skill early. Returns `false` if it was already gone.
    pub fn cancel_skill(&mut self, w: &mut Writer<'_>, id: EntityId) -> Result<bool, StateError> {
        Ok(self.instances.remove(w, &id)?.is_some())
    }

    /// Enables or disables one slot. Disabled slots cannot be cast.
    pub fn set_enabled(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        slot: usize,
        enabled: bool,
    ) -> Result<(), StateError> {
        self.modify_slot(w, player, slot, |s| s.enabled = enabled)
    }

    pub fn set_level(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        slot: usize,
        level: u8,
    ) -> Result<(), StateError> {
        self.modify_slot(w, player, slot, |s| s.level = level)
    }

    /// Drops a player's loadout and every instance they cast.
    pub fn remove_player(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
    ) -> Result<(), StateError> {
        self.instances.remove_where(w, |_, i| i.caster == player)?;
        self.states.remove(w, &player)?;
        Ok(())
    }

    /// Decays cooldowns, regenerates energy, and expires finished
    /// instances. Returns the ids of instances that ended.
    pub fn tick(&mut self, w: &mut Writer<'_>, dt: Duration) -> Result<Vec<EntityId>, StateError> {
        let regen = self.config.energy_regen_per_sec * dt.as_secs_f32();
        let max_energy = self.config.max_energy;

        let players: Vec<PlayerId> = self.states.keys().copied().collect();
        for player in players {
            let Some(mut state) = self.states.get(&player).cloned() else {
                continue;
            };
            for slot in &mut state.slots {
                slot.cooldown_remaining = slot.cooldown_remaining.saturating_sub(dt);
            }
            state.energy = (state.energy + regen).min(max_energy);
            self.states.set_if_changed(w, player, state)?;
        }

        let now = w.now();
        let finished = self
            .instances
            .remove_where(w, |_, i| now.saturating_sub(i.started_at) >= i.duration)?;
        Ok(finished.into_iter().map(|(id, _)| id).collect())
    }

    pub fn get_state(&self, player: PlayerId) -> Option<&SkillState> {
        self.states.get(&player)
    }

    pub fn get_instance(&self, id: EntityId) -> Option<&ActiveSkillInstance> {
        self.instances.get(&id)
    }

    /// Time until `slot` is castable again, or `None` for an unknown slot.
    pub fn cooldown_remaining(&self, player: PlayerId, slot: usize) -> Option<Duration> {
        self.states
            .get(&player)
            .and_then(|s| s.slots.get(slot))
            .map(|s| s.cooldown_remaining)
    }

    pub fn replicas(&self) -> [&dyn Replica; 2] {
        [&self.states, &self.instances]
    }

    pub fn replicas_mut(&mut self) -> [&mut dyn Replica; 2] {
        [&mut self.states, &mut self.instances]
    }

    fn modify_slot(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        slot: usize,
        f: impl FnOnce(&mut SkillSlot),
    ) -> Result<(), StateError> {
        let mut state = self
            .states
            .get(&player)
            .cloned()
            .ok_or(StateError::UnknownPlayer(player))?;
        let target = state
            .slots
            .get_mut(slot)
            .ok_or(StateError::UnknownSkillSlot { player, slot })?;
        f(target);
        self.states.set(w, player, state)?;
        Ok(())
    }
}
