//! Projectiles in flight.
//!
//! A projectile is flagged inactive on impact, expiry, or when it bounces
//! past the limit, and its record is removed on the following tick. The
//! one-tick grace lets replicas see the final position before the
//! tombstone arrives.

use std::time::Duration;

use rift_protocol::{EntityId, ModuleId, PlayerId, Vec2};
use rift_table::{IdAllocator, Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::{StateConfig, StateError};

/// One projectile in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileRecord {
    pub owner: PlayerId,
    pub position: Vec2,
    /// Unit vector.
    pub direction: Vec2,
    pub speed: f32,
    /// Never decreases while the projectile is active.
    pub bounce_count: u32,
    pub active: bool,
    pub spawned_at: Duration,
}

/// Projectiles, moved and expired by the authority tick.
pub struct ProjectileModule {
    projectiles: ReplicatedTable<EntityId, ProjectileRecord>,
    lifetime: Duration,
    max_bounces: u32,
}

impl ProjectileModule {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            projectiles: ReplicatedTable::new(ModuleId::Projectiles),
            lifetime: config.projectile_lifetime,
            max_bounces: config.max_bounces,
        }
    }

    /// Fires a projectile and returns its id.
    pub fn spawn(
        &mut self,
        w: &mut Writer<'_>,
        ids: &mut IdAllocator,
        owner: PlayerId,
        position: Vec2,
        direction: Vec2,
        speed: f32,
    ) -> Result<EntityId, StateError> {
        let id = ids.next_entity(w)?;
        self.projectiles.set(
            w,
            id,
            ProjectileRecord {
                owner,
                position,
                direction: direction.normalized(),
                speed,
                bounce_count: 0,
                active: true,
                spawned_at: w.now(),
            },
        )?;
        tracing::trace!(%id, %owner, "projectile spawned");
        Ok(id)
    }

    /// Records a new position after the physics layer moved or bounced
    /// the projectile.
    ///
    /// Going past `max_bounces` deactivates it.
    pub fn update_position(
        &mut self,
        w: &mut Writer<'_>,
        id: EntityId,
        position: Vec2,
        bounce_count: u32,
    ) -> Result<(), StateError> {
        let current = self
            .projectiles
            .get(&id)
            .ok_or(StateError::UnknownProjectile(id))?;
        if !current.active {
            return Err(StateError::ProjectileInactive(id));
        }
        if bounce_count < current.bounce_count {
            return Err(StateError::BounceRegression {
                id,
                current: current.bounce_count,
                got: bounce_count,
            });
        }

        let max_bounces = self.max_bounces;
        self.projectiles.update(w, &id, |p| {
            p.position = position;
            p.bounce_count = bounce_count;
            if bounce_count > max_bounces {
                p.active = false;
            }
        })?;
        Ok(())
    }

    /// Flags a projectile inactive. Returns `false` if it already was.
    pub fn deactivate(&mut self, w: &mut Writer<'_>, id: EntityId) -> Result<bool, StateError> {
        let current = self
            .projectiles
            .get(&id)
            .ok_or(StateError::UnknownProjectile(id))?;
        if !current.active {
            return Ok(false);
        }
        self.projectiles.update(w, &id, |p| p.active = false)?;
        Ok(true)
    }

    /// Removes every projectile owned by `owner`.
    pub fn remove_owned_by(
        &mut self,
        w: &mut Writer<'_>,
        owner: PlayerId,
    ) -> Result<usize, StateError> {
        Ok(self.projectiles.remove_where(w, |_, p| p.owner == owner)?.len())
    }

    /// Advances the simulation by `dt`.
    ///
    /// Removes projectiles that were already inactive, expires the ones
    /// past their lifetime, and moves the rest along their direction.
    /// Returns the ids removed this tick.
    pub fn tick(&mut self, w: &mut Writer<'_>, dt: Duration) -> Result<Vec<EntityId>, StateError> {
        let removed: Vec<EntityId> = self
            .projectiles
            .remove_where(w, |_, p| !p.active)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let now = w.now();
        let ids: Vec<EntityId> = self.projectiles.keys().copied().collect();
        for id in ids {
            let Some(p) = self.projectiles.get(&id) else {
                continue;
            };
            let expired = now.saturating_sub(p.spawned_at) >= self.lifetime;
            let step = p.direction.scale(p.speed * dt.as_secs_f32());
            self.projectiles.update(w, &id, |p| {
                if expired {
                    p.active = false;
                } else {
                    p.position = p.position.add(step);
                }
            })?;
        }
        Ok(removed)
    }

    pub fn get(&self, id: EntityId) -> Option<&ProjectileRecord> {
        self.projectiles.get(&id)
    }

    /// Projectiles still flying. Inactive ones await removal on the
    /// next tick.
    pub fn active_count(&self) -> usize {
        self.projectiles.values().filter(|p| p.active).count()
    }

    pub fn replica(&self) -> &dyn Replica {
        &self.projectiles
    }

    pub fn replica_mut(&mut self) -> &mut dyn Replica {
        &mut self.projectiles
    }
}
