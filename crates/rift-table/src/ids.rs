//! Replicated id allocation.
//!
//! The last id issued in each space is itself a replicated row, written
//! before the record that uses the id. Every mirror therefore knows the
//! high-water mark even for ids whose records were removed, and a node
//! promoted to authority continues the sequence without reissuing one.

use rift_protocol::{Broadcast, EntityId, MatchId, ModuleId, ObjectiveId, RoomId, TableSnapshot};
use serde::{Deserialize, Serialize};

use crate::{ApplyOutcome, Replica, ReplicatedTable, TableError, Writer};

/// Independent id sequences.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IdSpace {
    /// Projectiles, skill instances and VFX share one space so an entity
    /// id never names two things.
    Entity,
    Objective,
    Room,
    Match,
}

/// Hands out ids on the authority and mirrors the counters on replicas.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    issued: ReplicatedTable<IdSpace, u64>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            issued: ReplicatedTable::new(ModuleId::Ids),
        }
    }

    /// Issues the next id in `space`. Ids start at 1.
    pub fn next(&mut self, w: &mut Writer<'_>, space: IdSpace) -> Result<u64, TableError> {
        let id = self.last_issued(space).saturating_add(1);
        self.issued.set(w, space, id)?;
        Ok(id)
    }

    /// Next id for a projectile, skill instance or VFX.
    pub fn next_entity(&mut self, w: &mut Writer<'_>) -> Result<EntityId, TableError> {
        self.next(w, IdSpace::Entity).map(EntityId)
    }

    /// Clamps at `u32::MAX` rather than wrapping.
    pub fn next_objective(&mut self, w: &mut Writer<'_>) -> Result<ObjectiveId, TableError> {
        let raw = self.next(w, IdSpace::Objective)?;
        Ok(ObjectiveId(u32::try_from(raw).unwrap_or(u32::MAX)))
    }

    pub fn next_room(&mut self, w: &mut Writer<'_>) -> Result<RoomId, TableError> {
        self.next(w, IdSpace::Room).map(RoomId)
    }

    pub fn next_match(&mut self, w: &mut Writer<'_>) -> Result<MatchId, TableError> {
        self.next(w, IdSpace::Match).map(MatchId)
    }

    /// Highest id issued in `space` so far, or 0 if none.
    pub fn last_issued(&self, space: IdSpace) -> u64 {
        self.issued.get(&space).copied().unwrap_or(0)
    }
}

impl Replica for IdAllocator {
    fn module(&self) -> ModuleId {
        ModuleId::Ids
    }

    fn apply_broadcast(&mut self, broadcast: &Broadcast) -> Result<ApplyOutcome, TableError> {
        self.issued.apply(broadcast)
    }

    fn snapshot(&self) -> Result<TableSnapshot, TableError> {
        self.issued.snapshot()
    }

    fn restore(&mut self, snapshot: &TableSnapshot) -> Result<(), TableError> {
        self.issued.restore(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outbox;
    use std::time::Duration;

    #[test]
    fn test_next_spaces_are_independent() {
        let mut ids = IdAllocator::new();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);

        assert_eq!(ids.next_entity(&mut w).unwrap(), EntityId(1));
        assert_eq!(ids.next_entity(&mut w).unwrap(), EntityId(2));
        assert_eq!(ids.next_room(&mut w).unwrap(), RoomId(1));
        assert_eq!(ids.last_issued(IdSpace::Match), 0);
    }

    #[test]
    fn test_mirror_continues_after_promotion() {
        let mut authority = IdAllocator::new();
        let mut replica = IdAllocator::new();
        let mut outbox = Outbox::new();
        {
            let mut w = Writer::authority(&mut outbox, Duration::ZERO);
            for _ in 0..3 {
                authority.next_entity(&mut w).unwrap();
            }
        }
        for b in outbox.drain() {
            replica.apply_broadcast(&b).unwrap();
        }

        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        assert_eq!(replica.next_entity(&mut w).unwrap(), EntityId(4));
    }

    #[test]
    fn test_restore_carries_high_water_mark() {
        let mut authority = IdAllocator::new();
        let mut late = IdAllocator::new();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        authority.next_match(&mut w).unwrap();
        authority.next_match(&mut w).unwrap();

        late.restore(&authority.snapshot().unwrap()).unwrap();

        assert_eq!(late.last_issued(IdSpace::Match), 2);
    }
}
