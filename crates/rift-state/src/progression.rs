//! Persistent unlocks, loadout, level, and currency.
//!
//! The record is also the save format: [`ProgressionModule::save`] and
//! [`ProgressionModule::load`] move it to and from JSON. Every write,
//! including a load, checks that each equipped item is unlocked and
//! bumps `version`.

use std::collections::{BTreeMap, BTreeSet};

use rift_protocol::{ItemId, ModuleId, PlayerId};
use rift_table::{Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::StateError;

/// Unlocks, loadout and currency. Outlives the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionRecord {
    pub unlocked: BTreeSet<ItemId>,
    /// Equip slot → item. Every value must be in `unlocked`.
    pub equipped: BTreeMap<u8, ItemId>,
    pub level: u32,
    pub currency: u64,
    /// Bumped on every accepted write.
    pub version: u64,
}

impl ProgressionRecord {
    fn validate(&self) -> Result<(), StateError> {
        match self.equipped.values().find(|item| !self.unlocked.contains(*item)) {
            Some(item) => Err(StateError::NotUnlocked(*item)),
            None => Ok(()),
        }
    }
}

pub struct ProgressionModule {
    records: ReplicatedTable<PlayerId, ProgressionRecord>,
}

impl ProgressionModule {
    pub fn new() -> Self {
        Self {
            records: ReplicatedTable::new(ModuleId::Progression),
        }
    }

    /// Starts an empty record for a new player. Keeps an existing one.
    pub fn create(&mut self, w: &mut Writer<'_>, player: PlayerId) -> Result<(), StateError> {
        if !self.records.contains_key(&player) {
            self.commit(w, player, ProgressionRecord::default())?;
        }
        Ok(())
    }

    /// Replaces a player's record with persisted save data.
    pub fn load(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        save: &str,
    ) -> Result<(), StateError> {
        let record: ProgressionRecord =
            serde_json::from_str(save).map_err(StateError::CorruptSave)?;
        self.commit(w, player, record)
    }

    /// Serializes a player's record for persistence.
    pub fn save(&self, player: PlayerId) -> Result<String, StateError> {
        let record = self
            .records
            .get(&player)
            .ok_or(StateError::UnknownPlayer(player))?;
        serde_json::to_string(record).map_err(StateError::CorruptSave)
    }

    /// Spends `cost` currency to unlock `item`.
    pub fn unlock(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        item: ItemId,
        cost: u64,
    ) -> Result<(), StateError> {
        let mut record = self.current(player)?;
        if record.unlocked.contains(&item) {
            return Err(StateError::AlreadyUnlocked(item));
        }
        if record.currency < cost {
            return Err(StateError::InsufficientCurrency {
                needed: cost,
                available: record.currency,
            });
        }
        record.currency -= cost;
        record.unlocked.insert(item);
        self.commit(w, player, record)
    }

    /// Puts an unlocked item in `slot`.
    pub fn equip(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        slot: u8,
        item: ItemId,
    ) -> Result<(), StateError> {
        let mut record = self.current(player)?;
        record.equipped.insert(slot, item);
        self.commit(w, player, record)
    }

    /// Empties `slot`. Emptying an empty slot writes nothing.
    pub fn unequip(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        slot: u8,
    ) -> Result<(), StateError> {
        let mut record = self.current(player)?;
        if record.equipped.remove(&slot).is_none() {
            return Ok(());
        }
        self.commit(w, player, record)
    }

    /// Adds currency, saturating at the maximum.
    pub fn grant_currency(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        amount: u64,
    ) -> Result<(), StateError> {
        let mut record = self.current(player)?;
        record.currency = record.currency.saturating_add(amount);
        self.commit(w, player, record)
    }

    pub fn set_level(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        level: u32,
    ) -> Result<(), StateError> {
        let mut record = self.current(player)?;
        record.level = level;
        self.commit(w, player, record)
    }

    pub fn get(&self, player: PlayerId) -> Option<&ProgressionRecord> {
        self.records.get(&player)
    }

    pub fn replica(&self) -> &dyn Replica {
        &self.records
    }

    pub fn replica_mut(&mut self) -> &mut dyn Replica {
        &mut self.records
    }

    fn current(&self, player: PlayerId) -> Result<ProgressionRecord, StateError> {
        self.records
            .get(&player)
            .cloned()
            .ok_or(StateError::UnknownPlayer(player))
    }

    /// The single write path: validate, bump the version, store.
    fn commit(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        mut record: ProgressionRecord,
    ) -> Result<(), StateError> {
        record.validate()?;
        let stored = self.records.get(&player).map_or(0, |r| r.version);
        record.version = record.version.max(stored) + 1;
        self.records.set(w, player, record)?;
        Ok(())
    }
}

impl Default for ProgressionModule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_table::Outbox;
    use std::time::Duration;

    const P: PlayerId = PlayerId(1);

    fn with_player(outbox: &mut Outbox) -> ProgressionModule {
        let mut progression = ProgressionModule::new();
        let mut w = Writer::authority(outbox, Duration::ZERO);
        progression.create(&mut w, P).unwrap();
        progression
    }

    #[test]
    fn test_unlock_spends_currency_and_bumps_version() {
        let mut outbox = Outbox::new();
        let mut progression = with_player(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        progression.grant_currency(&mut w, P, 100).unwrap();

        progression.unlock(&mut w, P, ItemId(7), 60).unwrap();

        let record = progression.get(P).unwrap();
        assert_eq!(record.currency, 40);
        assert!(record.unlocked.contains(&ItemId(7)));
        assert_eq!(record.version, 3);
    }

    #[test]
    fn test_unlock_without_currency_fails() {
        let mut outbox = Outbox::new();
        let mut progression = with_player(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);

        let result = progression.unlock(&mut w, P, ItemId(7), 1);

        assert!(matches!(result, Err(StateError::InsufficientCurrency { .. })));
    }

    #[test]
    fn test_equip_locked_item_is_rejected() {
        let mut outbox = Outbox::new();
        let mut progression = with_player(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);

        let result = progression.equip(&mut w, P, 0, ItemId(3));

        assert!(matches!(result, Err(StateError::NotUnlocked(ItemId(3)))));
        assert!(progression.get(P).unwrap().equipped.is_empty());
    }

    #[test]
    fn test_load_rejects_equipped_item_not_unlocked() {
        let mut outbox = Outbox::new();
        let mut progression = with_player(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        let save = r#"{"unlocked":[1],"equipped":{"0":2},"level":4,"currency":0,"version":9}"#;

        let result = progression.load(&mut w, P, save);

        assert!(matches!(result, Err(StateError::NotUnlocked(ItemId(2)))));
        assert_eq!(progression.get(P).unwrap().level, 0);
    }

    #[test]
    fn test_save_then_load_keeps_version_increasing() {
        let mut outbox = Outbox::new();
        let mut progression = with_player(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        progression.set_level(&mut w, P, 12).unwrap();
        let saved = progression.save(P).unwrap();
        let version = progression.get(P).unwrap().version;

        progression.load(&mut w, P, &saved).unwrap();

        let record = progression.get(P).unwrap();
        assert_eq!(record.level, 12);
        assert!(record.version > version);
    }

    #[test]
    fn test_load_garbage_is_corrupt_save() {
        let mut outbox = Outbox::new();
        let mut progression = with_player(&mut outbox);
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);

        let result = progression.load(&mut w, P, "{not json");

        assert!(matches!(result, Err(StateError::CorruptSave(_))));
    }
}
