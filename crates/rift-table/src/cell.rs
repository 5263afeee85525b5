//! A replicated single value.

use rift_protocol::{Broadcast, ModuleId, TableSnapshot};
use serde::{Serialize, de::DeserializeOwned};

use crate::{ApplyOutcome, Replica, ReplicatedTable, TableError, Writer};

/// One authority-owned value, mirrored on every replica.
///
/// A table keyed by `()`, so it gets the same sequencing, tombstones and
/// snapshot handling as every other table for free.
#[derive(Debug, Clone)]
pub struct ReplicatedCell<V> {
    inner: ReplicatedTable<(), V>,
}

impl<V> ReplicatedCell<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn new(module: ModuleId) -> Self {
        Self {
            inner: ReplicatedTable::new(module),
        }
    }

    pub fn get(&self) -> Option<&V> {
        self.inner.get(&())
    }

    /// Replaces the value, broadcasting the write.
    pub fn set(&mut self, w: &mut Writer<'_>, value: V) -> Result<(), TableError> {
        self.inner.set(w, (), value)
    }

    /// Empties the cell. Returns the old value.
    pub fn clear(&mut self, w: &mut Writer<'_>) -> Result<Option<V>, TableError> {
        self.inner.remove(w, &())
    }

    pub fn is_set(&self) -> bool {
        self.inner.contains_key(&())
    }
}

impl<V> Replica for ReplicatedCell<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    fn module(&self) -> ModuleId {
        self.inner.module()
    }

    fn apply_broadcast(&mut self, broadcast: &Broadcast) -> Result<ApplyOutcome, TableError> {
        self.inner.apply(broadcast)
    }

    fn snapshot(&self) -> Result<TableSnapshot, TableError> {
        self.inner.snapshot()
    }

    fn restore(&mut self, snapshot: &TableSnapshot) -> Result<(), TableError> {
        self.inner.restore(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outbox;
    use std::time::Duration;

    #[test]
    fn test_cell_set_and_mirror() {
        let mut authority: ReplicatedCell<u32> = ReplicatedCell::new(ModuleId::Session);
        let mut replica: ReplicatedCell<u32> = ReplicatedCell::new(ModuleId::Session);
        let mut outbox = Outbox::new();

        {
            let mut w = Writer::authority(&mut outbox, Duration::ZERO);
            authority.set(&mut w, 7).unwrap();
            authority.set(&mut w, 8).unwrap();
        }
        for b in outbox.drain() {
            replica.apply_broadcast(&b).unwrap();
        }

        assert_eq!(replica.get(), Some(&8));
    }

    #[test]
    fn test_cell_clear_unsets_value() {
        let mut cell: ReplicatedCell<u32> = ReplicatedCell::new(ModuleId::VoteWindow);
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);

        cell.set(&mut w, 1).unwrap();
        assert_eq!(cell.clear(&mut w).unwrap(), Some(1));

        assert!(!cell.is_set());
    }
}
