//! The replicated key/value table every domain module is built on.

use std::collections::BTreeMap;

use rift_protocol::{Broadcast, ModuleId, SnapshotEntry, TableSnapshot};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{TableError, Writer};

/// Result of applying one incoming broadcast on a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The mutation was new and is now reflected in the table.
    Applied,
    /// Already applied, or older than what the table holds for that key.
    Stale,
}

/// Object-safe view of a table, used to route broadcasts and snapshots
/// by [`ModuleId`] without knowing the key/value types.
pub trait Replica {
    fn module(&self) -> ModuleId;

    /// Applies an incoming broadcast to the local mirror.
    fn apply_broadcast(&mut self, broadcast: &Broadcast) -> Result<ApplyOutcome, TableError>;

    /// Captures every live row for a full-state resync.
    fn snapshot(&self) -> Result<TableSnapshot, TableError>;

    /// Replaces the local mirror with a snapshot.
    fn restore(&mut self, snapshot: &TableSnapshot) -> Result<(), TableError>;
}

/// An authority-owned map from `K` to `V`, mirrored on every replica.
///
/// ## Writes (authority)
///
/// [`set`](Self::set) and [`remove`](Self::remove) change the local map
/// immediately, so authority-side logic sees its own writes, and queue
/// exactly one [`Broadcast`] on the [`Writer`]. There is no second
/// "apply the same mutation again when the broadcast loops back" path.
///
/// ## Reads and mirroring (replicas)
///
/// [`apply`](Self::apply) performs the identical mutation from a
/// broadcast. Every write carries a table-wide sequence number; a
/// replica remembers the last seq per key (tombstones included) and
/// drops anything not newer. Applying the same broadcast twice is a
/// no-op, and last-write-wins per key holds even if a duplicate of an
/// older write shows up late.
///
/// Fields that must change together belong in one record: separate
/// keys give no cross-key ordering guarantee.
#[derive(Debug, Clone)]
pub struct ReplicatedTable<K, V> {
    module: ModuleId,
    entries: BTreeMap<K, V>,
    /// Last seq applied per key, kept after removal so a late `set`
    /// can't resurrect a tombstoned key.
    versions: BTreeMap<K, u64>,
    /// Highest seq issued (authority) or seen (replica).
    last_seq: u64,
    /// Everything at or below this seq is covered by the last restore.
    floor: u64,
}

impl<K, V> ReplicatedTable<K, V>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            entries: BTreeMap::new(),
            versions: BTreeMap::new(),
            last_seq: 0,
            floor: 0,
        }
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    // -- Reads ------------------------------------------------------------

    /// Looks up a key. `None` means absent (never written or removed).
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates current entries in key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    /// Live keys in ascending order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest sequence number this table has issued or applied.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    // -- Writes (authority) -----------------------------------------------

    /// Sets `key = value` locally and queues the broadcast.
    pub fn set(&mut self, w: &mut Writer<'_>, key: K, value: V) -> Result<(), TableError> {
        let wire_key = self.encode(&key)?;
        let wire_value = self.encode(&value)?;
        let seq = self.next_seq();

        self.entries.insert(key.clone(), value);
        self.versions.insert(key, seq);
        w.emit(Broadcast {
            module: self.module,
            seq,
            key: wire_key,
            value: Some(wire_value),
        });
        Ok(())
    }

    /// Like [`set`](Self::set), but skips the write (and the broadcast)
    /// when the stored value is already equal. Returns whether it wrote.
    pub fn set_if_changed(
        &mut self,
        w: &mut Writer<'_>,
        key: K,
        value: V,
    ) -> Result<bool, TableError>
    where
        V: PartialEq,
    {
        if self.entries.get(&key) == Some(&value) {
            return Ok(false);
        }
        self.set(w, key, value)?;
        Ok(true)
    }

    /// Read-modify-write of one record as a single broadcast.
    ///
    /// Returns `false` without writing if the key is absent.
    pub fn update(
        &mut self,
        w: &mut Writer<'_>,
        key: &K,
        f: impl FnOnce(&mut V),
    ) -> Result<bool, TableError> {
        let Some(mut value) = self.entries.get(key).cloned() else {
            return Ok(false);
        };
        f(&mut value);
        self.set(w, key.clone(), value)?;
        Ok(true)
    }

    /// Removes `key` locally and queues a tombstone.
    ///
    /// Removing an absent key does nothing and broadcasts nothing.
    pub fn remove(&mut self, w: &mut Writer<'_>, key: &K) -> Result<Option<V>, TableError> {
        if !self.entries.contains_key(key) {
            return Ok(None);
        }
        let wire_key = self.encode(key)?;
        let seq = self.next_seq();

        let removed = self.entries.remove(key);
        self.versions.insert(key.clone(), seq);
        w.emit(Broadcast {
            module: self.module,
            seq,
            key: wire_key,
            value: None,
        });
        Ok(removed)
    }

    /// Removes every entry matching `pred`, in key order.
    pub fn remove_where(
        &mut self,
        w: &mut Writer<'_>,
        mut pred: impl FnMut(&K, &V) -> bool,
    ) -> Result<Vec<(K, V)>, TableError> {
        let doomed: Vec<K> = self
            .entries
            .iter()
            .filter(|(k, v)| pred(k, v))
            .map(|(k, _)| k.clone())
            .collect();

        let mut removed = Vec::with_capacity(doomed.len());
        for key in doomed {
            if let Some(value) = self.remove(w, &key)? {
                removed.push((key, value));
            }
        }
        Ok(removed)
    }

    // -- Mirroring (replica) ----------------------------------------------

    /// Applies an incoming broadcast.
    pub fn apply(&mut self, broadcast: &Broadcast) -> Result<ApplyOutcome, TableError> {
        if broadcast.module != self.module {
            return Err(TableError::WrongModule {
                expected: self.module,
                got: broadcast.module,
            });
        }
        let key: K = self.decode(&broadcast.key)?;

        let seen = self.versions.get(&key).copied().unwrap_or(0);
        if broadcast.seq <= self.floor || broadcast.seq <= seen {
            tracing::debug!(
                module = ?self.module,
                seq = broadcast.seq,
                seen,
                "stale broadcast ignored"
            );
            return Ok(ApplyOutcome::Stale);
        }

        match &broadcast.value {
            Some(raw) => {
                let value: V = self.decode(raw)?;
                self.entries.insert(key.clone(), value);
            }
            None => {
                self.entries.remove(&key);
            }
        }
        self.versions.insert(key, broadcast.seq);
        self.last_seq = self.last_seq.max(broadcast.seq);
        Ok(ApplyOutcome::Applied)
    }

    /// Captures every live row.
    pub fn snapshot(&self) -> Result<TableSnapshot, TableError> {
        let mut entries = Vec::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            entries.push(SnapshotEntry {
                key: self.encode(key)?,
                value: self.encode(value)?,
                seq: self.versions.get(key).copied().unwrap_or(self.last_seq),
            });
        }
        Ok(TableSnapshot {
            module: self.module,
            next_seq: self.last_seq,
            entries,
        })
    }

    /// Replaces the mirror with `snapshot`.
    ///
    /// Decodes everything first so a bad snapshot leaves the table as it was.
    pub fn restore(&mut self, snapshot: &TableSnapshot) -> Result<(), TableError> {
        if snapshot.module != self.module {
            return Err(TableError::WrongModule {
                expected: self.module,
                got: snapshot.module,
            });
        }
        let mut entries = BTreeMap::new();
        let mut versions = BTreeMap::new();
        for entry in &snapshot.entries {
            let key: K = self.decode(&entry.key)?;
            let value: V = self.decode(&entry.value)?;
            versions.insert(key.clone(), entry.seq);
            entries.insert(key, value);
        }
        self.entries = entries;
        self.versions = versions;
        self.last_seq = snapshot.next_seq;
        self.floor = snapshot.next_seq;
        Ok(())
    }

    // -- Internals --------------------------------------------------------

    fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Value, TableError> {
        serde_json::to_value(value).map_err(|source| TableError::Encode {
            module: self.module,
            source,
        })
    }

    fn decode<T: DeserializeOwned>(&self, raw: &Value) -> Result<T, TableError> {
        T::deserialize(raw).map_err(|source| TableError::Decode {
            module: self.module,
            source,
        })
    }
}

impl<K, V> PartialEq for ReplicatedTable<K, V>
where
    K: Ord,
    V: PartialEq,
{
    /// Two tables are equal when they hold the same entries; bookkeeping
    /// (versions, seq counters) is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.module == other.module && self.entries == other.entries
    }
}

impl<K, V> Replica for ReplicatedTable<K, V>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
{
    fn module(&self) -> ModuleId {
        self.module
    }

    fn apply_broadcast(&mut self, broadcast: &Broadcast) -> Result<ApplyOutcome, TableError> {
        self.apply(broadcast)
    }

    fn snapshot(&self) -> Result<TableSnapshot, TableError> {
        ReplicatedTable::snapshot(self)
    }

    fn restore(&mut self, snapshot: &TableSnapshot) -> Result<(), TableError> {
        ReplicatedTable::restore(self, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outbox;
    use std::time::Duration;

    type Table = ReplicatedTable<u64, String>;

    fn table() -> Table {
        ReplicatedTable::new(ModuleId::Players)
    }

    /// Runs `f` against `t` with a throwaway writer and returns the
    /// broadcasts it produced.
    fn write(t: &mut Table, f: impl FnOnce(&mut Table, &mut Writer<'_>)) -> Vec<Broadcast> {
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        f(t, &mut w);
        outbox.drain()
    }

    // =====================================================================
    // set / remove (authority)
    // =====================================================================

    #[test]
    fn test_set_is_visible_locally_and_broadcast() {
        let mut t = table();

        let out = write(&mut t, |t, w| t.set(w, 1, "a".into()).unwrap());

        assert_eq!(t.get(&1).map(String::as_str), Some("a"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].seq, 1);
        assert_eq!(out[0].value, Some(serde_json::json!("a")));
    }

    #[test]
    fn test_remove_emits_tombstone() {
        let mut t = table();
        write(&mut t, |t, w| t.set(w, 1, "a".into()).unwrap());

        let out = write(&mut t, |t, w| {
            assert_eq!(t.remove(w, &1).unwrap(), Some("a".into()));
        });

        assert!(t.get(&1).is_none());
        assert_eq!(out.len(), 1);
        assert!(out[0].is_tombstone());
    }

    #[test]
    fn test_remove_absent_key_broadcasts_nothing() {
        let mut t = table();

        let out = write(&mut t, |t, w| {
            assert_eq!(t.remove(w, &5).unwrap(), None);
        });

        assert!(out.is_empty());
    }

    #[test]
    fn test_set_if_changed_skips_equal_value() {
        let mut t = table();
        write(&mut t, |t, w| t.set(w, 1, "a".into()).unwrap());

        let out = write(&mut t, |t, w| {
            assert!(!t.set_if_changed(w, 1, "a".into()).unwrap());
            assert!(t.set_if_changed(w, 1, "b".into()).unwrap());
        });

        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_update_absent_key_returns_false() {
        let mut t = table();

        let out = write(&mut t, |t, w| {
            assert!(!t.update(w, &3, |v| v.push('x')).unwrap());
        });

        assert!(out.is_empty());
    }

    #[test]
    fn test_remove_where_removes_matching_in_key_order() {
        let mut t = table();
        write(&mut t, |t, w| {
            for k in 1..=4 {
                t.set(w, k, format!("v{k}")).unwrap();
            }
        });

        let mut removed = Vec::new();
        write(&mut t, |t, w| {
            removed = t.remove_where(w, |k, _| k % 2 == 0).unwrap();
        });

        assert_eq!(removed.iter().map(|(k, _)| *k).collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(t.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    // =====================================================================
    // apply (replica)
    // =====================================================================

    #[test]
    fn test_apply_same_broadcast_twice_is_idempotent() {
        let mut authority = table();
        let mut replica = table();
        let out = write(&mut authority, |t, w| t.set(w, 1, "a".into()).unwrap());

        assert_eq!(replica.apply(&out[0]).unwrap(), ApplyOutcome::Applied);
        assert_eq!(replica.apply(&out[0]).unwrap(), ApplyOutcome::Stale);
        assert_eq!(replica, authority);
    }

    #[test]
    fn test_apply_older_write_after_newer_keeps_newer() {
        let mut authority = table();
        let mut replica = table();
        let first = write(&mut authority, |t, w| t.set(w, 1, "old".into()).unwrap());
        let second = write(&mut authority, |t, w| t.set(w, 1, "new".into()).unwrap());

        replica.apply(&second[0]).unwrap();
        let outcome = replica.apply(&first[0]).unwrap();

        assert_eq!(outcome, ApplyOutcome::Stale);
        assert_eq!(replica.get(&1).map(String::as_str), Some("new"));
    }

    #[test]
    fn test_apply_stale_set_does_not_resurrect_tombstone() {
        let mut authority = table();
        let mut replica = table();
        let set = write(&mut authority, |t, w| t.set(w, 1, "a".into()).unwrap());
        let tomb = write(&mut authority, |t, w| {
            t.remove(w, &1).unwrap();
        });

        replica.apply(&set[0]).unwrap();
        replica.apply(&tomb[0]).unwrap();
        replica.apply(&set[0]).unwrap();

        assert!(replica.get(&1).is_none());
        assert!(replica.is_empty());
    }

    #[test]
    fn test_apply_wrong_module_returns_error() {
        let mut replica = table();
        let b = Broadcast {
            module: ModuleId::Rooms,
            seq: 1,
            key: serde_json::json!(1),
            value: None,
        };

        let result = replica.apply(&b);

        assert!(matches!(result, Err(TableError::WrongModule { .. })));
    }

    #[test]
    fn test_apply_bad_value_returns_decode_error() {
        let mut replica = table();
        let b = Broadcast {
            module: ModuleId::Players,
            seq: 1,
            key: serde_json::json!(1),
            value: Some(serde_json::json!({ "not": "a string" })),
        };

        assert!(matches!(replica.apply(&b), Err(TableError::Decode { .. })));
        assert!(replica.is_empty());
    }

    #[test]
    fn test_replica_tracks_seq_for_authority_promotion() {
        let mut authority = table();
        let mut replica = table();
        let out = write(&mut authority, |t, w| {
            t.set(w, 1, "a".into()).unwrap();
            t.set(w, 2, "b".into()).unwrap();
        });
        for b in &out {
            replica.apply(b).unwrap();
        }

        // The replica is promoted and continues the sequence.
        let next = write(&mut replica, |t, w| t.set(w, 3, "c".into()).unwrap());

        assert_eq!(next[0].seq, 3);
    }

    // =====================================================================
    // snapshot / restore
    // =====================================================================

    #[test]
    fn test_restore_replaces_stale_mirror() {
        let mut authority = table();
        let mut replica = table();
        write(&mut authority, |t, w| {
            t.set(w, 1, "a".into()).unwrap();
            t.set(w, 2, "b".into()).unwrap();
            t.remove(w, &1).unwrap();
        });
        // The replica holds something the authority no longer has.
        let junk = Broadcast {
            module: ModuleId::Players,
            seq: 1,
            key: serde_json::json!(9),
            value: Some(serde_json::json!("junk")),
        };
        replica.apply(&junk).unwrap();

        replica.restore(&authority.snapshot().unwrap()).unwrap();

        assert_eq!(replica, authority);
        assert_eq!(replica.last_seq(), authority.last_seq());
    }

    #[test]
    fn test_restore_ignores_broadcasts_already_covered() {
        let mut authority = table();
        let mut replica = table();
        let out = write(&mut authority, |t, w| t.set(w, 1, "a".into()).unwrap());
        write(&mut authority, |t, w| {
            t.remove(w, &1).unwrap();
        });

        replica.restore(&authority.snapshot().unwrap()).unwrap();
        let outcome = replica.apply(&out[0]).unwrap();

        assert_eq!(outcome, ApplyOutcome::Stale);
        assert!(replica.is_empty());
    }

    #[test]
    fn test_restore_bad_snapshot_keeps_existing_state() {
        let mut t = table();
        write(&mut t, |t, w| t.set(w, 1, "a".into()).unwrap());
        let bad = TableSnapshot {
            module: ModuleId::Players,
            next_seq: 10,
            entries: vec![SnapshotEntry {
                key: serde_json::json!("not a number"),
                value: serde_json::json!("x"),
                seq: 10,
            }],
        };

        assert!(t.restore(&bad).is_err());
        assert_eq!(t.get(&1).map(String::as_str), Some("a"));
    }
}
