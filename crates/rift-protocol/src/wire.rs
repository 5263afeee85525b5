//! Replication messages exchanged between the authority and its replicas.
//!
//! A single mutation of a replicated table becomes one [`Broadcast`].
//! The authority batches the broadcasts produced during one command or
//! tick into an [`Envelope`] and hands it to the transport. A returning
//! node gets a [`Payload::Snapshot`] instead: the full state of every
//! table, since its mirror is stale by an unknown amount.
//!
//! ```text
//! +------------------------------------------+
//! | seq: 17   timestamp_ms: 48250            |
//! | payload: Broadcasts [                    |
//! |   { module: Players, seq: 203, key: 4,   |
//! |     value: { health: 60.0, ... } },      |
//! |   { module: Projectiles, seq: 88, key: 9,|
//! |     value: null }   <- tombstone         |
//! | ]                                        |
//! +------------------------------------------+
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// ModuleId
// ---------------------------------------------------------------------------

/// Names one replicated table. Every broadcast is routed by this id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum ModuleId {
    Players,
    Participants,
    Projectiles,
    Skills,
    ActiveSkills,
    Effects,
    Vfx,
    Objectives,
    Teams,
    TeamMembers,
    Scores,
    TopScorers,
    Progression,
    Session,
    Reconnect,
    Rooms,
    RoomMembers,
    Queue,
    Matches,
    Votes,
    VoteWindow,
    /// Last id issued in each id space.
    Ids,
}

// ---------------------------------------------------------------------------
// Broadcast
// ---------------------------------------------------------------------------

/// One replicated mutation: `set key = value`, or a tombstone when
/// `value` is `None`.
///
/// `seq` comes from the owning table's counter and strictly increases
/// with every write to that table, so a replica can discard anything it
/// has already applied (duplicates) or anything older than what it holds
/// for the same key (stale, out-of-order delivery).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub module: ModuleId,
    pub seq: u64,
    pub key: Value,
    /// `None` marks a removal.
    pub value: Option<Value>,
}

impl Broadcast {
    /// Returns `true` if this broadcast removes its key.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// One live row in a table snapshot, with the seq that last wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: Value,
    pub value: Value,
    pub seq: u64,
}

/// The complete contents of one table at the moment it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub module: ModuleId,
    /// Highest seq the table had issued or seen. Anything at or below it
    /// is already reflected in `entries`.
    pub next_seq: u64,
    pub entries: Vec<SnapshotEntry>,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// What a frame carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Incremental mutations in the order the authority made them.
    Broadcasts(Vec<Broadcast>),
    /// Full state of every table, sent to a node that just returned.
    Snapshot(Vec<TableSnapshot>),
}

/// The top-level frame handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender frame counter, for diagnostics.
    pub seq: u64,
    /// Simulation time at which the frame was flushed.
    pub timestamp_ms: u64,
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_id_serializes_as_pascal_case() {
        let json = serde_json::to_string(&ModuleId::ActiveSkills).unwrap();
        assert_eq!(json, "\"ActiveSkills\"");
    }

    #[test]
    fn test_broadcast_tombstone_has_null_value() {
        let b = Broadcast {
            module: ModuleId::Projectiles,
            seq: 4,
            key: json!(9),
            value: None,
        };
        assert!(b.is_tombstone());
        let v = serde_json::to_value(&b).unwrap();
        assert!(v["value"].is_null());
        assert_eq!(v["module"], "Projectiles");
    }

    #[test]
    fn test_payload_is_adjacently_tagged() {
        let payload = Payload::Broadcasts(vec![]);
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["type"], "Broadcasts");
        assert_eq!(v["data"], json!([]));
    }

    #[test]
    fn test_envelope_decode_rejects_unknown_payload() {
        let raw = r#"{"seq":1,"timestamp_ms":0,"payload":{"type":"Teleport","data":[]}}"#;
        let result: Result<Envelope, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }
}
