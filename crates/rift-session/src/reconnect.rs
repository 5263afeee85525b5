//! Reconnect windows for dropped participants.
//!
//! ```text
//! Disconnected(p) --> on_disconnect() --> [pending]
//!                                           |
//!             +-----------------------------+--------------------------+
//!             v                             v                          v
//!   attempt_reconnect(ok)        attempt_reconnect(bad token)   expire_stale()
//!   -> entry removed, full       -> attempts += 1, still        -> entry removed,
//!      resync for p                 pending                        p evicted
//! ```
//!
//! Restoration and timeout eviction are the only two ways an entry
//! leaves the table.

use std::time::Duration;

use rand::Rng;
use rift_protocol::{ModuleId, PlayerId};
use rift_table::{Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::{SessionConfig, SessionError};

/// An open reconnect window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectEntry {
    /// Simulation time of the disconnect.
    pub disconnected_at: Duration,
    /// Token the participant must present to come back. Peers are trusted,
    /// so it travels with the record.
    pub token: String,
    /// Failed attempts so far.
    pub attempts: u32,
}

/// Tracks participants who dropped and may still return.
pub struct ReconnectTracker {
    entries: ReplicatedTable<PlayerId, ReconnectEntry>,
    timeout: Duration,
}

impl ReconnectTracker {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            entries: ReplicatedTable::new(ModuleId::Reconnect),
            timeout: config.reconnect_timeout(),
        }
    }

    /// Opens a reconnect window and returns the token to hand to the
    /// participant.
    ///
    /// A second disconnect while the window is open keeps the original
    /// timestamp and token, so flapping connections can't extend it.
    pub fn on_disconnect(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
    ) -> Result<String, SessionError> {
        if let Some(entry) = self.entries.get(&player) {
            return Ok(entry.token.clone());
        }
        let token = generate_token();
        self.entries.set(
            w,
            player,
            ReconnectEntry {
                disconnected_at: w.now(),
                token: token.clone(),
                attempts: 0,
            },
        )?;
        tracing::info!(%player, timeout = ?self.timeout, "reconnect window opened");
        Ok(token)
    }

    /// Tries to restore `player` with `token`.
    ///
    /// On success the entry is removed and the caller owes the
    /// participant a full-state resync.
    ///
    /// # Errors
    /// - [`SessionError::NotPending`]: no window is open.
    /// - [`SessionError::Expired`]: the window ran out; the entry is
    ///   evicted here rather than waiting for the next sweep.
    /// - [`SessionError::InvalidToken`]: wrong token; the attempt is
    ///   counted and the window stays open.
    pub fn attempt_reconnect(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        token: &str,
    ) -> Result<(), SessionError> {
        let entry = self
            .entries
            .get(&player)
            .ok_or(SessionError::NotPending(player))?;

        if w.now().saturating_sub(entry.disconnected_at) > self.timeout {
            self.entries.remove(w, &player)?;
            tracing::info!(%player, "reconnect attempt after window closed, evicted");
            return Err(SessionError::Expired(player));
        }
        if entry.token != token {
            let attempts = entry.attempts + 1;
            self.entries.update(w, &player, |e| e.attempts = attempts)?;
            tracing::debug!(%player, attempts, "reconnect rejected: bad token");
            return Err(SessionError::InvalidToken { player, attempts });
        }

        self.entries.remove(w, &player)?;
        tracing::info!(%player, "participant reconnected");
        Ok(())
    }

    /// Evicts every entry whose window is strictly older than the
    /// timeout. Returns who was evicted.
    pub fn expire_stale(&mut self, w: &mut Writer<'_>) -> Result<Vec<PlayerId>, SessionError> {
        let now = w.now();
        let timeout = self.timeout;
        let expired: Vec<PlayerId> = self
            .entries
            .remove_where(w, |_, e| now.saturating_sub(e.disconnected_at) > timeout)?
            .into_iter()
            .map(|(player, _)| player)
            .collect();
        for player in &expired {
            tracing::info!(%player, "reconnect window expired");
        }
        Ok(expired)
    }

    /// Whether `player` has an open reconnect window.
    pub fn is_pending(&self, player: PlayerId) -> bool {
        self.entries.contains_key(&player)
    }

    pub fn get(&self, player: PlayerId) -> Option<&ReconnectEntry> {
        self.entries.get(&player)
    }

    /// Everyone with an open window, in id order.
    pub fn pending(&self) -> impl Iterator<Item = &PlayerId> {
        self.entries.keys()
    }

    pub fn replica(&self) -> &dyn Replica {
        &self.entries
    }

    pub fn replica_mut(&mut self) -> &mut dyn Replica {
        &mut self.entries
    }
}

/// Generates a random 32-character hex token (128 bits).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
