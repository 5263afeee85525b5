//! Authority gate, write handle, and the outbox of pending broadcasts.
//!
//! Every mutator on every replicated table takes a `&mut Writer`. The only
//! place that hands one out during a session is [`AuthorityGate::command`],
//! and it refuses when the local node isn't the authority. That makes the
//! "mutators are no-ops on replicas" rule a single check instead of a
//! guard copied into each module.
//!
//! ```text
//! gameplay ──command(|w| ..)──→ AuthorityGate ──is_authority()?──→ Writer
//!                                     │ no                            │
//!                                     ▼                               ▼
//!                                   None                  table.set(w, k, v)
//!                                                                     │
//!                                                          Outbox (program order)
//! ```

use std::time::Duration;

use rift_protocol::Broadcast;
use rift_transport::SessionTransport;

/// Broadcasts produced on the authority, waiting to be flushed.
///
/// Order is exactly the order of the `set`/`remove` calls that produced
/// them.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<Broadcast>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every pending broadcast, leaving the outbox empty.
    pub fn drain(&mut self) -> Vec<Broadcast> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Write access to replicated state, valid for one command or tick.
///
/// Holding a `Writer` means the caller is running on the authority.
/// It also carries the simulation time the command runs at, so every
/// timestamp written during one tick agrees.
pub struct Writer<'a> {
    outbox: &'a mut Outbox,
    now: Duration,
}

impl<'a> Writer<'a> {
    /// Opens a write handle onto `outbox` at simulation time `now`.
    ///
    /// Call this through [`AuthorityGate::command`] in session code; tests
    /// use it directly to drive modules without a transport.
    pub fn authority(outbox: &'a mut Outbox, now: Duration) -> Self {
        Self { outbox, now }
    }

    /// Simulation time of the current command.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub(crate) fn emit(&mut self, broadcast: Broadcast) {
        self.outbox.pending.push(broadcast);
    }
}

/// Centralized authority check wrapping every mutation.
#[derive(Debug, Default)]
pub struct AuthorityGate {
    outbox: Outbox,
}

impl AuthorityGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with a [`Writer`] if `transport` reports authority.
    ///
    /// On a replica this is a silent no-op returning `None`: shared
    /// gameplay code may call mutators speculatively on every node.
    pub fn command<T, R>(
        &mut self,
        transport: &T,
        f: impl FnOnce(&mut Writer<'_>) -> R,
    ) -> Option<R>
    where
        T: SessionTransport + ?Sized,
    {
        if !transport.is_authority() {
            tracing::trace!(node = %transport.local_id(), "mutation ignored on replica");
            return None;
        }
        let mut writer = Writer::authority(&mut self.outbox, transport.now());
        Some(f(&mut writer))
    }

    /// Takes the broadcasts queued by previous commands.
    pub fn drain(&mut self) -> Vec<Broadcast> {
        self.outbox.drain()
    }

    /// Broadcasts written but not yet drained.
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }
}
