//! `RiftCore`: the world plus the glue to a session transport.
//!
//! ```text
//!   host ──command()──→ AuthorityGate ──Writer──→ World ──→ Outbox
//!                                                             │ flush()
//!                                                             ▼
//!   replicas ←── Frame(Envelope{Broadcasts}) ←── Codec ←── transport.send(All)
//! ```
//!
//! On a replica every mutating entry point is a silent no-op; state only
//! changes through inbound frames.

use std::time::Duration;

use rift_protocol::{Codec, Envelope, JsonCodec, Payload, PlayerId, Recipient, TableSnapshot};
use rift_session::SessionError;
use rift_table::{AuthorityGate, Writer};
use rift_transport::{SessionTransport, TransportEvent};
use tracing::{debug, info, warn};

use crate::{CoreConfig, CoreEvent, RiftError, World};

/// One node of a session: the world mirror, a transport, and the
/// authority gate between them.
pub struct RiftCore<T: SessionTransport, C: Codec = JsonCodec> {
    transport: T,
    codec: C,
    gate: AuthorityGate,
    world: World,
    config: CoreConfig,
    frame_seq: u64,
}

impl<T: SessionTransport> RiftCore<T, JsonCodec> {
    pub fn new(transport: T, config: CoreConfig) -> Self {
        Self::with_codec(transport, JsonCodec, config)
    }
}

impl<T: SessionTransport, C: Codec> RiftCore<T, C> {
    /// Like [`new`](RiftCore::new) with a custom wire codec.
    pub fn with_codec(transport: T, codec: C, config: CoreConfig) -> Self {
        let config = config.validated();
        Self {
            world: World::new(&config),
            transport,
            codec,
            gate: AuthorityGate::new(),
            config,
            frame_seq: 0,
        }
    }

    /// Read access to the local mirror. Mutate through
    /// [`command`](Self::command).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The session transport this core sends through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn local_id(&self) -> PlayerId {
        self.transport.local_id()
    }

    pub fn is_authority(&self) -> bool {
        self.transport.is_authority()
    }

    /// Every table's contents, as a late joiner would receive them.
    pub fn full_snapshot(&self) -> Result<Vec<TableSnapshot>, RiftError> {
        Ok(self.world.full_snapshot()?)
    }

    // -----------------------------------------------------------------------
    // Authority entry points
    // -----------------------------------------------------------------------

    /// Runs `f` against the world if this node is the authority, then
    /// flushes whatever it wrote to every replica.
    ///
    /// Returns `None` on a replica.
    pub fn command<R>(&mut self, f: impl FnOnce(&mut World, &mut Writer<'_>) -> R) -> Option<R> {
        let world = &mut self.world;
        let out = self.gate.command(&self.transport, |w| f(world, w))?;
        if let Err(e) = self.flush() {
            warn!(error = %e, "flush after command failed");
        }
        Some(out)
    }

    /// Advances the simulation by `dt`. A no-op on replicas.
    pub fn tick(&mut self, dt: Duration) -> Result<Vec<CoreEvent>, RiftError> {
        let world = &mut self.world;
        let Some(result) = self.gate.command(&self.transport, |w| world.step(w, dt)) else {
            return Ok(Vec::new());
        };
        // Whatever was written before a failure still has to reach replicas.
        self.flush()?;
        result
    }

    /// Sends queued broadcasts to every replica. Returns how many went out.
    pub fn flush(&mut self) -> Result<usize, RiftError> {
        let broadcasts = self.gate.drain();
        if broadcasts.is_empty() {
            return Ok(0);
        }
        let count = broadcasts.len();
        self.send(Recipient::All, Payload::Broadcasts(broadcasts))?;
        Ok(count)
    }

    /// Sends every table's full contents to `to`.
    pub fn send_snapshot(&mut self, to: PlayerId) -> Result<(), RiftError> {
        let snapshots = self.world.full_snapshot()?;
        debug!(%to, tables = snapshots.len(), "sending full snapshot");
        self.send(Recipient::Player(to), Payload::Snapshot(snapshots))
    }

    fn send(&mut self, to: Recipient, payload: Payload) -> Result<(), RiftError> {
        self.frame_seq += 1;
        let envelope = Envelope {
            seq: self.frame_seq,
            timestamp_ms: u64::try_from(self.transport.now().as_millis()).unwrap_or(u64::MAX),
            payload,
        };
        let frame = self.codec.encode(&envelope)?;
        self.transport.send(to, frame)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transport events
    // -----------------------------------------------------------------------

    /// Reacts to one transport event and reports what it meant for the
    /// session.
    ///
    /// Membership events only change state on the authority; frames only
    /// change state on replicas.
    pub fn handle_event(&mut self, event: TransportEvent) -> Result<Vec<CoreEvent>, RiftError> {
        match event {
            TransportEvent::Joined(player) => self.on_joined(player),
            TransportEvent::Left(player) => {
                self.authority_step(|world, w| world.evict(w, player))?;
                Ok(vec![CoreEvent::Left(player)])
            }
            TransportEvent::Disconnected(player) => self.on_disconnected(player),
            TransportEvent::Reconnected { player, token } => self.on_reconnected(player, &token),
            TransportEvent::AuthorityChanged { authority } => {
                Ok(vec![self.on_authority_changed(authority)])
            }
            TransportEvent::Frame { from, data } => self.on_frame(from, &data),
        }
    }

    /// Like [`command`](Self::command) for fallible steps: errors propagate
    /// after whatever was written has been flushed.
    fn authority_step<R>(
        &mut self,
        f: impl FnOnce(&mut World, &mut Writer<'_>) -> Result<R, RiftError>,
    ) -> Result<Option<R>, RiftError> {
        let world = &mut self.world;
        let Some(result) = self.gate.command(&self.transport, |w| f(world, w)) else {
            return Ok(None);
        };
        self.flush()?;
        result.map(Some)
    }

    fn on_joined(&mut self, player: PlayerId) -> Result<Vec<CoreEvent>, RiftError> {
        if self.authority_step(|world, w| world.admit(w, player))?.is_some() {
            self.send_snapshot(player)?;
        }
        info!(%player, "participant joined");
        Ok(vec![CoreEvent::Joined(player)])
    }

    fn on_disconnected(&mut self, player: PlayerId) -> Result<Vec<CoreEvent>, RiftError> {
        let token = self.authority_step(|world, w| {
            let token = world.reconnect.on_disconnect(w, player)?;
            if world.players.get_participant(player).is_some() {
                world.players.set_connected(w, player, false)?;
            }
            Ok(token)
        })?;
        Ok(token
            .map(|token| CoreEvent::Disconnected { player, token })
            .into_iter()
            .collect())
    }

    fn on_reconnected(
        &mut self,
        player: PlayerId,
        token: &str,
    ) -> Result<Vec<CoreEvent>, RiftError> {
        let outcome = self.authority_step(|world, w| {
            match world.reconnect.attempt_reconnect(w, player, token) {
                Ok(()) => {
                    world.players.set_connected(w, player, true)?;
                    Ok(CoreEvent::Reconnected(player))
                }
                Err(SessionError::Expired(_)) => {
                    world.evict(w, player)?;
                    Ok(CoreEvent::Evicted(player))
                }
                Err(SessionError::InvalidToken { .. } | SessionError::NotPending(_)) => {
                    debug!(%player, "reconnect rejected");
                    Ok(CoreEvent::ReconnectRejected(player))
                }
                Err(e) => Err(e.into()),
            }
        })?;

        let Some(event) = outcome else {
            return Ok(Vec::new());
        };
        if event == CoreEvent::Reconnected(player) {
            self.send_snapshot(player)?;
        }
        Ok(vec![event])
    }

    fn on_authority_changed(&mut self, authority: PlayerId) -> CoreEvent {
        let local = authority == self.local_id();
        if local {
            // Tables continue from their highest seen seq and the id
            // counters are replicated, so the mirror is ready as is.
            info!(%authority, "promoted to authority, resuming from mirror");
        } else {
            info!(%authority, "authority moved");
        }
        CoreEvent::AuthorityChanged { authority, local }
    }

    fn on_frame(&mut self, from: PlayerId, data: &[u8]) -> Result<Vec<CoreEvent>, RiftError> {
        let envelope: Envelope = self.codec.decode(data)?;
        match envelope.payload {
            Payload::Broadcasts(broadcasts) => {
                for b in &broadcasts {
                    self.world.apply(b)?;
                }
                Ok(Vec::new())
            }
            Payload::Snapshot(snapshots) => {
                self.world.restore(&snapshots)?;
                info!(%from, tables = snapshots.len(), "state restored from snapshot");
                Ok(vec![CoreEvent::Resynced])
            }
        }
    }
}
