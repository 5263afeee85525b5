//! In-process session network built on tokio channels.
//!
//! Every node gets an unbounded inbox. Sending to [`Recipient::All`]
//! pushes the frame into every *other* connected node's inbox in one
//! pass, so frames from one sender arrive in send order. A disconnected
//! node silently misses frames, which is exactly what makes its mirror
//! stale and a full resync necessary when it returns.
//!
//! Simulation time is the tokio clock measured from when the network was
//! created, so tests can drive it with `tokio::time::pause` / `advance`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rift_protocol::{PlayerId, Recipient};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::{SessionTransport, TransportError, TransportEvent};

struct NodeSlot {
    inbox: mpsc::UnboundedSender<TransportEvent>,
    connected: bool,
}

struct Hub {
    nodes: BTreeMap<PlayerId, NodeSlot>,
    authority: Option<PlayerId>,
    epoch: Instant,
}

impl Hub {
    /// Delivers an event to every connected node except `skip`.
    fn notify_others(&self, skip: PlayerId, event: TransportEvent) {
        for (id, slot) in &self.nodes {
            if *id != skip && slot.connected {
                let _ = slot.inbox.send(event.clone());
            }
        }
    }
}

/// Handle to an in-process session network. Cheap to clone.
#[derive(Clone)]
pub struct LoopbackNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self {
            hub: Arc::new(Mutex::new(Hub {
                nodes: BTreeMap::new(),
                authority: None,
                epoch: Instant::now(),
            })),
        }
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a node to the session and returns its transport plus the
    /// receiving end of its inbox.
    ///
    /// The first node to join becomes the authority. Everyone already
    /// connected is told about the newcomer.
    pub fn join(
        &self,
        id: PlayerId,
    ) -> (LoopbackTransport, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut hub = self.hub();
        hub.nodes.insert(
            id,
            NodeSlot {
                inbox: tx,
                connected: true,
            },
        );
        if hub.authority.is_none() {
            hub.authority = Some(id);
            tracing::debug!(%id, "loopback: first node holds authority");
        }
        hub.notify_others(id, TransportEvent::Joined(id));
        drop(hub);

        (
            LoopbackTransport {
                id,
                hub: Arc::clone(&self.hub),
            },
            rx,
        )
    }

    /// Drops a node's connection without removing it from the session.
    pub fn disconnect(&self, id: PlayerId) {
        let mut hub = self.hub();
        if let Some(slot) = hub.nodes.get_mut(&id) {
            slot.connected = false;
            hub.notify_others(id, TransportEvent::Disconnected(id));
        }
    }

    /// Restores a dropped node and forwards its token to the authority.
    pub fn reconnect(&self, id: PlayerId, token: impl Into<String>) {
        let mut hub = self.hub();
        let Some(slot) = hub.nodes.get_mut(&id) else {
            return;
        };
        slot.connected = true;
        let event = TransportEvent::Reconnected {
            player: id,
            token: token.into(),
        };
        if let Some(authority) = hub.authority {
            if let Some(slot) = hub.nodes.get(&authority) {
                let _ = slot.inbox.send(event);
            }
        }
    }

    /// Removes a node for good.
    pub fn leave(&self, id: PlayerId) {
        let mut hub = self.hub();
        if hub.nodes.remove(&id).is_some() {
            if hub.authority == Some(id) {
                hub.authority = None;
            }
            hub.notify_others(id, TransportEvent::Left(id));
        }
    }

    /// Moves authority to `id` and tells every connected node.
    pub fn set_authority(&self, id: PlayerId) {
        let mut hub = self.hub();
        if !hub.nodes.contains_key(&id) {
            return;
        }
        hub.authority = Some(id);
        for slot in hub.nodes.values().filter(|s| s.connected) {
            let _ = slot
                .inbox
                .send(TransportEvent::AuthorityChanged { authority: id });
        }
    }

    /// The node currently acting as authority, if any.
    pub fn authority(&self) -> Option<PlayerId> {
        self.hub().authority
    }

    pub fn is_connected(&self, id: PlayerId) -> bool {
        self.hub().nodes.get(&id).is_some_and(|s| s.connected)
    }
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One node's view of a [`LoopbackNetwork`].
pub struct LoopbackTransport {
    id: PlayerId,
    hub: Arc<Mutex<Hub>>,
}

impl LoopbackTransport {
    fn hub(&self) -> Result<MutexGuard<'_, Hub>, TransportError> {
        self.hub.lock().map_err(|_| TransportError::Shutdown)
    }
}

impl SessionTransport for LoopbackTransport {
    fn local_id(&self) -> PlayerId {
        self.id
    }

    fn is_authority(&self) -> bool {
        self.hub()
            .map(|hub| hub.authority == Some(self.id))
            .unwrap_or(false)
    }

    fn now(&self) -> Duration {
        self.hub()
            .map(|hub| hub.epoch.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    fn send(&self, to: Recipient, frame: Vec<u8>) -> Result<(), TransportError> {
        let hub = self.hub()?;
        if !hub.nodes.get(&self.id).is_some_and(|s| s.connected) {
            return Err(TransportError::NotConnected(self.id));
        }
        match to {
            Recipient::All => {
                hub.notify_others(
                    self.id,
                    TransportEvent::Frame {
                        from: self.id,
                        data: frame,
                    },
                );
            }
            Recipient::Player(target) => {
                let slot = hub
                    .nodes
                    .get(&target)
                    .ok_or(TransportError::UnknownPeer(target))?;
                if slot.connected {
                    let _ = slot.inbox.send(TransportEvent::Frame {
                        from: self.id,
                        data: frame,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    #[tokio::test]
    async fn test_join_first_node_becomes_authority() {
        let net = LoopbackNetwork::new();
        let (a, _rx_a) = net.join(pid(1));
        let (b, _rx_b) = net.join(pid(2));

        assert!(a.is_authority());
        assert!(!b.is_authority());
        assert_eq!(net.authority(), Some(pid(1)));
    }

    #[tokio::test]
    async fn test_join_notifies_existing_nodes() {
        let net = LoopbackNetwork::new();
        let (_a, mut rx_a) = net.join(pid(1));
        let (_b, _rx_b) = net.join(pid(2));

        assert_eq!(rx_a.recv().await, Some(TransportEvent::Joined(pid(2))));
    }

    #[tokio::test]
    async fn test_send_all_skips_sender_and_keeps_order() {
        let net = LoopbackNetwork::new();
        let (a, mut rx_a) = net.join(pid(1));
        let (_b, mut rx_b) = net.join(pid(2));
        let _ = rx_a.try_recv(); // Joined(2)

        a.send(Recipient::All, vec![1]).unwrap();
        a.send(Recipient::All, vec![2]).unwrap();

        assert_eq!(
            rx_b.recv().await,
            Some(TransportEvent::Frame { from: pid(1), data: vec![1] })
        );
        assert_eq!(
            rx_b.recv().await,
            Some(TransportEvent::Frame { from: pid(1), data: vec![2] })
        );
        assert!(rx_a.try_recv().is_err(), "sender must not receive its own frame");
    }

    #[tokio::test]
    async fn test_disconnected_node_misses_frames() {
        let net = LoopbackNetwork::new();
        let (a, _rx_a) = net.join(pid(1));
        let (_b, mut rx_b) = net.join(pid(2));

        net.disconnect(pid(2));
        a.send(Recipient::All, vec![7]).unwrap();

        assert!(rx_b.try_recv().is_err());
        assert!(!net.is_connected(pid(2)));
    }

    #[tokio::test]
    async fn test_reconnect_forwards_token_to_authority() {
        let net = LoopbackNetwork::new();
        let (_a, mut rx_a) = net.join(pid(1));
        let (_b, _rx_b) = net.join(pid(2));
        let _ = rx_a.try_recv(); // Joined(2)

        net.disconnect(pid(2));
        assert_eq!(rx_a.recv().await, Some(TransportEvent::Disconnected(pid(2))));

        net.reconnect(pid(2), "tok");
        assert_eq!(
            rx_a.recv().await,
            Some(TransportEvent::Reconnected {
                player: pid(2),
                token: "tok".into()
            })
        );
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_returns_error() {
        let net = LoopbackNetwork::new();
        let (a, _rx) = net.join(pid(1));

        let result = a.send(Recipient::Player(pid(9)), vec![]);

        assert!(matches!(result, Err(TransportError::UnknownPeer(p)) if p == pid(9)));
    }

    #[tokio::test]
    async fn test_set_authority_moves_role() {
        let net = LoopbackNetwork::new();
        let (a, _rx_a) = net.join(pid(1));
        let (b, mut rx_b) = net.join(pid(2));

        net.set_authority(pid(2));

        assert!(!a.is_authority());
        assert!(b.is_authority());
        assert_eq!(
            rx_b.recv().await,
            Some(TransportEvent::AuthorityChanged { authority: pid(2) })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_now_follows_tokio_clock() {
        let net = LoopbackNetwork::new();
        let (a, _rx) = net.join(pid(1));

        tokio::time::advance(Duration::from_secs(3)).await;

        assert!(a.now() >= Duration::from_secs(3));
    }
}
