//! Reconnect window through the full core, on paused tokio time.

use std::time::Duration;

use rift::prelude::*;
use rift_transport::LoopbackTransport;
use tokio::sync::mpsc::UnboundedReceiver;

type Node = (RiftCore<LoopbackTransport>, UnboundedReceiver<TransportEvent>);

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

fn node(net: &LoopbackNetwork, id: u64) -> Node {
    let (transport, rx) = net.join(pid(id));
    (RiftCore::new(transport, CoreConfig::default()), rx)
}

fn pump(node: &mut Node) -> Vec<CoreEvent> {
    let (core, rx) = node;
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.extend(core.handle_event(event).unwrap());
    }
    out
}

/// Disconnects player 2 and returns the token the authority issued.
fn drop_player_two(net: &LoopbackNetwork, a: &mut Node) -> String {
    net.disconnect(pid(2));
    pump(a)
        .into_iter()
        .find_map(|e| match e {
            CoreEvent::Disconnected { token, .. } => Some(token),
            _ => None,
        })
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_at_29s_restores_with_snapshot() {
    let net = LoopbackNetwork::new();
    let mut a = node(&net, 1);
    let mut b = node(&net, 2);
    pump(&mut a);
    pump(&mut b);

    let token = drop_player_two(&net, &mut a);
    assert!(!a.0.world().players.get_participant(pid(2)).unwrap().connected);

    // Missed while away.
    a.0.command(|world, w| world.teams.create_team(w, TeamId(0), "red"))
        .unwrap()
        .unwrap();
    assert!(pump(&mut b).is_empty());

    tokio::time::advance(Duration::from_secs(29)).await;
    let events = a.0.tick(Duration::from_millis(16)).unwrap();
    assert!(!events.contains(&CoreEvent::Evicted(pid(2))));
    assert!(a.0.world().reconnect.is_pending(pid(2)));

    net.reconnect(pid(2), token);
    assert!(pump(&mut a).contains(&CoreEvent::Reconnected(pid(2))));
    assert!(pump(&mut b).contains(&CoreEvent::Resynced));

    assert!(b.0.world().get_team(TeamId(0)).is_some());
    assert!(b.0.world().players.get_participant(pid(2)).unwrap().connected);
    assert!(!b.0.world().reconnect.is_pending(pid(2)));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_window_closes_at_31s() {
    let net = LoopbackNetwork::new();
    let mut a = node(&net, 1);
    let _b = node(&net, 2);
    pump(&mut a);

    let token = drop_player_two(&net, &mut a);

    tokio::time::advance(Duration::from_secs(31)).await;
    let events = a.0.tick(Duration::from_millis(16)).unwrap();

    assert!(events.contains(&CoreEvent::Evicted(pid(2))));
    assert!(a.0.world().players.get_participant(pid(2)).is_none());
    assert!(!a.0.world().reconnect.is_pending(pid(2)));

    net.reconnect(pid(2), token);
    assert!(pump(&mut a).contains(&CoreEvent::ReconnectRejected(pid(2))));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_bad_token_keeps_window() {
    let net = LoopbackNetwork::new();
    let mut a = node(&net, 1);
    let _b = node(&net, 2);
    pump(&mut a);
    drop_player_two(&net, &mut a);

    net.reconnect(pid(2), "forged");
    let events = pump(&mut a);

    assert!(events.contains(&CoreEvent::ReconnectRejected(pid(2))));
    assert_eq!(a.0.world().reconnect.get(pid(2)).unwrap().attempts, 1);
}
