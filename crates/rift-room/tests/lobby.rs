//! Room lifecycle, matchmaking, and voting scenarios.

use std::time::Duration;

use rift_protocol::{MapId, PlayerId};
use rift_room::{LobbyConfig, MapVoting, MatchQueue, RoomDirectory, RoomError, RoomSettings};
use rift_table::{IdAllocator, Outbox, Writer};

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

// =========================================================================
// Rooms
// =========================================================================

#[test]
fn test_room_lifecycle_fills_rejects_and_dissolves() {
    let mut rooms = RoomDirectory::new();
    let mut ids = IdAllocator::new();
    let mut outbox = Outbox::new();
    let mut w = Writer::authority(&mut outbox, Duration::ZERO);

    let settings = RoomSettings::new("A", "ffa", "map1", 4);
    let room = rooms.create_room(&mut w, &mut ids, settings).unwrap();
    for id in 1..=4 {
        rooms.join_room(&mut w, pid(id), room).unwrap();
    }
    let fifth = rooms.join_room(&mut w, pid(5), room);
    assert!(matches!(fifth, Err(RoomError::RoomFull(_))));
    assert_eq!(rooms.get_room(room).unwrap().occupancy, 4);

    rooms.leave_room(&mut w, pid(1)).unwrap();
    assert_eq!(rooms.get_room(room).unwrap().occupancy, 3);

    for id in 2..=4 {
        rooms.leave_room(&mut w, pid(id)).unwrap();
    }
    assert!(rooms.get_room(room).is_none());
}

#[test]
fn test_room_replica_tracks_occupancy() {
    let mut authority = RoomDirectory::new();
    let mut replica = RoomDirectory::new();
    let mut ids = IdAllocator::new();
    let mut outbox = Outbox::new();
    let room = {
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        let settings = RoomSettings::new("A", "tdm", "arena", 4);
        let room = authority.create_room(&mut w, &mut ids, settings).unwrap();
        authority.join_room(&mut w, pid(1), room).unwrap();
        authority.join_room(&mut w, pid(2), room).unwrap();
        authority.leave_room(&mut w, pid(1)).unwrap();
        room
    };

    for b in outbox.drain() {
        for table in replica.replicas_mut() {
            if table.module() == b.module {
                table.apply_broadcast(&b).unwrap();
            }
        }
    }

    assert_eq!(replica.get_room(room), authority.get_room(room));
    assert_eq!(replica.members(room), vec![pid(2)]);
}

// =========================================================================
// Matchmaking
// =========================================================================

#[test]
fn test_matchmaking_eight_ready_forms_one_match() {
    let mut queue = MatchQueue::new(&LobbyConfig::default());
    let mut ids = IdAllocator::new();
    let mut outbox = Outbox::new();
    let mut w = Writer::authority(&mut outbox, Duration::ZERO);
    for id in 1..=8 {
        queue.enqueue(&mut w, pid(id), "tdm", None, 1000).unwrap();
        queue.set_ready(&mut w, pid(id), true).unwrap();
    }

    let out = queue.tick(&mut w, &mut ids, Duration::from_secs(1), |_| true).unwrap();

    assert_eq!(out.formed.len(), 1);
    let m = queue.get_match(out.formed[0]).unwrap();
    assert_eq!(m.rosters[0].len(), 4);
    assert_eq!(m.rosters[1].len(), 4);
    assert_eq!(queue.queue_len(), 0);
}

#[test]
fn test_matchmaking_seven_ready_forms_nothing() {
    let mut queue = MatchQueue::new(&LobbyConfig::default());
    let mut ids = IdAllocator::new();
    let mut outbox = Outbox::new();
    let mut w = Writer::authority(&mut outbox, Duration::ZERO);
    for id in 1..=7 {
        queue.enqueue(&mut w, pid(id), "tdm", None, 1000).unwrap();
        queue.set_ready(&mut w, pid(id), true).unwrap();
    }

    let out = queue.tick(&mut w, &mut ids, Duration::from_secs(1), |_| true).unwrap();

    assert!(out.formed.is_empty());
    assert_eq!(queue.queue_len(), 7);
}

// =========================================================================
// Voting
// =========================================================================

#[test]
fn test_vote_second_candidate_ignored() {
    let mut voting = MapVoting::new(&LobbyConfig::default());
    let mut outbox = Outbox::new();
    let mut w = Writer::authority(&mut outbox, Duration::ZERO);
    voting.start_map_voting(&mut w, Duration::from_secs(15)).unwrap();
    let arena = MapId::new("arena");
    let docks = MapId::new("docks");

    assert!(voting.cast_vote(&mut w, pid(1), &arena).unwrap());
    assert!(!voting.cast_vote(&mut w, pid(1), &docks).unwrap());
    assert!(!voting.cast_vote(&mut w, pid(1), &arena).unwrap());

    assert_eq!(voting.get_vote(&arena).unwrap().votes, 1);
    assert_eq!(voting.get_vote(&docks).unwrap().votes, 0);
    let total: usize = [&arena, &docks]
        .into_iter()
        .filter_map(|m| voting.get_vote(m))
        .map(|t| t.voters.iter().filter(|p| **p == pid(1)).count())
        .sum();
    assert_eq!(total, 1);
}
