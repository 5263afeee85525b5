//! Lobby rooms and their occupants.
//!
//! A room lives as long as somebody is in it: the last `leave_room`
//! deletes the record. Occupancy is derived state kept in the room record
//! and must always equal the number of membership entries pointing at
//! the room.

use std::time::Duration;

use rift_protocol::{MapId, ModuleId, PlayerId, RoomId};
use rift_table::{IdAllocator, Replica, ReplicatedTable, Writer};
use serde::{Deserialize, Serialize};

use crate::RoomError;

/// What a creator asks for. Rooms are public unless marked otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSettings {
    pub name: String,
    pub mode: String,
    pub map: MapId,
    pub capacity: usize,
    pub private: bool,
}

impl RoomSettings {
    /// Public settings for a room.
    pub fn new(
        name: impl Into<String>,
        mode: impl Into<String>,
        map: impl Into<MapId>,
        capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            mode: mode.into(),
            map: map.into(),
            capacity,
            private: false,
        }
    }

    /// Hides the room from [`RoomDirectory::list_public`].
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }
}

/// One lobby room as every node sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub name: String,
    pub mode: String,
    pub map: MapId,
    pub capacity: usize,
    pub occupancy: usize,
    pub private: bool,
    pub locked: bool,
    pub in_game: bool,
    pub created_at: Duration,
}

impl RoomRecord {
    pub fn is_full(&self) -> bool {
        self.occupancy >= self.capacity
    }

    /// Whether a new occupant could join right now.
    pub fn is_joinable(&self) -> bool {
        !self.locked && !self.in_game && !self.is_full()
    }
}

/// Room directory: rooms plus one membership entry per occupant.
pub struct RoomDirectory {
    rooms: ReplicatedTable<RoomId, RoomRecord>,
    members: ReplicatedTable<PlayerId, RoomId>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: ReplicatedTable::new(ModuleId::Rooms),
            members: ReplicatedTable::new(ModuleId::RoomMembers),
        }
    }

    /// Creates an empty room and returns its id.
    ///
    /// The creator is not placed in the room; follow up with
    /// [`join_room`](Self::join_room).
    pub fn create_room(
        &mut self,
        w: &mut Writer<'_>,
        ids: &mut IdAllocator,
        settings: RoomSettings,
    ) -> Result<RoomId, RoomError> {
        let room_id = ids.next_room(w)?;
        let record = RoomRecord {
            name: settings.name,
            mode: settings.mode,
            map: settings.map,
            capacity: settings.capacity,
            occupancy: 0,
            private: settings.private,
            locked: false,
            in_game: false,
            created_at: w.now(),
        };
        tracing::info!(
            %room_id,
            name = %record.name,
            capacity = record.capacity,
            "room created"
        );
        self.rooms.set(w, room_id, record)?;
        Ok(room_id)
    }

    /// Puts `player` in `room`, leaving whatever room they were in first.
    ///
    /// Joining the room you are already in is a no-op.
    ///
    /// # Errors
    /// [`RoomError::NotFound`], [`RoomError::Locked`], [`RoomError::InGame`]
    /// or [`RoomError::RoomFull`]. On error the player stays where they
    /// were.
    pub fn join_room(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        room: RoomId,
    ) -> Result<(), RoomError> {
        let record = self.rooms.get(&room).ok_or(RoomError::NotFound(room))?;
        if self.members.get(&player) == Some(&room) {
            return Ok(());
        }
        if record.locked {
            return Err(RoomError::Locked(room));
        }
        if record.in_game {
            return Err(RoomError::InGame(room));
        }
        if record.is_full() {
            return Err(RoomError::RoomFull(room));
        }

        self.leave_room(w, player)?;
        self.rooms.update(w, &room, |r| r.occupancy += 1)?;
        self.members.set(w, player, room)?;
        tracing::debug!(%player, %room, "joined room");
        Ok(())
    }

    /// Takes `player` out of their room. Returns the room they left, or
    /// `None` if they weren't in one.
    pub fn leave_room(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
    ) -> Result<Option<RoomId>, RoomError> {
        let Some(room) = self.members.remove(w, &player)? else {
            return Ok(None);
        };

        let remaining = match self.rooms.get(&room) {
            Some(r) => r.occupancy.saturating_sub(1),
            None => return Ok(Some(room)),
        };
        if remaining == 0 {
            self.rooms.remove(w, &room)?;
            tracing::info!(room_id = %room, "room destroyed");
        } else {
            self.rooms.update(w, &room, |r| r.occupancy = remaining)?;
        }
        Ok(Some(room))
    }

    /// Closes or reopens `room` to new occupants. Current occupants stay.
    pub fn set_locked(
        &mut self,
        w: &mut Writer<'_>,
        room: RoomId,
        locked: bool,
    ) -> Result<(), RoomError> {
        self.modify(w, room, |r| r.locked = locked)
    }

    /// Marks a match as running in `room`; joins are refused meanwhile.
    pub fn set_in_game(
        &mut self,
        w: &mut Writer<'_>,
        room: RoomId,
        in_game: bool,
    ) -> Result<(), RoomError> {
        self.modify(w, room, |r| r.in_game = in_game)
    }

    /// Switches the map, usually to a vote winner.
    pub fn set_map(
        &mut self,
        w: &mut Writer<'_>,
        room: RoomId,
        map: MapId,
    ) -> Result<(), RoomError> {
        self.modify(w, room, |r| r.map = map)
    }

    fn modify(
        &mut self,
        w: &mut Writer<'_>,
        room: RoomId,
        f: impl FnOnce(&mut RoomRecord),
    ) -> Result<(), RoomError> {
        if self.rooms.update(w, &room, f)? {
            Ok(())
        } else {
            Err(RoomError::NotFound(room))
        }
    }

    // -- Queries ----------------------------------------------------------

    /// The record for `room`, or `None` once its last occupant has left.
    pub fn get_room(&self, room: RoomId) -> Option<&RoomRecord> {
        self.rooms.get(&room)
    }

    /// The room `player` is in, if any.
    pub fn room_of(&self, player: PlayerId) -> Option<RoomId> {
        self.members.get(&player).copied()
    }

    /// Occupants of `room`, in player id order.
    pub fn members(&self, room: RoomId) -> Vec<PlayerId> {
        self.members
            .iter()
            .filter(|(_, r)| **r == room)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Non-private rooms, for the lobby browser.
    pub fn list_public(&self) -> Vec<(RoomId, &RoomRecord)> {
        self.rooms
            .iter()
            .filter(|(_, r)| !r.private)
            .map(|(id, r)| (*id, r))
            .collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Rooms then memberships, for routing broadcasts and snapshots.
    pub fn replicas(&self) -> [&dyn Replica; 2] {
        [&self.rooms, &self.members]
    }

    pub fn replicas_mut(&mut self) -> [&mut dyn Replica; 2] {
        [&mut self.rooms, &mut self.members]
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
