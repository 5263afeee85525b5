//! Every replicated module of one session, and routing between them.

use std::time::Duration;

use rift_protocol::{
    Broadcast, MapId, MatchId, ModuleId, PlayerId, RoomId, TableSnapshot, TeamId, Vec2,
};
use rift_room::{ActiveMatch, MapVoting, MatchQueue, RoomDirectory, RoomRecord, VoteTally};
use rift_session::{MatchPhase, ReconnectTracker, SessionMachine};
use rift_state::{
    EffectModule, ObjectiveModule, PlayerModule, PlayerRecord, ProgressionModule,
    ProjectileModule, ScoreModule, SkillModule, TeamModule, TeamRecord,
};
use rift_table::{ApplyOutcome, IdAllocator, Replica, TableError, Writer};

use crate::{CoreConfig, CoreEvent, RiftError};

/// The full replicated state of a session.
///
/// Identical on every node: the authority mutates it through a
/// [`Writer`], replicas only through [`apply`](Self::apply) and
/// [`restore`](Self::restore).
///
/// Ids are minted from `ids`, which replicates like any other table, so a
/// replica promoted to authority carries on the same sequences.
pub struct World {
    pub ids: IdAllocator,
    pub players: PlayerModule,
    pub projectiles: ProjectileModule,
    pub skills: SkillModule,
    pub effects: EffectModule,
    pub objectives: ObjectiveModule,
    pub teams: TeamModule,
    pub scores: ScoreModule,
    pub progression: ProgressionModule,
    pub session: SessionMachine,
    pub reconnect: ReconnectTracker,
    pub rooms: RoomDirectory,
    pub queue: MatchQueue,
    pub voting: MapVoting,
}

impl World {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            ids: IdAllocator::new(),
            players: PlayerModule::new(&config.state),
            projectiles: ProjectileModule::new(&config.state),
            skills: SkillModule::new(&config.state),
            effects: EffectModule::new(),
            objectives: ObjectiveModule::new(&config.state),
            teams: TeamModule::new(&config.state),
            scores: ScoreModule::new(&config.state),
            progression: ProgressionModule::new(),
            session: SessionMachine::new(config.session.clone()),
            reconnect: ReconnectTracker::new(&config.session),
            rooms: RoomDirectory::new(),
            queue: MatchQueue::new(&config.lobby),
            voting: MapVoting::new(&config.lobby),
        }
    }

    // -----------------------------------------------------------------------
    // Replication
    // -----------------------------------------------------------------------

    fn replica_mut(&mut self, module: ModuleId) -> &mut dyn Replica {
        match module {
            ModuleId::Ids => &mut self.ids,
            ModuleId::Players => first(self.players.replicas_mut()),
            ModuleId::Participants => second(self.players.replicas_mut()),
            ModuleId::Projectiles => self.projectiles.replica_mut(),
            ModuleId::Skills => first(self.skills.replicas_mut()),
            ModuleId::ActiveSkills => second(self.skills.replicas_mut()),
            ModuleId::Effects => first(self.effects.replicas_mut()),
            ModuleId::Vfx => second(self.effects.replicas_mut()),
            ModuleId::Objectives => self.objectives.replica_mut(),
            ModuleId::Teams => first(self.teams.replicas_mut()),
            ModuleId::TeamMembers => second(self.teams.replicas_mut()),
            ModuleId::Scores => first(self.scores.replicas_mut()),
            ModuleId::TopScorers => second(self.scores.replicas_mut()),
            ModuleId::Progression => self.progression.replica_mut(),
            ModuleId::Session => self.session.replica_mut(),
            ModuleId::Reconnect => self.reconnect.replica_mut(),
            ModuleId::Rooms => first(self.rooms.replicas_mut()),
            ModuleId::RoomMembers => second(self.rooms.replicas_mut()),
            ModuleId::Queue => first(self.queue.replicas_mut()),
            ModuleId::Matches => second(self.queue.replicas_mut()),
            ModuleId::Votes => first(self.voting.replicas_mut()),
            ModuleId::VoteWindow => second(self.voting.replicas_mut()),
        }
    }

    fn replicas(&self) -> Vec<&dyn Replica> {
        let mut all: Vec<&dyn Replica> = Vec::with_capacity(22);
        all.push(&self.ids);
        all.extend(self.players.replicas());
        all.push(self.projectiles.replica());
        all.extend(self.skills.replicas());
        all.extend(self.effects.replicas());
        all.push(self.objectives.replica());
        all.extend(self.teams.replicas());
        all.extend(self.scores.replicas());
        all.push(self.progression.replica());
        all.push(self.session.replica());
        all.push(self.reconnect.replica());
        all.extend(self.rooms.replicas());
        all.extend(self.queue.replicas());
        all.extend(self.voting.replicas());
        all
    }

    /// Applies one broadcast to the table it names.
    pub fn apply(&mut self, broadcast: &Broadcast) -> Result<ApplyOutcome, TableError> {
        self.replica_mut(broadcast.module).apply_broadcast(broadcast)
    }

    /// Captures every table, for a node that needs a full resync.
    pub fn full_snapshot(&self) -> Result<Vec<TableSnapshot>, TableError> {
        self.replicas().into_iter().map(|r| r.snapshot()).collect()
    }

    /// Replaces local state with `snapshots`, table by table.
    pub fn restore(&mut self, snapshots: &[TableSnapshot]) -> Result<(), TableError> {
        for snapshot in snapshots {
            self.replica_mut(snapshot.module).restore(snapshot)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Authority-side lifecycle
    // -----------------------------------------------------------------------

    /// Creates lobby-side state for a participant who just joined.
    /// Existing state is kept, so a re-join is harmless.
    pub fn admit(&mut self, w: &mut Writer<'_>, player: PlayerId) -> Result<(), RiftError> {
        self.players.add_participant(w, player)?;
        if self.skills.get_state(player).is_none() {
            self.skills.init_player(w, player)?;
        }
        self.progression.create(w, player)?;
        Ok(())
    }

    /// Spawns `player`'s simulation record on whatever team they belong to.
    pub fn register_player(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        spawn: Vec2,
    ) -> Result<(), RiftError> {
        let team = self.teams.team_of(player);
        self.players.register_player(w, player, team, spawn)?;
        Ok(())
    }

    /// Moves `player` onto `team`. The membership table and the player's
    /// own record are written together.
    pub fn assign_team(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
        team: TeamId,
    ) -> Result<(), RiftError> {
        self.teams.assign_player_to_team(w, player, team)?;
        self.sync_player_team(w, player)
    }

    /// Like [`assign_team`](Self::assign_team), picking the smallest open
    /// team.
    pub fn auto_assign_team(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
    ) -> Result<TeamId, RiftError> {
        let team = self.teams.auto_assign(w, player)?;
        self.sync_player_team(w, player)?;
        Ok(team)
    }

    /// Takes `player` off their team, clearing the team on their record.
    pub fn leave_team(
        &mut self,
        w: &mut Writer<'_>,
        player: PlayerId,
    ) -> Result<Option<TeamId>, RiftError> {
        let left = self.teams.remove_player(w, player)?;
        self.sync_player_team(w, player)?;
        Ok(left)
    }

    fn sync_player_team(&mut self, w: &mut Writer<'_>, player: PlayerId) -> Result<(), RiftError> {
        let team = self.teams.team_of(player);
        match self.players.get_player(player) {
            Some(record) if record.team != team => self.players.set_team(w, player, team)?,
            _ => {}
        }
        Ok(())
    }

    /// Removes every trace of `player` from the session except their
    /// progression record, which outlives the session.
    pub fn evict(&mut self, w: &mut Writer<'_>, player: PlayerId) -> Result<(), RiftError> {
        self.teams.remove_player(w, player)?;
        self.scores.remove_player(w, player)?;
        self.rooms.leave_room(w, player)?;
        self.queue.remove_player(w, player)?;
        self.skills.remove_player(w, player)?;
        self.effects.clear_player(w, player)?;
        self.projectiles.remove_owned_by(w, player)?;
        self.players.remove_player(w, player)?;
        tracing::info!(%player, "participant evicted");
        Ok(())
    }

    /// One authority tick across every module.
    pub fn step(&mut self, w: &mut Writer<'_>, dt: Duration) -> Result<Vec<CoreEvent>, RiftError> {
        let mut events = Vec::new();

        self.session.init(w)?;
        if let Some(change) = self.session.players_ready(w, self.players.ready_count())? {
            events.push(CoreEvent::PhaseChanged(change));
        }
        if let Some(change) = self.session.tick(w, dt)? {
            events.push(CoreEvent::PhaseChanged(change));
        }

        for id in self.skills.tick(w, dt)? {
            events.push(CoreEvent::SkillEnded(id));
        }
        self.effects.tick(w, dt)?;
        for id in self.projectiles.tick(w, dt)? {
            events.push(CoreEvent::ProjectileRemoved(id));
        }
        for capture in self.objectives.tick(w, dt)? {
            events.push(CoreEvent::ObjectiveCaptured(capture));
        }

        let players = &self.players;
        let queued = self.queue.tick(w, &mut self.ids, dt, |p| {
            players.get_participant(p).is_none_or(|s| s.connected)
        })?;
        events.extend(queued.torn_down.into_iter().map(CoreEvent::MatchTornDown));
        events.extend(queued.timed_out.into_iter().map(CoreEvent::QueueTimedOut));
        events.extend(queued.formed.into_iter().map(CoreEvent::MatchFormed));

        if let Some(map) = self.voting.tick(w)? {
            events.push(CoreEvent::MapChosen(map));
        }

        for player in self.reconnect.expire_stale(w)? {
            self.evict(w, player)?;
            events.push(CoreEvent::Evicted(player));
        }

        tracing::trace!(events = events.len(), "world stepped");
        Ok(events)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_player(&self, player: PlayerId) -> Option<&PlayerRecord> {
        self.players.get_player(player)
    }

    pub fn get_team(&self, team: TeamId) -> Option<&TeamRecord> {
        self.teams.get_team(team)
    }

    /// Living players on `team`, by the membership table.
    pub fn alive_in_team(&self, team: TeamId) -> usize {
        self.teams
            .members(team)
            .into_iter()
            .filter(|p| self.players.get_player(*p).is_some_and(|r| r.alive))
            .count()
    }

    pub fn get_room(&self, room: RoomId) -> Option<&RoomRecord> {
        self.rooms.get_room(room)
    }

    pub fn get_vote(&self, map: &MapId) -> Option<&VoteTally> {
        self.voting.get_vote(map)
    }

    pub fn get_match(&self, id: MatchId) -> Option<&ActiveMatch> {
        self.queue.get_match(id)
    }

    /// The current match phase.
    pub fn phase(&self) -> MatchPhase {
        self.session.phase()
    }
}

fn first<'a>([a, _]: [&'a mut dyn Replica; 2]) -> &'a mut dyn Replica {
    a
}

fn second<'a>([_, b]: [&'a mut dyn Replica; 2]) -> &'a mut dyn Replica {
    b
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_room::RoomSettings;
    use rift_table::Outbox;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn world() -> World {
        World::new(&CoreConfig::default())
    }

    fn arena() -> RoomSettings {
        RoomSettings::new("A", "tdm", "arena", 4)
    }

    #[test]
    fn test_full_snapshot_covers_every_table() {
        let world = world();
        let snapshots = world.full_snapshot().unwrap();
        assert_eq!(snapshots.len(), 22);
    }

    #[test]
    fn test_apply_routes_to_named_table() {
        let mut authority = world();
        let mut replica = world();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        authority.admit(&mut w, pid(1)).unwrap();
        authority.teams.create_team(&mut w, TeamId(0), "red").unwrap();

        for b in outbox.drain() {
            assert_eq!(replica.apply(&b).unwrap(), ApplyOutcome::Applied);
        }

        assert!(replica.players.get_participant(pid(1)).is_some());
        assert!(replica.skills.get_state(pid(1)).is_some());
        assert_eq!(replica.get_team(TeamId(0)).unwrap().name, "red");
    }

    #[test]
    fn test_restore_from_full_snapshot_matches_authority() {
        let mut authority = world();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        authority.admit(&mut w, pid(1)).unwrap();
        authority
            .players
            .register_player(&mut w, pid(1), None, Vec2::new(3.0, 4.0))
            .unwrap();
        let room = authority
            .rooms
            .create_room(&mut w, &mut authority.ids, arena())
            .unwrap();
        authority.rooms.join_room(&mut w, pid(1), room).unwrap();

        let mut late = world();
        late.restore(&authority.full_snapshot().unwrap()).unwrap();

        assert_eq!(late.get_player(pid(1)), authority.get_player(pid(1)));
        assert_eq!(late.get_room(room), authority.get_room(room));
    }

    #[test]
    fn test_evict_cascades_everywhere() {
        let mut world = world();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        world.admit(&mut w, pid(1)).unwrap();
        world.teams.create_team(&mut w, TeamId(0), "red").unwrap();
        world.assign_team(&mut w, pid(1), TeamId(0)).unwrap();
        let room = world
            .rooms
            .create_room(&mut w, &mut world.ids, arena())
            .unwrap();
        world.rooms.join_room(&mut w, pid(1), room).unwrap();
        world.queue.enqueue(&mut w, pid(1), "tdm", None, 1000).unwrap();

        world.evict(&mut w, pid(1)).unwrap();

        assert_eq!(world.get_team(TeamId(0)).unwrap().size, 0);
        assert!(world.get_room(room).is_none());
        assert!(!world.queue.is_queued(pid(1)));
        assert!(world.players.get_participant(pid(1)).is_none());
        assert!(world.skills.get_state(pid(1)).is_none());
        assert!(world.progression.get(pid(1)).is_some());
    }

    #[test]
    fn test_step_starts_preparation_when_enough_ready() {
        let mut world = world();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        for id in 1..=2 {
            world.admit(&mut w, pid(id)).unwrap();
            world.players.set_ready(&mut w, pid(id), true).unwrap();
        }

        let events = world.step(&mut w, Duration::from_millis(16)).unwrap();

        assert!(events.iter().any(|e| matches!(
            e,
            CoreEvent::PhaseChanged(c) if c.to == MatchPhase::Preparation
        )));
        assert_eq!(world.phase(), MatchPhase::Preparation);
    }

    #[test]
    fn test_assign_team_updates_player_record() {
        let mut world = world();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        world.teams.create_team(&mut w, TeamId(0), "red").unwrap();
        world.teams.create_team(&mut w, TeamId(1), "blue").unwrap();
        world.register_player(&mut w, pid(1), Vec2::ZERO).unwrap();

        world.assign_team(&mut w, pid(1), TeamId(0)).unwrap();
        world.assign_team(&mut w, pid(1), TeamId(1)).unwrap();

        assert_eq!(world.get_player(pid(1)).unwrap().team, Some(TeamId(1)));
        assert_eq!(world.alive_in_team(TeamId(0)), 0);
        assert_eq!(world.alive_in_team(TeamId(1)), 1);

        world.leave_team(&mut w, pid(1)).unwrap();
        assert_eq!(world.get_player(pid(1)).unwrap().team, None);
    }

    #[test]
    fn test_register_player_takes_team_from_membership() {
        let mut world = world();
        let mut outbox = Outbox::new();
        let mut w = Writer::authority(&mut outbox, Duration::ZERO);
        world.teams.create_team(&mut w, TeamId(0), "red").unwrap();
        world.auto_assign_team(&mut w, pid(1)).unwrap();
        world.auto_assign_team(&mut w, pid(2)).unwrap();

        world.register_player(&mut w, pid(1), Vec2::ZERO).unwrap();
        world.register_player(&mut w, pid(2), Vec2::ZERO).unwrap();
        world.players.apply_damage(&mut w, pid(2), 500.0).unwrap();

        assert_eq!(world.get_player(pid(1)).unwrap().team, Some(TeamId(0)));
        assert_eq!(world.alive_in_team(TeamId(0)), 1);
    }
}
