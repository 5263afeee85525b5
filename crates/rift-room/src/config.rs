//! Lobby configuration: matchmaking cadence and the map pool.

use std::time::Duration;

use rift_protocol::MapId;
use serde::{Deserialize, Serialize};

/// A map players can vote for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    pub id: MapId,
    pub name: String,
    /// Only maps in rotation become voting candidates.
    pub in_rotation: bool,
}

impl MapInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: MapId::new(id),
            name: name.into(),
            in_rotation: true,
        }
    }
}

/// Matchmaking and voting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Ready entries needed to form one match. Split evenly into two
    /// rosters, so it should be even.
    pub party_size: usize,

    /// How often the queue is grouped.
    pub matchmaking_interval_secs: u64,

    /// Entries older than this are dropped from the queue.
    pub max_queue_wait_secs: u64,

    /// Voting candidates, in registration order. Ties go to the earlier
    /// map.
    pub maps: Vec<MapInfo>,
}

impl LobbyConfig {
    /// How often the queue tries to form matches.
    pub fn matchmaking_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking_interval_secs)
    }

    /// Entries older than this are dropped on the next pass.
    pub fn max_queue_wait(&self) -> Duration {
        Duration::from_secs(self.max_queue_wait_secs)
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            party_size: 8,
            matchmaking_interval_secs: 1,
            max_queue_wait_secs: 300,
            maps: vec![
                MapInfo::new("arena", "Arena"),
                MapInfo::new("docks", "Docks"),
                MapInfo::new("foundry", "Foundry"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_config_default() {
        let config = LobbyConfig::default();
        assert_eq!(config.party_size, 8);
        assert_eq!(config.matchmaking_interval(), Duration::from_secs(1));
        assert_eq!(config.maps.len(), 3);
        assert!(config.maps.iter().all(|m| m.in_rotation));
    }
}
