//! Aggregate configuration for a Rift session.

use rift_room::LobbyConfig;
use rift_session::SessionConfig;
use rift_state::StateConfig;
use rift_tick::TickConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::RiftError;

/// Everything a [`RiftCore`](crate::RiftCore) needs, one section per layer.
///
/// ```json
/// {
///   "tick":    { "tick_rate_hz": 30 },
///   "session": { "rounds_to_win": 2 },
///   "lobby":   { "party_size": 4 }
/// }
/// ```
///
/// Missing sections and fields take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub tick: TickConfig,
    pub state: StateConfig,
    pub session: SessionConfig,
    pub lobby: LobbyConfig,
}

impl CoreConfig {
    /// Parses a JSON document and runs it through [`validated`](Self::validated).
    pub fn from_json_str(json: &str) -> Result<Self, RiftError> {
        let config: Self = serde_json::from_str(json).map_err(RiftError::Config)?;
        Ok(config.validated())
    }

    /// Clamps out-of-range values so the config is safe to run with.
    ///
    /// - tick rate capped at 128 Hz
    /// - party size at least 2 and even
    /// - team size at least 1
    pub fn validated(mut self) -> Self {
        self.tick = self.tick.validated();

        let party = self.lobby.party_size;
        let fixed = party.max(2) & !1;
        if fixed != party {
            warn!(party_size = party, using = fixed, "party size must be even and at least 2");
            self.lobby.party_size = fixed;
        }

        if self.state.max_team_size == 0 {
            warn!("max_team_size of 0 would reject every assignment, using 1");
            self.state.max_team_size = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_str_empty_uses_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config.tick.tick_rate_hz, 60);
        assert_eq!(config.session.reconnect_timeout_secs, 30);
        assert_eq!(config.lobby.party_size, 8);
        assert_eq!(config.state.max_team_size, 4);
    }

    #[test]
    fn test_from_json_str_partial_section() {
        let config =
            CoreConfig::from_json_str(r#"{ "session": { "rounds_to_win": 2 } }"#).unwrap();
        assert_eq!(config.session.rounds_to_win, 2);
        assert_eq!(config.session.min_players, 2);
    }

    #[test]
    fn test_from_json_str_malformed_is_config_error() {
        let result = CoreConfig::from_json_str("{ tick: ");
        assert!(matches!(result, Err(RiftError::Config(_))));
    }

    #[test]
    fn test_validated_fixes_party_and_team_size() {
        let mut config = CoreConfig::default();
        config.lobby.party_size = 7;
        config.state.max_team_size = 0;
        config.tick.tick_rate_hz = 1000;

        let config = config.validated();

        assert_eq!(config.lobby.party_size, 6);
        assert_eq!(config.state.max_team_size, 1);
        assert_eq!(config.tick.tick_rate_hz, 128);
    }

    #[test]
    fn test_validated_party_size_one_becomes_two() {
        let mut config = CoreConfig::default();
        config.lobby.party_size = 1;
        assert_eq!(config.validated().lobby.party_size, 2);
    }
}
