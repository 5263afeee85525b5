//! Match pacing and reconnection window.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timings for the match phase machine and the reconnect window.
///
/// Durations are whole seconds so they read naturally in config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Ready participants needed before Preparation starts.
    pub min_players: usize,

    pub preparation_secs: u64,

    /// Length of one round. The round ends when this runs out or a
    /// victory is reported, whichever comes first.
    pub round_secs: u64,

    /// Pause between the end of a round and the next Preparation.
    pub round_end_delay_secs: u64,

    /// Round wins a team needs to end the match.
    pub rounds_to_win: u32,

    /// How long a disconnected participant has to come back before they
    /// are evicted. Default: 30 seconds.
    pub reconnect_timeout_secs: u64,
}

impl SessionConfig {
    /// Countdown between enough players readying up and the round.
    pub fn preparation(&self) -> Duration {
        Duration::from_secs(self.preparation_secs)
    }

    pub fn round(&self) -> Duration {
        Duration::from_secs(self.round_secs)
    }

    pub fn round_end_delay(&self) -> Duration {
        Duration::from_secs(self.round_end_delay_secs)
    }

    /// How long a dropped participant may take to come back.
    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.reconnect_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            preparation_secs: 5,
            round_secs: 120,
            round_end_delay_secs: 5,
            rounds_to_win: 3,
            reconnect_timeout_secs: 30,
        }
    }
}
