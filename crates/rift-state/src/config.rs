//! Tunables shared by the gameplay state modules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SkillDefinition
// ---------------------------------------------------------------------------

/// Static data for the skill bound to one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    pub slot: usize,
    pub name: String,
    pub cooldown: Duration,
    pub energy_cost: f32,
    /// How long the spawned skill instance stays alive.
    pub duration: Duration,
}

impl SkillDefinition {
    pub fn new(
        slot: usize,
        name: impl Into<String>,
        cooldown: Duration,
        energy_cost: f32,
        duration: Duration,
    ) -> Self {
        Self {
            slot,
            name: name.into(),
            cooldown,
            energy_cost,
            duration,
        }
    }
}

// ---------------------------------------------------------------------------
// StateConfig
// ---------------------------------------------------------------------------

/// Limits and rates for players, skills, teams, scores, and objectives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub max_health: f32,
    pub max_energy: f32,
    pub energy_regen_per_sec: f32,

    /// Number of skill slots each player has. Slots without a
    /// definition in `skills` start disabled.
    pub skill_slots: usize,
    pub skills: Vec<SkillDefinition>,

    pub max_team_size: usize,

    /// Upper bound on how fast a player's score may grow, measured in
    /// simulation time between two accepted updates.
    pub max_score_per_second: f32,

    /// Length of each team's replicated top-scorer list.
    pub top_scorers: usize,

    /// Capture progress gained per second by a sole team on a point.
    pub capture_rate_per_sec: f32,

    pub projectile_lifetime: Duration,
    pub max_bounces: u32,
}

impl StateConfig {
    /// The definition bound to `slot`, if any.
    pub fn skill(&self, slot: usize) -> Option<&SkillDefinition> {
        self.skills.iter().find(|s| s.slot == slot)
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            max_energy: 100.0,
            energy_regen_per_sec: 5.0,
            skill_slots: 8,
            skills: vec![
                SkillDefinition::new(
                    0,
                    "dash",
                    Duration::from_secs(3),
                    20.0,
                    Duration::from_millis(200),
                ),
                SkillDefinition::new(
                    1,
                    "shield",
                    Duration::from_secs(8),
                    40.0,
                    Duration::from_secs(2),
                ),
                SkillDefinition::new(
                    2,
                    "burst",
                    Duration::from_secs(5),
                    30.0,
                    Duration::from_millis(500),
                ),
            ],
            max_team_size: 4,
            max_score_per_second: 50.0,
            top_scorers: 3,
            capture_rate_per_sec: 0.2,
            projectile_lifetime: Duration::from_secs(5),
            max_bounces: 3,
        }
    }
}
