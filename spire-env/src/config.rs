use crate::map::MapWeights;
use crate::reward::RewardWeights;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Environment configuration.
///
/// Every field has a default, so a config file only needs the overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Episode-wide step budget; reaching it truncates.
    pub max_steps: u32,
    /// Step budget per floor; reaching it truncates and applies `floor_stall_penalty`.
    pub max_floor_steps: u32,
    /// Consecutive same-screen steps tolerated before forced recovery.
    pub stuck_threshold: u32,

    /// Reward for a rejected action (replaces every other term).
    pub invalid_action_penalty: f64,
    /// Added to every accepted action.
    pub step_time_cost: f64,
    pub death_penalty: f64,
    pub victory_bonus: f64,
    /// Terminate with `act_clear_bonus` once the floor exceeds this.
    ///
    /// `None` plays the whole run; only death or victory terminate.
    pub act_clear_floor: Option<i32>,
    pub act_clear_bonus: f64,
    /// Floors holding an act boss.
    ///
    /// Arriving on one pays `boss_floor_bonus`; arriving on the floor after
    /// pays `act_transition_bonus`.
    pub boss_floors: Vec<i32>,
    pub boss_floor_bonus: f64,
    pub act_transition_bonus: f64,
    pub floor_stall_penalty: f64,

    /// Rest at campfires below this HP ratio, otherwise smith.
    pub rest_hp_threshold: f64,
    /// Columns tried when the engine rejects the routed map node.
    pub map_width: i32,

    pub reward: RewardWeights,
    pub map: MapWeights,

    /// Seed for the first episode and the environment's own RNG.
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            max_steps: 2000,
            max_floor_steps: 300,
            stuck_threshold: 5,
            invalid_action_penalty: -0.1,
            step_time_cost: -0.01,
            death_penalty: -10.0,
            victory_bonus: 50.0,
            act_clear_floor: Some(16),
            act_clear_bonus: 20.0,
            boss_floors: vec![16, 33, 50],
            boss_floor_bonus: 5.0,
            act_transition_bonus: 10.0,
            floor_stall_penalty: -0.5,
            rest_hp_threshold: 0.5,
            map_width: 7,
            reward: RewardWeights::default(),
            map: MapWeights::default(),
            seed: None,
        }
    }
}

impl EnvConfig {
    /// Full-run profile: harsher invalid-action penalty, no act-1 cutoff.
    pub fn hardened() -> Self {
        Self {
            max_steps: 20_000,
            invalid_action_penalty: -1.0,
            act_clear_floor: None,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, ConfigError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open config {}", path.display()))?;
        Self::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn is_boss_floor(&self, floor: i32) -> bool {
        self.boss_floors.contains(&floor)
    }

    pub fn is_act_transition(&self, floor: i32) -> bool {
        self.boss_floors.iter().any(|&boss| boss + 1 == floor)
    }
}
