use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counters for one episode. Reset with the environment.
#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    pub steps: u64,
    pub total_reward: f64,
    /// Actions answered with the invalid-action penalty.
    pub invalid_actions: u64,
    /// Engine calls refused, whether or not the action stayed valid.
    pub engine_rejections: u64,
    /// Forced recovery sweeps run.
    pub recoveries: u64,
    pub truncations: u64,
    pub max_floor: i32,
    /// Time spent inside `step`
    pub step_time: Duration,
}

impl EpisodeMetrics {
    pub fn step_avg_us(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.step_time.as_secs_f64() * 1_000_000.0 / self.steps as f64
        }
    }

    pub fn invalid_rate(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.invalid_actions as f64 / self.steps as f64
        }
    }

    pub fn reward_per_step(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.total_reward / self.steps as f64
        }
    }
}
