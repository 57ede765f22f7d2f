//! Dense reward shaping from consecutive observations.
//!
//! Every component compares one feature between the previous and current
//! observation and fires independently; several may fire on the same step
//! (a killing blow that also ends the floor pays both `kill` and
//! `floor_climb`). Terminal and milestone bonuses are not computed here.

use crate::engine::ScreenState;
use crate::observation::Observation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const HP_LOSS: &str = "hp_loss";
pub const STRENGTH_GAIN: &str = "strength_gain";
pub const KILL: &str = "kill";
pub const DAMAGE: &str = "damage";
pub const GOLD: &str = "gold";
pub const FLOOR_CLIMB: &str = "floor_climb";
pub const DECK_THIN: &str = "deck_thin";

/// Coefficients of the shaped reward components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    /// Multiplies the (negative) HP-ratio delta.
    pub hp_loss: f64,
    /// Per point of strength gained.
    pub strength_gain: f64,
    /// Per monster killed.
    pub kill: f64,
    /// Multiplies the drop in summed monster HP ratio.
    pub damage: f64,
    /// Multiplies the normalized gold gained (gold / 1000).
    pub gold: f64,
    /// Multiplies the normalized floor delta (floor / 50); 50 pays 1.0 per floor.
    pub floor_climb: f64,
    /// Multiplies the normalized deck-size drop (cards / 50); 25 pays 0.5 per card.
    pub deck_thin: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            hp_loss: 5.0,
            strength_gain: 0.2,
            kill: 1.0,
            damage: 2.0,
            gold: 10.0,
            floor_climb: 50.0,
            deck_thin: 25.0,
        }
    }
}

/// Total reward plus its named contributions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RewardBreakdown {
    pub total: f64,
    pub components: BTreeMap<&'static str, f64>,
}

impl RewardBreakdown {
    pub fn add(&mut self, name: &'static str, value: f64) {
        self.total += value;
        *self.components.entry(name).or_insert(0.0) += value;
    }

    pub fn get(&self, name: &str) -> f64 {
        self.components.get(name).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Pure reward function over observation pairs.
#[derive(Debug, Clone, Default)]
pub struct RewardShaper {
    weights: RewardWeights,
}

impl RewardShaper {
    pub fn new(weights: RewardWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RewardWeights {
        &self.weights
    }

    /// Shape the transition `prev -> curr`.
    ///
    /// `prev_screen` and `screen` are the engine screens before and after the
    /// action. Deck thinning only counts when both are outside combat: in
    /// battle the draw pile shrinks on every draw, and leaving a fight
    /// compares an in-combat pile with the deck.
    pub fn shape(
        &self,
        prev_screen: ScreenState,
        screen: ScreenState,
        prev: &Observation,
        curr: &Observation,
    ) -> RewardBreakdown {
        let w = &self.weights;
        let mut out = RewardBreakdown::default();

        let hp_delta = delta(prev.hp_ratio(), curr.hp_ratio());
        if hp_delta < 0.0 {
            out.add(HP_LOSS, hp_delta * w.hp_loss);
        }

        let str_delta = delta(prev.strength(), curr.strength());
        if str_delta > 0.0 {
            out.add(STRENGTH_GAIN, str_delta * w.strength_gain);
        }

        let (alive_prev, alive_curr) = (prev.alive_count(), curr.alive_count());
        if alive_curr < alive_prev {
            out.add(KILL, (alive_prev - alive_curr) as f64 * w.kill);
        }

        let hp_drop = delta(curr.monster_hp_sum(), prev.monster_hp_sum());
        if hp_drop > 0.0 {
            out.add(DAMAGE, hp_drop * w.damage);
        }

        let gold_delta = delta(prev.gold(), curr.gold());
        if gold_delta > 0.0 {
            out.add(GOLD, gold_delta * w.gold);
        }

        let floor_delta = delta(prev.floor(), curr.floor());
        if floor_delta > 0.0 {
            out.add(FLOOR_CLIMB, floor_delta * w.floor_climb);
        }

        if !prev_screen.is_battle() && !screen.is_battle() {
            let deck_drop = delta(curr.draw_pile(), prev.draw_pile());
            if deck_drop > 0.0 {
                out.add(DECK_THIN, deck_drop * w.deck_thin);
            }
        }

        out
    }
}

/// `to - from`, widened before subtracting.
fn delta(from: f32, to: f32) -> f64 {
    to as f64 - from as f64
}
