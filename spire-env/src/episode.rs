//! Per-episode bookkeeping: budgets, screen repetition, and milestones.

use crate::config::EnvConfig;
use crate::engine::{GameOutcome, ScreenState};
use serde::Serialize;
use std::collections::BTreeSet;

pub const INVALID_ACTION: &str = "invalid_action";
pub const TIME_COST: &str = "time_cost";
pub const DEATH: &str = "death";
pub const VICTORY: &str = "victory";
pub const ACT_CLEAR: &str = "act_clear";
pub const BOSS_FLOOR: &str = "boss_floor";
pub const ACT_TRANSITION: &str = "act_transition";
pub const FLOOR_STALL: &str = "floor_stall";

/// Why an episode terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Terminal {
    Death,
    Victory,
    ActClear,
}

impl Terminal {
    /// First matching rule wins: death, then victory, then act clear.
    pub fn classify(
        config: &EnvConfig,
        cur_hp: i32,
        outcome: GameOutcome,
        floor: i32,
    ) -> Option<Self> {
        if cur_hp <= 0 || outcome == GameOutcome::PlayerLoss {
            Some(Terminal::Death)
        } else if outcome == GameOutcome::PlayerVictory {
            Some(Terminal::Victory)
        } else if config.act_clear_floor.is_some_and(|limit| floor > limit) {
            Some(Terminal::ActClear)
        } else {
            None
        }
    }

    pub fn bonus(self, config: &EnvConfig) -> f64 {
        match self {
            Terminal::Death => config.death_penalty,
            Terminal::Victory => config.victory_bonus,
            Terminal::ActClear => config.act_clear_bonus,
        }
    }

    pub fn component(self) -> &'static str {
        match self {
            Terminal::Death => DEATH,
            Terminal::Victory => VICTORY,
            Terminal::ActClear => ACT_CLEAR,
        }
    }
}

/// Budget that cut an episode short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Truncation {
    StepBudget,
    FloorBudget,
}

/// Mutable state of one episode. Replaced wholesale on reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeContext {
    pub step_count: u32,
    pub floor_steps: u32,
    pub last_screen: Option<ScreenState>,
    pub repeat_count: u32,
    pub last_floor: i32,
    pub last_gold: i32,
    awarded_milestones: BTreeSet<i32>,
}

impl EpisodeContext {
    /// Start an episode on `screen`. The starting screen counts as already
    /// seen, so the first step on an unchanged screen is a repeat.
    pub fn new(screen: ScreenState, floor: i32, gold: i32) -> Self {
        Self {
            last_screen: Some(screen),
            last_floor: floor,
            last_gold: gold,
            ..Default::default()
        }
    }

    /// Count one step against both budgets.
    pub fn tick(&mut self) {
        self.step_count += 1;
        self.floor_steps += 1;
    }

    /// Record the screen seen at the start of a step.
    ///
    /// Returns the repeat count: how many consecutive steps in a row have
    /// started on this screen, not counting the first.
    pub fn observe_screen(&mut self, screen: ScreenState) -> u32 {
        if self.last_screen == Some(screen) {
            self.repeat_count += 1;
        } else {
            self.repeat_count = 0;
            self.last_screen = Some(screen);
        }
        self.repeat_count
    }

    pub fn is_stuck(&self, threshold: u32) -> bool {
        self.repeat_count > threshold
    }

    pub fn clear_stuck(&mut self) {
        self.repeat_count = 0;
    }

    /// Record the floor after an action. Resets the floor budget on change.
    pub fn observe_floor(&mut self, floor: i32) -> bool {
        if floor == self.last_floor {
            return false;
        }
        self.last_floor = floor;
        self.floor_steps = 0;
        true
    }

    /// Record gold after an action; returns the change since the last call.
    pub fn observe_gold(&mut self, gold: i32) -> i32 {
        let delta = gold - self.last_gold;
        self.last_gold = gold;
        delta
    }

    /// Milestone bonuses for reaching `floor`, each paid once per episode.
    pub fn claim_milestones(
        &mut self,
        config: &EnvConfig,
        floor: i32,
    ) -> Vec<(&'static str, f64)> {
        let mut paid = Vec::new();
        if config.is_boss_floor(floor) && self.awarded_milestones.insert(floor) {
            paid.push((BOSS_FLOOR, config.boss_floor_bonus));
        }
        if config.is_act_transition(floor) && self.awarded_milestones.insert(floor) {
            paid.push((ACT_TRANSITION, config.act_transition_bonus));
        }
        paid
    }

    pub fn milestone_awarded(&self, floor: i32) -> bool {
        self.awarded_milestones.contains(&floor)
    }

    /// Budget exhausted after the current step, if any. The global budget wins.
    pub fn truncation(&self, config: &EnvConfig) -> Option<Truncation> {
        if self.step_count >= config.max_steps {
            Some(Truncation::StepBudget)
        } else if self.floor_steps >= config.max_floor_steps {
            Some(Truncation::FloorBudget)
        } else {
            None
        }
    }
}
