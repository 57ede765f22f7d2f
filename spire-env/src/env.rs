//! The episode controller: one synchronous RL environment over one engine.

use crate::config::EnvConfig;
use crate::engine::{EngineError, EngineFactory, GameEngine, ScreenState};
use crate::episode::{
    EpisodeContext, Terminal, Truncation, FLOOR_STALL, INVALID_ACTION, TIME_COST,
};
use crate::mask::{action_mask, Action, ActionMask};
use crate::metrics::EpisodeMetrics;
use crate::observation::{encode_engine, Observation};
use crate::reward::{RewardBreakdown, RewardShaper};
use crate::screens::{recovery_sweep, ScreenNavigator};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

/// Engine seeds drawn when reset is called without one lie in `0..SEED_RANGE`.
pub const SEED_RANGE: u64 = 10_000;

/// Why an action was refused. Refused actions earn the invalid-action penalty.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidAction {
    #[error("action {0} is outside the action space")]
    OutOfRange(usize),
    #[error("action {action} is not available on {screen:?}")]
    WrongScreen { action: usize, screen: ScreenState },
    #[error("no card in hand slot {0}")]
    EmptySlot(usize),
    #[error("card in slot {slot} costs {cost} with {energy} energy left")]
    InsufficientEnergy { slot: usize, cost: i32, energy: i32 },
    #[error(transparent)]
    Rejected(#[from] EngineError),
}

/// Diagnostics attached to every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepInfo {
    pub floor: i32,
    /// Current HP as a percentage of max HP.
    pub hp_percent: f64,
    pub error: Option<String>,
    pub components: BTreeMap<&'static str, f64>,
    pub victory: bool,
    /// A forced recovery sweep ran instead of the screen handler.
    pub recovered: bool,
    pub gold_gained: i32,
    pub terminal: Option<Terminal>,
    pub truncation: Option<Truncation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// Gym-style environment: `reset`, `step`, `action_masks`.
///
/// Owns its engine, RNG and episode state; nothing is shared between
/// instances. A fresh engine comes from the factory on every reset.
pub struct SpireEnv<F: EngineFactory> {
    factory: F,
    engine: F::Engine,
    config: EnvConfig,
    rng: StdRng,
    seed: u64,
    obs: Observation,
    ctx: EpisodeContext,
    shaper: RewardShaper,
    navigator: ScreenNavigator,
    metrics: EpisodeMetrics,
}

impl<F: EngineFactory> SpireEnv<F> {
    /// Build the environment and start the first episode.
    ///
    /// `config.seed` seeds both the RNG and the first engine; without it the
    /// RNG comes from entropy.
    pub fn new(mut factory: F, config: EnvConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let seed = config
            .seed
            .unwrap_or_else(|| rng.gen_range(0..SEED_RANGE));
        let engine = factory.create(seed);
        let obs = encode_engine(&engine);
        let ctx = EpisodeContext::new(engine.screen_state(), engine.floor_num(), engine.gold());
        log::info!("Environment ready (seed {}, floor {})", seed, ctx.last_floor);

        Self {
            factory,
            engine,
            rng,
            seed,
            obs,
            ctx,
            shaper: RewardShaper::new(config.reward.clone()),
            navigator: ScreenNavigator::from_config(&config),
            metrics: EpisodeMetrics::default(),
            config,
        }
    }

    /// Start a new episode on a fresh engine.
    ///
    /// A given seed also reseeds the environment's RNG, so the episode is
    /// reproducible; otherwise the engine seed is drawn from the RNG.
    pub fn reset(&mut self, seed: Option<u64>) -> Observation {
        let seed = match seed {
            Some(seed) => {
                self.rng = StdRng::seed_from_u64(seed);
                seed
            }
            None => self.rng.gen_range(0..SEED_RANGE),
        };
        self.engine = self.factory.create(seed);
        self.seed = seed;
        self.obs = encode_engine(&self.engine);
        self.ctx = EpisodeContext::new(
            self.engine.screen_state(),
            self.engine.floor_num(),
            self.engine.gold(),
        );
        self.metrics = EpisodeMetrics::default();
        log::debug!("Reset (seed {})", seed);
        self.obs
    }

    /// Advance one step. Never fails; problems surface in `info.error`.
    #[instrument(skip_all, name = "env_step")]
    pub fn step(&mut self, action: usize) -> StepResult {
        let started = Instant::now();
        self.ctx.tick();
        let screen = self.engine.screen_state();
        self.ctx.observe_screen(screen);

        let mut info = StepInfo::default();
        let mut reward = RewardBreakdown::default();
        let mut terminated = false;
        let mut valid = true;

        match self.apply(screen, action, &mut info) {
            Err(err) => {
                log::debug!("Invalid action {} on {:?}: {}", action, screen, err);
                self.metrics.invalid_actions += 1;
                if matches!(err, InvalidAction::Rejected(_)) {
                    self.metrics.engine_rejections += 1;
                }
                reward.add(INVALID_ACTION, self.config.invalid_action_penalty);
                info.error = Some(err.to_string());
                valid = false;
            }
            Ok(()) => {
                let curr = encode_engine(&self.engine);
                reward.add(TIME_COST, self.config.step_time_cost);
                let shaped = self
                    .shaper
                    .shape(screen, self.engine.screen_state(), &self.obs, &curr);
                for (name, value) in shaped.components {
                    reward.add(name, value);
                }
                self.obs = curr;

                let floor = self.engine.floor_num();
                self.ctx.observe_floor(floor);
                info.gold_gained = self.ctx.observe_gold(self.engine.gold()).max(0);

                let terminal = Terminal::classify(
                    &self.config,
                    self.engine.cur_hp(),
                    self.engine.outcome(),
                    floor,
                );
                match terminal {
                    Some(t) => {
                        reward.add(t.component(), t.bonus(&self.config));
                        info.victory = t == Terminal::Victory;
                        info.terminal = Some(t);
                        terminated = true;
                    }
                    None => {
                        for (name, bonus) in self.ctx.claim_milestones(&self.config, floor) {
                            log::info!("Milestone {} on floor {}", name, floor);
                            reward.add(name, bonus);
                        }
                    }
                }
            }
        }

        let truncation = if terminated {
            None
        } else {
            self.ctx.truncation(&self.config)
        };
        // An invalid step pays exactly the invalid-action penalty.
        if valid && truncation == Some(Truncation::FloorBudget) {
            reward.add(FLOOR_STALL, self.config.floor_stall_penalty);
        }
        info.truncation = truncation;
        let truncated = truncation.is_some();

        info.floor = self.engine.floor_num();
        info.hp_percent =
            self.engine.cur_hp() as f64 / self.engine.max_hp().max(1) as f64 * 100.0;
        info.components = reward.components;

        self.metrics.steps += 1;
        self.metrics.total_reward += reward.total;
        self.metrics.max_floor = self.metrics.max_floor.max(info.floor);
        self.metrics.step_time += started.elapsed();
        if truncated {
            self.metrics.truncations += 1;
        }
        if terminated || truncated {
            log::info!(
                "Episode over after {} steps: floor {}, reward {:.2}, terminal {:?}, truncation {:?}",
                self.metrics.steps,
                info.floor,
                self.metrics.total_reward,
                info.terminal,
                info.truncation
            );
        }

        StepResult {
            observation: self.obs,
            reward: reward.total,
            terminated,
            truncated,
            info,
        }
    }

    fn apply(
        &mut self,
        screen: ScreenState,
        action: usize,
        info: &mut StepInfo,
    ) -> Result<(), InvalidAction> {
        let decoded = Action::from_code(action).ok_or(InvalidAction::OutOfRange(action))?;

        if screen.is_battle() {
            return match decoded {
                Action::PlayCard { slot } => self.play_card(slot),
                Action::EndTurn => {
                    if let Err(e) = self.engine.end_turn() {
                        log::warn!("End turn refused: {}", e);
                        self.metrics.engine_rejections += 1;
                    }
                    Ok(())
                }
                Action::Proceed | Action::Reserved(_) => {
                    Err(InvalidAction::WrongScreen { action, screen })
                }
            };
        }

        match decoded {
            Action::PlayCard { .. } | Action::EndTurn => {
                Err(InvalidAction::WrongScreen { action, screen })
            }
            Action::Proceed | Action::Reserved(_) => {
                if self.ctx.is_stuck(self.config.stuck_threshold) {
                    log::warn!(
                        "Stuck on {:?} for {} steps; forcing recovery",
                        screen,
                        self.ctx.repeat_count
                    );
                    recovery_sweep(&mut self.engine, &mut self.rng, self.config.map_width);
                    self.ctx.clear_stuck();
                    self.metrics.recoveries += 1;
                    info.recovered = true;
                } else if let Err(e) = self
                    .navigator
                    .handle(screen, &mut self.engine, &mut self.rng)
                {
                    log::warn!("No handler progress on {:?}: {}", screen, e);
                    self.metrics.engine_rejections += 1;
                }
                Ok(())
            }
        }
    }

    fn play_card(&mut self, slot: usize) -> Result<(), InvalidAction> {
        let hand = self.engine.hand();
        let card = hand.get(slot).ok_or(InvalidAction::EmptySlot(slot))?;
        let energy = self.engine.energy();
        if card.cost > energy {
            return Err(InvalidAction::InsufficientEnergy {
                slot,
                cost: card.cost,
                energy,
            });
        }
        let target = self
            .obs
            .alive_monsters()
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(0);
        self.engine.play_card(slot, target)?;
        Ok(())
    }

    /// Valid actions for the current screen, judged against the last observation.
    pub fn action_masks(&self) -> ActionMask {
        action_mask(self.engine.screen_state(), &self.engine.hand(), &self.obs)
    }

    pub fn observation(&self) -> &Observation {
        &self.obs
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn context(&self) -> &EpisodeContext {
        &self.ctx
    }

    pub fn metrics(&self) -> &EpisodeMetrics {
        &self.metrics
    }

    /// Engine seed of the current episode.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn engine(&self) -> &F::Engine {
        &self.engine
    }

    /// Direct engine access, for debug hooks in tests and audits.
    pub fn engine_mut(&mut self) -> &mut F::Engine {
        &mut self.engine
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{END_TURN, PROCEED};
    use crate::reward::{GOLD, HP_LOSS, KILL};
    use crate::testing::{EngineCall, MockEngineBuilder, MockMonster};

    fn env_with(builder: MockEngineBuilder) -> SpireEnv<crate::testing::MockFactory> {
        SpireEnv::new(builder.factory(), EnvConfig::default().with_seed(42))
    }

    #[test]
    fn test_new_runs_initial_reset() {
        let env = env_with(MockEngineBuilder::new());
        assert_eq!(env.factory().created, vec![42]);
        assert_eq!(env.seed(), 42);
        assert!((env.observation().hp_ratio() - 1.0).abs() < 1e-6);
        assert_eq!(env.context().step_count, 0);
    }

    #[test]
    fn test_reset_seeding() {
        let mut env = env_with(MockEngineBuilder::new());
        env.reset(Some(7));
        assert_eq!(env.seed(), 7);
        env.reset(None);
        assert!(env.seed() < SEED_RANGE);

        // Same explicit seed, same drawn follow-up seed.
        env.reset(Some(11));
        env.reset(None);
        let first = env.seed();
        env.reset(Some(11));
        env.reset(None);
        assert_eq!(env.seed(), first);
    }

    #[test]
    fn test_invalid_action_keeps_observation() {
        let mut env = env_with(MockEngineBuilder::new());
        let before = *env.observation();
        let result = env.step(3);
        assert_eq!(result.observation, before);
        assert_eq!(result.reward, -0.1);
        assert!(!result.terminated && !result.truncated);
        assert!(result.info.error.is_some());
        assert_eq!(result.info.components.len(), 1);
        assert!(env.engine().calls.is_empty());
        assert_eq!(env.metrics().invalid_actions, 1);
    }

    #[test]
    fn test_out_of_range_action() {
        let mut env = env_with(MockEngineBuilder::new());
        let result = env.step(99);
        assert_eq!(result.reward, -0.1);
        assert!(result.info.error.unwrap().contains("outside"));
    }

    #[test]
    fn test_battle_rejects_proceed() {
        let mut env = env_with(MockEngineBuilder::new().in_battle(vec![MockMonster::new(20, 5)]));
        for action in [PROCEED, 12, 14] {
            let r = env.step(action);
            assert_eq!(r.reward, -0.1);
        }
        assert!(env.engine().calls.is_empty());
    }

    #[test]
    fn test_empty_slot_and_energy() {
        let mut env = env_with(
            MockEngineBuilder::new()
                .in_battle(vec![MockMonster::new(20, 5)])
                .energy(1),
        );
        // Slot 3 holds Bash (cost 2).
        let r = env.step(3);
        assert!(r.info.error.unwrap().contains("costs 2"));
        let r = env.step(9);
        assert!(r.info.error.unwrap().contains("slot 9"));
        assert!(env.engine().calls.is_empty());
    }

    #[test]
    fn test_engine_rejected_play_is_invalid() {
        let mut env = env_with(
            MockEngineBuilder::new()
                .in_battle(vec![MockMonster::new(20, 5)])
                .reject("play_card"),
        );
        let r = env.step(0);
        assert_eq!(r.reward, -0.1);
        assert_eq!(env.metrics().engine_rejections, 1);
    }

    #[test]
    fn test_card_targets_alive_monster() {
        let mut dead = MockMonster::new(20, 5);
        dead.cur_hp = 0;
        let mut env = env_with(
            MockEngineBuilder::new().in_battle(vec![dead, MockMonster::new(30, 5)]),
        );
        let r = env.step(0);
        assert!(r.info.error.is_none());
        assert_eq!(
            env.engine().calls,
            vec![EngineCall::PlayCard { slot: 0, target: 1 }]
        );
        assert!(r.info.components.contains_key(crate::reward::DAMAGE));
    }

    #[test]
    fn test_end_turn_damage_is_shaped() {
        let mut env = env_with(
            MockEngineBuilder::new().in_battle(vec![MockMonster::new(30, 16)]),
        );
        let r = env.step(END_TURN);
        // 80 -> 64 HP: ratio drops 0.2, times 5.
        assert!((r.info.components[HP_LOSS] + 1.0).abs() < 1e-5);
        assert!((r.reward - (-1.01)).abs() < 1e-5);
        assert!((r.info.hp_percent - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_kill_pays_kill_and_gold_later() {
        let mut env = env_with(
            MockEngineBuilder::new()
                .in_battle(vec![MockMonster::new(6, 5)])
                .card_damage(6),
        );
        let r = env.step(0);
        assert_eq!(r.info.components[KILL], 1.0);
        assert_eq!(env.engine().screen, ScreenState::Rewards);

        // Card reward first, then gold.
        env.step(PROCEED);
        let r = env.step(PROCEED);
        assert_eq!(r.info.gold_gained, 25);
        assert!((r.info.components[GOLD] - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_death_terminates() {
        let mut env = env_with(
            MockEngineBuilder::new()
                .in_battle(vec![MockMonster::new(30, 50)])
                .hp(10, 80),
        );
        let r = env.step(END_TURN);
        assert!(r.terminated);
        assert_eq!(r.info.terminal, Some(Terminal::Death));
        assert_eq!(r.info.components[crate::episode::DEATH], -10.0);
    }

    #[test]
    fn test_stuck_screen_forces_recovery() {
        let mut env = env_with(MockEngineBuilder::new().screen(ScreenState::Rewards).frozen());
        let mut recovered_at = None;
        for i in 0..8 {
            let r = env.step(PROCEED);
            assert!(r.info.error.is_none());
            if r.info.recovered {
                recovered_at = Some(i);
                break;
            }
        }
        // Step i sees repeat count i + 1; the sixth step is the first above 5.
        assert_eq!(recovered_at, Some(5));
        assert_eq!(env.context().repeat_count, 0);
        assert_eq!(env.metrics().recoveries, 1);
    }

    #[test]
    fn test_action_masks_follow_screen() {
        let env = env_with(MockEngineBuilder::new());
        assert_eq!(crate::mask::valid_actions(&env.action_masks()), vec![PROCEED]);

        let env = env_with(
            MockEngineBuilder::new()
                .in_battle(vec![MockMonster::new(20, 5)])
                .energy(1),
        );
        assert_eq!(
            crate::mask::valid_actions(&env.action_masks()),
            vec![0, 1, 2, 4, END_TURN]
        );
    }
}
