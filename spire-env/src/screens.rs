//! Heuristic handlers for the non-combat screens, plus forced recovery.
//!
//! The policy only chooses *whether* to proceed on these screens; what
//! proceeding means is decided here. Every handler ends with
//! `regain_control` as its last resort, and no handler ever panics: an
//! `Err` return means the engine refused everything that was tried.

use crate::config::EnvConfig;
use crate::engine::{EngineError, EngineResult, GameEngine, RewardKind, ScreenState};
use crate::map::{MapPathOptimizer, PlayerStats};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::instrument;

/// Relics offered after a boss.
const BOSS_RELIC_CHOICES: usize = 3;
/// Upper bound on event options tried at random.
const EVENT_OPTIONS: usize = 4;
const NEOW_OPTIONS: usize = 4;
const CAMPFIRE_OPTIONS: usize = 2;
const CARD_OPTIONS: usize = 3;

/// Dispatches "proceed" on a non-combat screen.
#[derive(Debug, Clone)]
pub struct ScreenNavigator {
    optimizer: MapPathOptimizer,
    rest_hp_threshold: f64,
    map_width: i32,
}

impl ScreenNavigator {
    pub fn from_config(config: &EnvConfig) -> Self {
        Self {
            optimizer: MapPathOptimizer::new(config.map.clone()),
            rest_hp_threshold: config.rest_hp_threshold,
            map_width: config.map_width,
        }
    }

    pub fn handle<E, R>(&self, screen: ScreenState, engine: &mut E, rng: &mut R) -> EngineResult
    where
        E: GameEngine + ?Sized,
        R: Rng + ?Sized,
    {
        log::debug!("Proceeding on {:?}", screen);
        match screen {
            ScreenState::Map => self.handle_map(engine),
            ScreenState::Rewards => handle_rewards(engine),
            ScreenState::Rest => self.handle_rest(engine),
            ScreenState::Invalid => engine
                .choose_neow_option(0)
                .or_else(|_| engine.regain_control()),
            ScreenState::Event => engine
                .choose_event_option(0)
                .or_else(|_| engine.choose_event_option(rng.gen_range(1..EVENT_OPTIONS)))
                .or_else(|_| engine.regain_control()),
            ScreenState::CardSelect => engine
                .choose_card_option(0)
                .or_else(|_| engine.regain_control()),
            ScreenState::BossRelic => engine
                .choose_boss_relic(rng.gen_range(0..BOSS_RELIC_CHOICES))
                .or_else(|_| engine.choose_boss_relic(0))
                .or_else(|_| engine.regain_control()),
            ScreenState::Treasure => {
                if let Err(e) = engine.choose_treasure_open() {
                    log::debug!("Treasure open refused: {}", e);
                }
                engine.regain_control()
            }
            ScreenState::Shop => engine.regain_control(),
            ScreenState::Battle => Err(EngineError::rejected(
                "proceed",
                "combat needs a card or end turn",
            )),
        }
    }

    fn handle_map<E: GameEngine + ?Sized>(&self, engine: &mut E) -> EngineResult {
        match engine.map_info() {
            Ok(map) => {
                let choice = self
                    .optimizer
                    .best_branch(&map, PlayerStats::from_engine(&*engine));
                match engine.choose_map_node(choice.x) {
                    Ok(()) => return Ok(()),
                    Err(e) => log::warn!("Routed node x={} refused: {}", choice.x, e),
                }
            }
            Err(e) => log::warn!("Map unavailable: {}", e),
        }

        for x in 0..self.map_width {
            if engine.choose_map_node(x).is_ok() {
                log::debug!("Map fallback took x={}", x);
                return Ok(());
            }
        }
        engine.regain_control()
    }

    fn handle_rest<E: GameEngine + ?Sized>(&self, engine: &mut E) -> EngineResult {
        let rested = if engine.hp_ratio() < self.rest_hp_threshold {
            engine.choose_campfire_option(0)
        } else {
            engine
                .choose_campfire_option(1)
                .or_else(|_| engine.choose_campfire_option(0))
        };
        rested.or_else(|_| engine.regain_control())
    }
}

fn handle_rewards<E: GameEngine + ?Sized>(engine: &mut E) -> EngineResult {
    let rewards = engine.rewards();
    if rewards.is_empty() {
        return engine.regain_control();
    }

    let offered = rewards
        .iter()
        .filter(|r| r.kind == RewardKind::Card)
        .find_map(|r| r.cards.first().copied());
    if let Some(card) = offered {
        match engine.pick_reward_card(card) {
            Ok(()) => return Ok(()),
            Err(e) => log::debug!("Card pick refused: {}", e),
        }
    }
    engine.claim_reward(0).or_else(|_| engine.regain_control())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SweepMove {
    MapNode(i32),
    EventOption(usize),
    ClaimReward,
    SkipRewardCards,
    Campfire(usize),
    Neow(usize),
    BossRelic(usize),
    CardOption(usize),
    OpenTreasure,
    RegainControl,
}

impl SweepMove {
    fn apply<E: GameEngine + ?Sized>(self, engine: &mut E) -> EngineResult {
        match self {
            SweepMove::MapNode(x) => engine.choose_map_node(x),
            SweepMove::EventOption(i) => engine.choose_event_option(i),
            SweepMove::ClaimReward => engine.claim_reward(0),
            SweepMove::SkipRewardCards => engine.skip_reward_cards(),
            SweepMove::Campfire(i) => engine.choose_campfire_option(i),
            SweepMove::Neow(i) => engine.choose_neow_option(i),
            SweepMove::BossRelic(i) => engine.choose_boss_relic(i),
            SweepMove::CardOption(i) => engine.choose_card_option(i),
            SweepMove::OpenTreasure => engine.choose_treasure_open(),
            SweepMove::RegainControl => engine.regain_control(),
        }
    }
}

/// Throw every kind of screen-advancing call at the engine, in random order
/// with random arguments, ignoring failures.
///
/// Returns how many calls the engine accepted.
#[instrument(skip_all, name = "recovery_sweep")]
pub fn recovery_sweep<E, R>(engine: &mut E, rng: &mut R, map_width: i32) -> usize
where
    E: GameEngine + ?Sized,
    R: Rng + ?Sized,
{
    let screen = engine.screen_state();
    let mut moves = vec![
        SweepMove::MapNode(rng.gen_range(0..map_width.max(1))),
        SweepMove::EventOption(rng.gen_range(0..EVENT_OPTIONS)),
        SweepMove::ClaimReward,
        SweepMove::SkipRewardCards,
        SweepMove::Campfire(rng.gen_range(0..CAMPFIRE_OPTIONS)),
        SweepMove::Neow(rng.gen_range(0..NEOW_OPTIONS)),
        SweepMove::BossRelic(rng.gen_range(0..BOSS_RELIC_CHOICES)),
        SweepMove::CardOption(rng.gen_range(0..CARD_OPTIONS)),
        SweepMove::OpenTreasure,
        SweepMove::RegainControl,
    ];
    moves.shuffle(rng);

    let accepted = moves
        .into_iter()
        .filter(|mv| mv.apply(engine).is_ok())
        .count();
    log::warn!(
        "Forced recovery on {:?}: {} calls accepted, now on {:?}",
        screen,
        accepted,
        engine.screen_state()
    );
    accepted
}
