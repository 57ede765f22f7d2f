//! Contract with the external game engine.
//!
//! The engine is an opaque state machine. This layer only reads its accessors
//! and calls its mutators; every mutator may refuse the call, and refusals are
//! ordinary values ([`EngineError`]), never panics.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Card identifier as exposed by the engine.
pub type CardId = u32;

/// Result type for engine mutators.
pub type EngineResult = Result<(), EngineError>;

/// The engine's current interaction mode.
///
/// Closed set: every screen the engine can report maps to exactly one variant,
/// and every dispatch over it is an exhaustive `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenState {
    /// Also the run-start (Neow) screen.
    Invalid,
    Event,
    Rewards,
    BossRelic,
    CardSelect,
    Map,
    Treasure,
    Rest,
    Shop,
    Battle,
}

impl ScreenState {
    pub const ALL: [ScreenState; 10] = [
        ScreenState::Invalid,
        ScreenState::Event,
        ScreenState::Rewards,
        ScreenState::BossRelic,
        ScreenState::CardSelect,
        ScreenState::Map,
        ScreenState::Treasure,
        ScreenState::Rest,
        ScreenState::Shop,
        ScreenState::Battle,
    ];

    /// Decode the engine's raw enumeration value. Unknown values map to `Invalid`.
    pub fn from_raw(raw: i32) -> Self {
        usize::try_from(raw)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or(ScreenState::Invalid)
    }

    pub fn is_battle(self) -> bool {
        self == ScreenState::Battle
    }
}

/// Room type of a map node, in the engine's enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    Shop,
    Rest,
    Event,
    Elite,
    Monster,
    Treasure,
    Boss,
    BossTreasure,
    None,
    Invalid,
}

impl RoomType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => RoomType::Shop,
            1 => RoomType::Rest,
            2 => RoomType::Event,
            3 => RoomType::Elite,
            4 => RoomType::Monster,
            5 => RoomType::Treasure,
            6 => RoomType::Boss,
            7 => RoomType::BossTreasure,
            8 => RoomType::None,
            _ => RoomType::Invalid,
        }
    }
}

/// Final outcome flag raised by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameOutcome {
    #[default]
    Undecided,
    PlayerVictory,
    PlayerLoss,
}

/// A card currently in hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandCard {
    pub id: CardId,
    /// Cost for this turn (after modifiers).
    pub cost: i32,
    pub upgraded: bool,
}

/// Kinds of post-combat rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardKind {
    Card,
    Gold,
    Relic,
    Potion,
    Key,
}

/// One claimable entry on the rewards screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardItem {
    pub kind: RewardKind,
    /// Offered cards; only populated for [`RewardKind::Card`].
    #[serde(default)]
    pub cards: Vec<CardId>,
}

/// A node of the act map. Immutable for the lifetime of an act.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapNode {
    pub x: i32,
    pub y: i32,
    pub room: RoomType,
    /// X coordinates of the connected nodes on row `y + 1`.
    pub children: Vec<i32>,
}

/// Snapshot of the act map plus the player's position on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    /// Column of the current node.
    pub current_x: i32,
    /// Row of the current node; `-1` before the first node of the act is chosen.
    pub current_y: i32,
    /// Rows bottom-up; each row lists its nodes.
    pub rows: Vec<Vec<MapNode>>,
}

impl MapInfo {
    pub fn node(&self, x: i32, y: i32) -> Option<&MapNode> {
        let row = self.rows.get(usize::try_from(y).ok()?)?;
        row.iter().find(|n| n.x == x)
    }
}

/// An engine call was refused or could not be served.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("engine rejected {op}: {reason}")]
    Rejected { op: &'static str, reason: String },
    #[error("engine data unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    pub fn rejected(op: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Rejected {
            op,
            reason: reason.into(),
        }
    }
}

/// Read accessors and mutators of the external simulation.
///
/// Implementations wrap the real engine binding. Nothing here may panic on
/// an illegal call; return [`EngineError`] instead.
pub trait GameEngine {
    fn screen_state(&self) -> ScreenState;
    fn cur_hp(&self) -> i32;
    fn max_hp(&self) -> i32;
    fn energy(&self) -> i32;
    fn gold(&self) -> i32;
    fn floor_num(&self) -> i32;
    fn hand(&self) -> Vec<HandCard>;
    fn map_info(&self) -> Result<MapInfo, EngineError>;
    fn rewards(&self) -> Vec<RewardItem>;
    fn outcome(&self) -> GameOutcome;

    /// Nested property bundle consumed by the observation encoder.
    ///
    /// Fields may be missing or mistyped; the encoder tolerates both.
    fn observation_props(&self) -> Result<serde_json::Value, EngineError>;

    fn play_card(&mut self, slot: usize, target: usize) -> EngineResult;
    fn end_turn(&mut self) -> EngineResult;
    fn choose_map_node(&mut self, x: i32) -> EngineResult;
    fn claim_reward(&mut self, index: usize) -> EngineResult;
    fn pick_reward_card(&mut self, card: CardId) -> EngineResult;
    fn skip_reward_cards(&mut self) -> EngineResult;
    fn choose_boss_relic(&mut self, index: usize) -> EngineResult;
    fn choose_campfire_option(&mut self, index: usize) -> EngineResult;
    fn choose_event_option(&mut self, index: usize) -> EngineResult;
    fn choose_card_option(&mut self, index: usize) -> EngineResult;
    fn choose_treasure_open(&mut self) -> EngineResult;
    fn choose_neow_option(&mut self, index: usize) -> EngineResult;
    /// Hand control back to the player after a screen that never resolved.
    fn regain_control(&mut self) -> EngineResult;

    /// `cur_hp / max(max_hp, 1)`.
    fn hp_ratio(&self) -> f64 {
        self.cur_hp() as f64 / self.max_hp().max(1) as f64
    }
}

/// Test and audit hooks. The controller never calls these.
pub trait DebugHooks {
    fn debug_set_floor(&mut self, floor: i32);
    fn debug_kill_all_monsters(&mut self);
}

/// Creates fresh engine instances, one per episode.
pub trait EngineFactory {
    type Engine: GameEngine;

    fn create(&mut self, seed: u64) -> Self::Engine;
}
