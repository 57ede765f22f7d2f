//! Scriptable in-memory engine for tests and audits.
//!
//! [`MockEngine`] follows the real engine's screen flow closely enough to
//! drive whole episodes (map → room → rewards → map), records every mutator
//! call, and can be told to reject operations, ignore every call, or serve a
//! broken property bundle.

use crate::engine::{
    CardId, DebugHooks, EngineError, EngineFactory, EngineResult, GameEngine, GameOutcome,
    HandCard, MapInfo, MapNode, RewardItem, RewardKind, RoomType, ScreenState,
};
use serde_json::{json, Value};
use std::collections::HashSet;

pub const STRIKE: CardId = 1;
pub const DEFEND: CardId = 2;
pub const BASH: CardId = 3;

/// A mutator call as recorded by [`MockEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    PlayCard { slot: usize, target: usize },
    EndTurn,
    ChooseMapNode(i32),
    ClaimReward(usize),
    PickRewardCard(CardId),
    SkipRewardCards,
    ChooseBossRelic(usize),
    ChooseCampfireOption(usize),
    ChooseEventOption(usize),
    ChooseCardOption(usize),
    ChooseTreasureOpen,
    ChooseNeowOption(usize),
    RegainControl,
}

impl EngineCall {
    /// Operation name, as used by [`MockEngineBuilder::reject`].
    pub fn op(&self) -> &'static str {
        match self {
            EngineCall::PlayCard { .. } => "play_card",
            EngineCall::EndTurn => "end_turn",
            EngineCall::ChooseMapNode(_) => "choose_map_node",
            EngineCall::ClaimReward(_) => "claim_reward",
            EngineCall::PickRewardCard(_) => "pick_reward_card",
            EngineCall::SkipRewardCards => "skip_reward_cards",
            EngineCall::ChooseBossRelic(_) => "choose_boss_relic",
            EngineCall::ChooseCampfireOption(_) => "choose_campfire_option",
            EngineCall::ChooseEventOption(_) => "choose_event_option",
            EngineCall::ChooseCardOption(_) => "choose_card_option",
            EngineCall::ChooseTreasureOpen => "choose_treasure_open",
            EngineCall::ChooseNeowOption(_) => "choose_neow_option",
            EngineCall::RegainControl => "regain_control",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockMonster {
    pub cur_hp: i32,
    pub max_hp: i32,
    pub intent_id: i32,
    pub intent_dmg: i32,
    pub intent_hits: i32,
}

impl MockMonster {
    pub fn new(hp: i32, intent_dmg: i32) -> Self {
        Self {
            cur_hp: hp,
            max_hp: hp,
            intent_id: 1,
            intent_dmg,
            intent_hits: 1,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.cur_hp > 0
    }
}

/// In-memory engine. Fields are public so tests can poke state directly.
#[derive(Debug, Clone)]
pub struct MockEngine {
    pub seed: u64,
    pub screen: ScreenState,
    pub cur_hp: i32,
    pub max_hp: i32,
    pub block: i32,
    pub energy: i32,
    pub max_energy: i32,
    pub strength: i32,
    pub gold: i32,
    pub floor: i32,
    pub hand: Vec<HandCard>,
    pub monsters: Vec<MockMonster>,
    pub draw_pile: i32,
    pub discard_pile: i32,
    pub exhaust_pile: i32,
    pub map: MapInfo,
    pub rewards: Vec<RewardItem>,
    pub outcome: GameOutcome,
    /// Damage dealt by any card play.
    pub card_damage: i32,
    /// Operations (see [`EngineCall::op`]) that always fail.
    pub rejected_ops: HashSet<&'static str>,
    /// Accept every call but change nothing.
    pub frozen: bool,
    /// Served instead of the generated property bundle.
    pub props_override: Option<Result<Value, EngineError>>,
    pub calls: Vec<EngineCall>,
}

impl Default for MockEngine {
    fn default() -> Self {
        MockEngineBuilder::new().build()
    }
}

impl MockEngine {
    pub fn starting_hand() -> Vec<HandCard> {
        let card = |id, cost| HandCard {
            id,
            cost,
            upgraded: false,
        };
        vec![
            card(STRIKE, 1),
            card(STRIKE, 1),
            card(DEFEND, 1),
            card(BASH, 2),
            card(DEFEND, 1),
        ]
    }

    /// 15 rows × 3 columns; every node links to the columns next to it.
    pub fn default_map() -> MapInfo {
        let rows = (0..15)
            .map(|y| {
                (0..3)
                    .map(|x| {
                        let room = match (y, (x + y) % 5) {
                            (0, _) => RoomType::Monster,
                            (14, _) => RoomType::Rest,
                            (_, 0) => RoomType::Monster,
                            (_, 1) => RoomType::Event,
                            (_, 2) => RoomType::Elite,
                            (_, 3) => RoomType::Rest,
                            _ => RoomType::Shop,
                        };
                        let children = if y == 14 {
                            vec![]
                        } else {
                            ((x - 1).max(0)..=(x + 1).min(2)).collect()
                        };
                        MapNode {
                            x,
                            y,
                            room,
                            children,
                        }
                    })
                    .collect()
            })
            .collect();
        MapInfo {
            current_x: -1,
            current_y: -1,
            rows,
        }
    }

    /// Calls recorded so far with the given op name.
    pub fn count(&self, op: &str) -> usize {
        self.calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn alive_monsters(&self) -> usize {
        self.monsters.iter().filter(|m| m.is_alive()).count()
    }

    fn record(&mut self, call: EngineCall) -> Result<bool, EngineError> {
        let op = call.op();
        self.calls.push(call);
        if self.rejected_ops.contains(op) {
            return Err(EngineError::rejected(op, "rejected by mock"));
        }
        Ok(!self.frozen)
    }

    fn require(&self, op: &'static str, screen: ScreenState) -> EngineResult {
        if self.screen == screen {
            Ok(())
        } else {
            Err(EngineError::rejected(op, format!("not on {:?}", self.screen)))
        }
    }

    fn finish_combat(&mut self) {
        self.screen = ScreenState::Rewards;
        self.hand.clear();
        self.block = 0;
        self.rewards = vec![
            RewardItem {
                kind: RewardKind::Gold,
                cards: vec![],
            },
            RewardItem {
                kind: RewardKind::Card,
                cards: vec![10, 11, 12],
            },
        ];
    }

    fn enter_room(&mut self, room: RoomType) {
        self.screen = match room {
            RoomType::Monster | RoomType::Elite | RoomType::Boss => {
                let hp = if room == RoomType::Monster { 20 } else { 45 };
                self.monsters = vec![MockMonster::new(hp, 6)];
                self.hand = Self::starting_hand();
                self.energy = self.max_energy;
                ScreenState::Battle
            }
            RoomType::Rest => ScreenState::Rest,
            RoomType::Shop => ScreenState::Shop,
            RoomType::Event => ScreenState::Event,
            RoomType::Treasure => ScreenState::Treasure,
            RoomType::BossTreasure => ScreenState::BossRelic,
            RoomType::None | RoomType::Invalid => ScreenState::Map,
        };
    }

    fn map_candidates(&self) -> Vec<i32> {
        if self.map.current_y < 0 {
            return self
                .map
                .rows
                .first()
                .map(|row| row.iter().map(|n| n.x).collect())
                .unwrap_or_default();
        }
        self.map
            .node(self.map.current_x, self.map.current_y)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn back_to_map(&mut self) {
        self.screen = ScreenState::Map;
    }
}

impl GameEngine for MockEngine {
    fn screen_state(&self) -> ScreenState {
        self.screen
    }

    fn cur_hp(&self) -> i32 {
        self.cur_hp
    }

    fn max_hp(&self) -> i32 {
        self.max_hp
    }

    fn energy(&self) -> i32 {
        self.energy
    }

    fn gold(&self) -> i32 {
        self.gold
    }

    fn floor_num(&self) -> i32 {
        self.floor
    }

    fn hand(&self) -> Vec<HandCard> {
        self.hand.clone()
    }

    fn map_info(&self) -> Result<MapInfo, EngineError> {
        Ok(self.map.clone())
    }

    fn rewards(&self) -> Vec<RewardItem> {
        self.rewards.clone()
    }

    fn outcome(&self) -> GameOutcome {
        self.outcome
    }

    fn observation_props(&self) -> Result<Value, EngineError> {
        if let Some(over) = &self.props_override {
            return over.clone();
        }
        let monsters: Vec<Value> = self
            .monsters
            .iter()
            .map(|m| {
                json!({
                    "cur_hp": m.cur_hp,
                    "max_hp": m.max_hp,
                    "intent_id": m.intent_id,
                    "intent_dmg": m.intent_dmg,
                    "intent_hits": m.intent_hits,
                    "is_alive": m.is_alive(),
                })
            })
            .collect();
        let hand: Vec<Value> = self
            .hand
            .iter()
            .map(|c| json!({"id": c.id, "cost": c.cost, "upgraded": c.upgraded}))
            .collect();
        Ok(json!({
            "cur_hp": self.cur_hp,
            "max_hp": self.max_hp,
            "block": self.block,
            "energy": self.energy,
            "strength": self.strength,
            "monsters": monsters,
            "hand": hand,
            "draw_pile_size": self.draw_pile,
            "discard_pile_size": self.discard_pile,
            "exhaust_pile_size": self.exhaust_pile,
            "floor_num": self.floor,
            "gold": self.gold,
        }))
    }

    fn play_card(&mut self, slot: usize, target: usize) -> EngineResult {
        if !self.record(EngineCall::PlayCard { slot, target })? {
            return Ok(());
        }
        self.require("play_card", ScreenState::Battle)?;
        let card = *self
            .hand
            .get(slot)
            .ok_or_else(|| EngineError::rejected("play_card", "empty slot"))?;
        if card.cost > self.energy {
            return Err(EngineError::rejected("play_card", "not enough energy"));
        }
        self.hand.remove(slot);
        self.energy -= card.cost.max(0);
        self.discard_pile += 1;
        match card.id {
            DEFEND => self.block += 5,
            _ => {
                if let Some(m) = self.monsters.get_mut(target).filter(|m| m.is_alive()) {
                    m.cur_hp = (m.cur_hp - self.card_damage).max(0);
                }
            }
        }
        if self.alive_monsters() == 0 {
            self.finish_combat();
        }
        Ok(())
    }

    fn end_turn(&mut self) -> EngineResult {
        if !self.record(EngineCall::EndTurn)? {
            return Ok(());
        }
        self.require("end_turn", ScreenState::Battle)?;
        let incoming: i32 = self
            .monsters
            .iter()
            .filter(|m| m.is_alive())
            .map(|m| m.intent_dmg * m.intent_hits)
            .sum();
        self.cur_hp -= (incoming - self.block).max(0);
        self.block = 0;
        self.energy = self.max_energy;
        self.hand = Self::starting_hand();
        if self.cur_hp <= 0 {
            self.outcome = GameOutcome::PlayerLoss;
        }
        Ok(())
    }

    fn choose_map_node(&mut self, x: i32) -> EngineResult {
        if !self.record(EngineCall::ChooseMapNode(x))? {
            return Ok(());
        }
        self.require("choose_map_node", ScreenState::Map)?;
        if !self.map_candidates().contains(&x) {
            return Err(EngineError::rejected("choose_map_node", "unreachable node"));
        }
        let y = self.map.current_y + 1;
        let room = self
            .map
            .node(x, y)
            .map(|n| n.room)
            .ok_or_else(|| EngineError::rejected("choose_map_node", "no such node"))?;
        self.map.current_x = x;
        self.map.current_y = y;
        self.floor += 1;
        self.enter_room(room);
        Ok(())
    }

    fn claim_reward(&mut self, index: usize) -> EngineResult {
        if !self.record(EngineCall::ClaimReward(index))? {
            return Ok(());
        }
        self.require("claim_reward", ScreenState::Rewards)?;
        if index >= self.rewards.len() {
            return Err(EngineError::rejected("claim_reward", "no such reward"));
        }
        let item = self.rewards.remove(index);
        match item.kind {
            RewardKind::Gold => self.gold += 25,
            RewardKind::Card => self.draw_pile += 1,
            RewardKind::Relic | RewardKind::Potion | RewardKind::Key => {}
        }
        Ok(())
    }

    fn pick_reward_card(&mut self, card: CardId) -> EngineResult {
        if !self.record(EngineCall::PickRewardCard(card))? {
            return Ok(());
        }
        self.require("pick_reward_card", ScreenState::Rewards)?;
        let index = self
            .rewards
            .iter()
            .position(|r| r.kind == RewardKind::Card && r.cards.contains(&card))
            .ok_or_else(|| EngineError::rejected("pick_reward_card", "card not offered"))?;
        self.rewards.remove(index);
        self.draw_pile += 1;
        Ok(())
    }

    fn skip_reward_cards(&mut self) -> EngineResult {
        if !self.record(EngineCall::SkipRewardCards)? {
            return Ok(());
        }
        self.rewards.retain(|r| r.kind != RewardKind::Card);
        Ok(())
    }

    fn choose_boss_relic(&mut self, index: usize) -> EngineResult {
        if !self.record(EngineCall::ChooseBossRelic(index))? {
            return Ok(());
        }
        self.require("choose_boss_relic", ScreenState::BossRelic)?;
        if index >= 3 {
            return Err(EngineError::rejected("choose_boss_relic", "no such relic"));
        }
        self.map.current_x = -1;
        self.map.current_y = -1;
        self.floor += 1;
        self.back_to_map();
        Ok(())
    }

    fn choose_campfire_option(&mut self, index: usize) -> EngineResult {
        if !self.record(EngineCall::ChooseCampfireOption(index))? {
            return Ok(());
        }
        self.require("choose_campfire_option", ScreenState::Rest)?;
        match index {
            0 => self.cur_hp = (self.cur_hp + self.max_hp * 3 / 10).min(self.max_hp),
            1 => {}
            _ => return Err(EngineError::rejected("choose_campfire_option", "no such option")),
        }
        self.back_to_map();
        Ok(())
    }

    fn choose_event_option(&mut self, index: usize) -> EngineResult {
        if !self.record(EngineCall::ChooseEventOption(index))? {
            return Ok(());
        }
        self.require("choose_event_option", ScreenState::Event)?;
        if index >= 2 {
            return Err(EngineError::rejected("choose_event_option", "no such option"));
        }
        self.back_to_map();
        Ok(())
    }

    fn choose_card_option(&mut self, index: usize) -> EngineResult {
        if !self.record(EngineCall::ChooseCardOption(index))? {
            return Ok(());
        }
        self.require("choose_card_option", ScreenState::CardSelect)?;
        self.back_to_map();
        Ok(())
    }

    fn choose_treasure_open(&mut self) -> EngineResult {
        if !self.record(EngineCall::ChooseTreasureOpen)? {
            return Ok(());
        }
        self.require("choose_treasure_open", ScreenState::Treasure)?;
        self.gold += 50;
        Ok(())
    }

    fn choose_neow_option(&mut self, index: usize) -> EngineResult {
        if !self.record(EngineCall::ChooseNeowOption(index))? {
            return Ok(());
        }
        self.require("choose_neow_option", ScreenState::Invalid)?;
        if index >= 4 {
            return Err(EngineError::rejected("choose_neow_option", "no such option"));
        }
        self.back_to_map();
        Ok(())
    }

    fn regain_control(&mut self) -> EngineResult {
        if !self.record(EngineCall::RegainControl)? {
            return Ok(());
        }
        match self.screen {
            ScreenState::Rewards | ScreenState::Shop | ScreenState::Treasure => self.back_to_map(),
            ScreenState::Battle if self.alive_monsters() == 0 => self.finish_combat(),
            _ => {}
        }
        Ok(())
    }
}

impl DebugHooks for MockEngine {
    fn debug_set_floor(&mut self, floor: i32) {
        self.floor = floor;
    }

    fn debug_kill_all_monsters(&mut self) {
        for m in &mut self.monsters {
            m.cur_hp = 0;
        }
        if self.screen == ScreenState::Battle {
            self.finish_combat();
        }
    }
}

/// Builder for [`MockEngine`], in the spirit of a fixture.
pub struct MockEngineBuilder {
    engine: MockEngine,
}

impl MockEngineBuilder {
    pub fn new() -> Self {
        Self {
            engine: MockEngine {
                seed: 0,
                screen: ScreenState::Map,
                cur_hp: 80,
                max_hp: 80,
                block: 0,
                energy: 3,
                max_energy: 3,
                strength: 0,
                gold: 99,
                floor: 0,
                hand: vec![],
                monsters: vec![],
                draw_pile: 10,
                discard_pile: 0,
                exhaust_pile: 0,
                map: MockEngine::default_map(),
                rewards: vec![],
                outcome: GameOutcome::Undecided,
                card_damage: 6,
                rejected_ops: HashSet::new(),
                frozen: false,
                props_override: None,
                calls: vec![],
            },
        }
    }

    pub fn screen(mut self, screen: ScreenState) -> Self {
        self.engine.screen = screen;
        self
    }

    pub fn hp(mut self, cur: i32, max: i32) -> Self {
        self.engine.cur_hp = cur;
        self.engine.max_hp = max;
        self
    }

    pub fn energy(mut self, energy: i32) -> Self {
        self.engine.energy = energy;
        self
    }

    pub fn gold(mut self, gold: i32) -> Self {
        self.engine.gold = gold;
        self
    }

    pub fn floor(mut self, floor: i32) -> Self {
        self.engine.floor = floor;
        self
    }

    pub fn hand(mut self, hand: Vec<HandCard>) -> Self {
        self.engine.hand = hand;
        self
    }

    pub fn monsters(mut self, monsters: Vec<MockMonster>) -> Self {
        self.engine.monsters = monsters;
        self
    }

    pub fn map(mut self, map: MapInfo) -> Self {
        self.engine.map = map;
        self
    }

    pub fn rewards(mut self, rewards: Vec<RewardItem>) -> Self {
        self.engine.rewards = rewards;
        self
    }

    pub fn card_damage(mut self, damage: i32) -> Self {
        self.engine.card_damage = damage;
        self
    }

    /// Start in a fight against `monsters` with the starting hand.
    pub fn in_battle(self, monsters: Vec<MockMonster>) -> Self {
        self.screen(ScreenState::Battle)
            .monsters(monsters)
            .hand(MockEngine::starting_hand())
    }

    pub fn reject(mut self, op: &'static str) -> Self {
        self.engine.rejected_ops.insert(op);
        self
    }

    pub fn frozen(mut self) -> Self {
        self.engine.frozen = true;
        self
    }

    pub fn props(mut self, props: Result<Value, EngineError>) -> Self {
        self.engine.props_override = Some(props);
        self
    }

    pub fn build(self) -> MockEngine {
        self.engine
    }

    /// Factory that hands out copies of this engine.
    pub fn factory(self) -> MockFactory {
        MockFactory {
            template: self.engine,
            created: vec![],
        }
    }
}

impl Default for MockEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// [`EngineFactory`] that clones a template engine for each episode.
#[derive(Debug, Clone)]
pub struct MockFactory {
    pub template: MockEngine,
    /// Seeds requested so far.
    pub created: Vec<u64>,
}

impl EngineFactory for MockFactory {
    type Engine = MockEngine;

    fn create(&mut self, seed: u64) -> MockEngine {
        self.created.push(seed);
        let mut engine = self.template.clone();
        engine.seed = seed;
        engine
    }
}
