//! Map routing: pick the next node by backward induction over the act map.
//!
//! Room preferences depend on the player's HP and gold, so the weights are
//! resolved at the start of each call and the memo table lives only for that
//! call (see [`spire_pathfinding::BackwardInduction`]).

use crate::engine::{GameEngine, MapInfo, MapNode, RoomType};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use spire_pathfinding::{BackwardInduction, LayeredDag};
use tracing::instrument;

/// Score reported when no branch can be resolved.
pub const NO_PATH_SCORE: f64 = -9999.0;

/// Player resources that drive room preferences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub hp_ratio: f64,
    pub gold: i32,
}

impl PlayerStats {
    pub fn from_engine<E: GameEngine + ?Sized>(engine: &E) -> Self {
        Self {
            hp_ratio: engine.hp_ratio(),
            gold: engine.gold(),
        }
    }
}

/// Tunable room weights and the thresholds that switch between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapWeights {
    pub elite: f64,
    pub rest: f64,
    pub shop: f64,
    pub monster: f64,
    pub event: f64,
    pub treasure: f64,

    /// Below this HP ratio: avoid combat, seek healing.
    pub panic_hp: f64,
    pub panic_elite: f64,
    pub panic_rest: f64,
    pub panic_monster: f64,
    pub panic_shop: f64,

    /// Below this HP ratio (and above `panic_hp`): stop seeking elites.
    pub cautious_hp: f64,
    pub cautious_elite: f64,
    pub cautious_rest: f64,

    /// Above this much gold, shops get `rich_shop_bonus`.
    pub rich_gold: i32,
    pub rich_shop_bonus: f64,

    /// Last row before the boss; routing stops here.
    pub last_row: i32,
}

impl Default for MapWeights {
    fn default() -> Self {
        Self {
            elite: 5.0,
            rest: 2.0,
            shop: 1.0,
            monster: -0.5,
            event: 0.5,
            treasure: 2.0,
            panic_hp: 0.3,
            panic_elite: -5.0,
            panic_rest: 8.0,
            panic_monster: -2.0,
            panic_shop: 3.0,
            cautious_hp: 0.5,
            cautious_elite: 0.0,
            cautious_rest: 4.0,
            rich_gold: 250,
            rich_shop_bonus: 3.0,
            last_row: 14,
        }
    }
}

/// Weights resolved for one player state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomWeights {
    pub elite: f64,
    pub rest: f64,
    pub shop: f64,
    pub monster: f64,
    pub event: f64,
    pub treasure: f64,
}

impl RoomWeights {
    pub fn for_player(config: &MapWeights, player: PlayerStats) -> Self {
        let mut w = Self {
            elite: config.elite,
            rest: config.rest,
            shop: config.shop,
            monster: config.monster,
            event: config.event,
            treasure: config.treasure,
        };

        if player.hp_ratio < config.panic_hp {
            w.elite = config.panic_elite;
            w.rest = config.panic_rest;
            w.monster = config.panic_monster;
            w.shop = config.panic_shop;
        } else if player.hp_ratio < config.cautious_hp {
            w.elite = config.cautious_elite;
            w.rest = config.cautious_rest;
        }

        if player.gold > config.rich_gold {
            w.shop += config.rich_shop_bonus;
        }

        w
    }

    pub fn score(&self, room: RoomType) -> f64 {
        match room {
            RoomType::Elite => self.elite,
            RoomType::Rest => self.rest,
            RoomType::Shop => self.shop,
            RoomType::Monster => self.monster,
            RoomType::Event => self.event,
            RoomType::Treasure => self.treasure,
            RoomType::Boss | RoomType::BossTreasure | RoomType::None | RoomType::Invalid => 0.0,
        }
    }
}

/// Read-only view of the map as a DAG keyed by `(x, y)`.
struct MapGraph<'a> {
    nodes: FxHashMap<(i32, i32), &'a MapNode>,
    last_row: i32,
}

impl<'a> MapGraph<'a> {
    fn new(map: &'a MapInfo, last_row: i32) -> Self {
        let nodes = map
            .rows
            .iter()
            .flatten()
            .map(|n| ((n.x, n.y), n))
            .collect();
        Self { nodes, last_row }
    }

    /// Children of `node` that actually exist on the next row.
    fn children(&self, node: &MapNode) -> Vec<(i32, i32)> {
        node.children
            .iter()
            .map(|&cx| (cx, node.y + 1))
            .filter(|key| self.nodes.contains_key(key))
            .collect()
    }
}

impl LayeredDag<(i32, i32), RoomWeights> for MapGraph<'_> {
    fn successors(&self, (x, y): (i32, i32), _weights: &RoomWeights) -> Vec<(i32, i32)> {
        if y >= self.last_row {
            return vec![];
        }
        self.nodes
            .get(&(x, y))
            .map(|node| self.children(node))
            .unwrap_or_default()
    }

    fn score(&self, node: (i32, i32), weights: &RoomWeights) -> f64 {
        self.nodes
            .get(&node)
            .map(|n| weights.score(n.room))
            .unwrap_or(0.0)
    }
}

/// Result of a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapChoice {
    pub x: i32,
    pub score: f64,
}

/// Chooses the next map node.
#[derive(Debug, Clone, Default)]
pub struct MapPathOptimizer {
    weights: MapWeights,
}

impl MapPathOptimizer {
    pub fn new(weights: MapWeights) -> Self {
        Self { weights }
    }

    /// Nodes selectable from the current position, in map order.
    pub fn candidates(&self, map: &MapInfo) -> Vec<(i32, i32)> {
        let graph = MapGraph::new(map, self.weights.last_row);
        if map.current_y < 0 {
            return map
                .rows
                .first()
                .map(|row| row.iter().map(|n| (n.x, n.y)).collect())
                .unwrap_or_default();
        }
        if map.current_y >= self.weights.last_row {
            return vec![];
        }
        map.node(map.current_x, map.current_y)
            .map(|node| graph.children(node))
            .unwrap_or_default()
    }

    /// Best next column and its path value.
    ///
    /// Never fails: with no resolvable candidate it returns the first node of
    /// the next row (or column 0) with [`NO_PATH_SCORE`].
    #[instrument(skip_all, name = "map_best_branch")]
    pub fn best_branch(&self, map: &MapInfo, player: PlayerStats) -> MapChoice {
        let weights = RoomWeights::for_player(&self.weights, player);
        let graph = MapGraph::new(map, self.weights.last_row);
        let candidates = self.candidates(map);

        match BackwardInduction::best_branch(&graph, &candidates, &weights) {
            Some(((x, y), score)) => {
                log::debug!(
                    "Map choice ({}, {}) score {:.2} from {} candidates (hp {:.2}, gold {})",
                    x,
                    y,
                    score,
                    candidates.len(),
                    player.hp_ratio,
                    player.gold
                );
                MapChoice { x, score }
            }
            None => {
                let next_row = usize::try_from(map.current_y + 1).unwrap_or(0);
                let x = map
                    .rows
                    .get(next_row)
                    .and_then(|row| row.first())
                    .map(|n| n.x)
                    .unwrap_or(0);
                log::debug!(
                    "No resolvable map branch at y={}; defaulting to x={}",
                    map.current_y,
                    x
                );
                MapChoice {
                    x,
                    score: NO_PATH_SCORE,
                }
            }
        }
    }

    /// Full best route from the chosen node, for logging and audits.
    pub fn best_route(&self, map: &MapInfo, player: PlayerStats) -> Vec<(i32, i32)> {
        let weights = RoomWeights::for_player(&self.weights, player);
        let graph = MapGraph::new(map, self.weights.last_row);
        let choice = self.best_branch(map, player);
        if choice.score == NO_PATH_SCORE {
            return vec![];
        }
        let start = (choice.x, map.current_y + 1);
        BackwardInduction::best_path(&graph, start, &weights).0
    }
}
