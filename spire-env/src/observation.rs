//! Fixed-shape observation encoding.
//!
//! Projects the engine's property bundle onto a 72-float vector. The layout
//! is fixed (see [`layout`]); the reward shaper and action masker read it by
//! index, so any change here is a change to both.

use serde::Serialize;
use serde_json::Value;

/// Number of features in an observation.
pub const OBS_DIM: usize = 72;
/// Lower bound of every feature.
pub const OBS_LOW: f32 = -5.0;
/// Upper bound of every feature.
pub const OBS_HIGH: f32 = 500.0;

/// Feature indices.
pub mod layout {
    pub const HP_RATIO: usize = 0;
    pub const BLOCK: usize = 1;
    pub const ENERGY: usize = 2;
    pub const STRENGTH: usize = 3;
    pub const DEXTERITY: usize = 4;
    pub const VULNERABLE: usize = 5;
    pub const WEAK: usize = 6;
    pub const FRAIL: usize = 7;
    pub const ARTIFACT: usize = 8;

    pub const MONSTER_BASE: usize = 9;
    pub const MONSTER_SLOTS: usize = 5;
    pub const MONSTER_FEATURES: usize = 5;
    pub const MONSTER_HP: usize = 0;
    pub const MONSTER_INTENT: usize = 1;
    pub const MONSTER_DAMAGE: usize = 2;
    pub const MONSTER_HITS: usize = 3;
    pub const MONSTER_ALIVE: usize = 4;

    pub const HAND_BASE: usize = 34;
    pub const HAND_SLOTS: usize = 10;
    pub const CARD_FEATURES: usize = 3;

    pub const DRAW_PILE: usize = 64;
    pub const DISCARD_PILE: usize = 65;
    pub const EXHAUST_PILE: usize = 66;
    pub const FLOOR: usize = 67;
    pub const GOLD: usize = 68;
    pub const HAS_CORRUPTION: usize = 69;
    pub const HAS_DARK_EMBRACE: usize = 70;
    pub const HAS_DEAD_BRANCH: usize = 71;

    /// Index of feature `feature` of monster slot `slot`.
    pub const fn monster(slot: usize, feature: usize) -> usize {
        MONSTER_BASE + slot * MONSTER_FEATURES + feature
    }

    /// Index of feature `feature` of hand slot `slot`.
    pub const fn card(slot: usize, feature: usize) -> usize {
        HAND_BASE + slot * CARD_FEATURES + feature
    }
}

const PILE_SCALE: f32 = 50.0;
const FLOOR_SCALE: f32 = 50.0;
const GOLD_SCALE: f32 = 1000.0;

/// One encoded observation. Built fresh each step and never mutated after.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    #[serde(with = "serde_arrays")]
    values: [f32; OBS_DIM],
}

impl Default for Observation {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Observation {
    pub const fn zeros() -> Self {
        Self {
            values: [0.0; OBS_DIM],
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn hp_ratio(&self) -> f32 {
        self.values[layout::HP_RATIO]
    }

    pub fn energy(&self) -> f32 {
        self.values[layout::ENERGY]
    }

    pub fn strength(&self) -> f32 {
        self.values[layout::STRENGTH]
    }

    pub fn gold(&self) -> f32 {
        self.values[layout::GOLD]
    }

    pub fn floor(&self) -> f32 {
        self.values[layout::FLOOR]
    }

    pub fn draw_pile(&self) -> f32 {
        self.values[layout::DRAW_PILE]
    }

    pub fn monster_alive(&self, slot: usize) -> bool {
        slot < layout::MONSTER_SLOTS
            && self.values[layout::monster(slot, layout::MONSTER_ALIVE)] > 0.5
    }

    /// Slots of monsters flagged alive, in slot order.
    pub fn alive_monsters(&self) -> Vec<usize> {
        (0..layout::MONSTER_SLOTS)
            .filter(|&slot| self.monster_alive(slot))
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.alive_monsters().len()
    }

    /// Sum of monster HP ratios across all slots.
    pub fn monster_hp_sum(&self) -> f32 {
        (0..layout::MONSTER_SLOTS)
            .map(|slot| self.values[layout::monster(slot, layout::MONSTER_HP)])
            .sum()
    }

    /// Build from raw values, enforcing the bounds invariant.
    pub fn from_values(values: [f32; OBS_DIM]) -> Self {
        let mut obs = Self { values };
        obs.sanitize();
        obs
    }

    fn sanitize(&mut self) {
        for v in &mut self.values {
            *v = if v.is_finite() {
                v.clamp(OBS_LOW, OBS_HIGH)
            } else {
                0.0
            };
        }
    }
}

/// Serde has no built-in support for arrays longer than 32.
mod serde_arrays {
    use serde::ser::{SerializeTuple, Serializer};

    pub fn serialize<S: Serializer>(
        values: &[f32; super::OBS_DIM],
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let mut tup = s.serialize_tuple(values.len())?;
        for v in values {
            tup.serialize_element(v)?;
        }
        tup.end()
    }
}

/// Read a numeric field, treating booleans as 0/1 and anything else as `default`.
fn num(value: &Value, key: &str, default: f32) -> f32 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().map(|f| f as f32).unwrap_or(default),
        Some(Value::Bool(b)) => f32::from(u8::from(*b)),
        _ => default,
    }
}

fn flag(value: &Value, key: &str) -> f32 {
    if num(value, key, 0.0) != 0.0 { 1.0 } else { 0.0 }
}

fn ratio(value: &Value) -> f32 {
    let mut max_hp = num(value, "max_hp", 1.0);
    if max_hp <= 0.0 {
        max_hp = 1.0;
    }
    num(value, "cur_hp", 0.0) / max_hp
}

fn entries<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Encode an engine property bundle.
///
/// Never fails: a bundle that is not an object yields the all-zero vector,
/// and missing fields default to zero (one for denominators).
pub fn encode(props: &Value) -> Observation {
    use layout::*;

    if !props.is_object() {
        log::warn!("Observation props are not an object; encoding zeros");
        return Observation::zeros();
    }

    let mut v = [0.0f32; OBS_DIM];

    v[HP_RATIO] = ratio(props);
    v[BLOCK] = num(props, "block", 0.0);
    v[ENERGY] = num(props, "energy", 0.0);
    v[STRENGTH] = num(props, "strength", 0.0);
    v[DEXTERITY] = num(props, "dexterity", 0.0);
    v[VULNERABLE] = num(props, "vulnerable", 0.0);
    v[WEAK] = num(props, "weak", 0.0);
    v[FRAIL] = num(props, "frail", 0.0);
    v[ARTIFACT] = num(props, "artifact", 0.0);

    for (slot, m) in entries(props, "monsters").iter().take(MONSTER_SLOTS).enumerate() {
        v[monster(slot, MONSTER_HP)] = ratio(m);
        v[monster(slot, MONSTER_INTENT)] = num(m, "intent_id", 0.0);
        v[monster(slot, MONSTER_DAMAGE)] = num(m, "intent_dmg", 0.0);
        v[monster(slot, MONSTER_HITS)] = num(m, "intent_hits", 0.0);
        v[monster(slot, MONSTER_ALIVE)] = flag(m, "is_alive");
    }

    for (slot, c) in entries(props, "hand").iter().take(HAND_SLOTS).enumerate() {
        v[card(slot, 0)] = num(c, "id", 0.0);
        v[card(slot, 1)] = num(c, "cost", 0.0);
        v[card(slot, 2)] = flag(c, "upgraded");
    }

    v[DRAW_PILE] = num(props, "draw_pile_size", 0.0) / PILE_SCALE;
    v[DISCARD_PILE] = num(props, "discard_pile_size", 0.0) / PILE_SCALE;
    v[EXHAUST_PILE] = num(props, "exhaust_pile_size", 0.0) / PILE_SCALE;
    v[FLOOR] = num(props, "floor_num", 0.0) / FLOOR_SCALE;
    v[GOLD] = num(props, "gold", 0.0) / GOLD_SCALE;
    v[HAS_CORRUPTION] = flag(props, "has_corruption");
    v[HAS_DARK_EMBRACE] = flag(props, "has_dark_embrace");
    v[HAS_DEAD_BRANCH] = flag(props, "has_dead_branch");

    Observation::from_values(v)
}

/// Encode straight from an engine, absorbing a failed property fetch.
pub fn encode_engine<E: crate::GameEngine + ?Sized>(engine: &E) -> Observation {
    match engine.observation_props() {
        Ok(props) => encode(&props),
        Err(e) => {
            log::warn!("Failed to fetch observation props: {}", e);
            Observation::zeros()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::layout::*;
    use super::*;
    use serde_json::json;

    fn full_props() -> Value {
        json!({
            "cur_hp": 60, "max_hp": 80, "block": 5, "energy": 3,
            "strength": 2, "dexterity": 1, "vulnerable": 0, "weak": 1, "frail": 0, "artifact": 1,
            "monsters": [
                {"cur_hp": 20, "max_hp": 40, "intent_id": 3, "intent_dmg": 7, "intent_hits": 2, "is_alive": true},
                {"cur_hp": 0, "max_hp": 30, "intent_id": 0, "intent_dmg": 0, "intent_hits": 0, "is_alive": false}
            ],
            "hand": [
                {"id": 12, "cost": 1, "upgraded": false},
                {"id": 7, "cost": 2, "upgraded": true}
            ],
            "draw_pile_size": 10, "discard_pile_size": 5, "exhaust_pile_size": 1,
            "floor_num": 5, "gold": 150,
            "has_corruption": false, "has_dark_embrace": true, "has_dead_branch": 0
        })
    }

    #[test]
    fn test_layout_positions() {
        assert_eq!(monster(4, MONSTER_ALIVE), 33);
        assert_eq!(card(0, 0), HAND_BASE);
        assert_eq!(card(9, 2), 63);
        assert_eq!(HAS_DEAD_BRANCH, OBS_DIM - 1);
    }

    #[test]
    fn test_encode_full_bundle() {
        let obs = encode(&full_props());
        assert_eq!(obs.hp_ratio(), 0.75);
        assert_eq!(obs.get(BLOCK), 5.0);
        assert_eq!(obs.energy(), 3.0);
        assert_eq!(obs.strength(), 2.0);
        assert_eq!(obs.get(ARTIFACT), 1.0);

        assert_eq!(obs.get(monster(0, MONSTER_HP)), 0.5);
        assert_eq!(obs.get(monster(0, MONSTER_INTENT)), 3.0);
        assert_eq!(obs.get(monster(0, MONSTER_DAMAGE)), 7.0);
        assert_eq!(obs.get(monster(0, MONSTER_HITS)), 2.0);
        assert!(obs.monster_alive(0));
        assert!(!obs.monster_alive(1));
        assert_eq!(obs.alive_monsters(), vec![0]);

        assert_eq!(obs.get(card(1, 0)), 7.0);
        assert_eq!(obs.get(card(1, 1)), 2.0);
        assert_eq!(obs.get(card(1, 2)), 1.0);

        assert_eq!(obs.draw_pile(), 0.2);
        assert_eq!(obs.get(DISCARD_PILE), 0.1);
        assert_eq!(obs.floor(), 0.1);
        assert_eq!(obs.gold(), 0.15);
        assert_eq!(obs.get(HAS_CORRUPTION), 0.0);
        assert_eq!(obs.get(HAS_DARK_EMBRACE), 1.0);
        assert_eq!(obs.get(HAS_DEAD_BRANCH), 0.0);
    }

    #[test]
    fn test_padding_is_zero() {
        let obs = encode(&full_props());
        for slot in 2..MONSTER_SLOTS {
            for f in 0..MONSTER_FEATURES {
                assert_eq!(obs.get(monster(slot, f)), 0.0);
            }
        }
        for slot in 2..HAND_SLOTS {
            for f in 0..CARD_FEATURES {
                assert_eq!(obs.get(card(slot, f)), 0.0);
            }
        }
    }

    #[test]
    fn test_non_object_is_all_zero() {
        assert!(encode(&Value::Null).is_zero());
        assert!(encode(&json!([1, 2, 3])).is_zero());
        assert!(encode(&json!("garbage")).is_zero());
    }

    #[test]
    fn test_missing_fields_default() {
        let obs = encode(&json!({}));
        assert!(obs.is_zero());

        // Zero max_hp must not divide by zero.
        let obs = encode(&json!({"cur_hp": 10, "max_hp": 0}));
        assert_eq!(obs.hp_ratio(), 10.0);

        // Mistyped fields are treated as missing.
        let obs = encode(&json!({"energy": "three", "monsters": "none", "hand": {"id": 1}}));
        assert!(obs.is_zero());
    }

    #[test]
    fn test_extra_entries_are_truncated() {
        let monsters: Vec<Value> = (0..8)
            .map(|_| json!({"cur_hp": 1, "max_hp": 1, "is_alive": true}))
            .collect();
        let obs = encode(&json!({ "monsters": monsters }));
        assert_eq!(obs.alive_count(), MONSTER_SLOTS);
        assert_eq!(obs.get(HAND_BASE), 0.0);
    }

    #[test]
    fn test_values_are_clamped() {
        let obs = encode(&json!({"block": 9999, "strength": -50}));
        assert_eq!(obs.get(BLOCK), OBS_HIGH);
        assert_eq!(obs.strength(), OBS_LOW);
    }

    #[test]
    fn test_serializes_as_flat_array() {
        let json = serde_json::to_value(encode(&full_props())).unwrap();
        assert_eq!(json["values"].as_array().unwrap().len(), OBS_DIM);
    }
}

#[cfg(test)]
mod proptests {
    use super::layout::*;
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
            any::<i32>().prop_map(|i| json!(i)),
            "[a-z]{0,4}".prop_map(Value::String),
        ]
    }

    fn arb_entry(keys: &'static [&'static str]) -> impl Strategy<Value = Value> {
        proptest::collection::vec(arb_scalar(), keys.len()).prop_map(move |vals| {
            let map: serde_json::Map<String, Value> = keys
                .iter()
                .map(|k| k.to_string())
                .zip(vals)
                .filter(|(_, v)| !v.is_null())
                .collect();
            Value::Object(map)
        })
    }

    const MONSTER_KEYS: &[&str] = &[
        "cur_hp",
        "max_hp",
        "intent_id",
        "intent_dmg",
        "intent_hits",
        "is_alive",
    ];
    const CARD_KEYS: &[&str] = &["id", "cost", "upgraded"];
    const TOP_KEYS: &[&str] = &[
        "cur_hp", "max_hp", "block", "energy", "strength", "gold", "floor_num", "draw_pile_size",
    ];

    proptest! {
        #[test]
        fn prop_shape_and_bounds_hold(
            top in arb_entry(TOP_KEYS),
            monsters in proptest::collection::vec(arb_entry(MONSTER_KEYS), 0..8),
            hand in proptest::collection::vec(arb_entry(CARD_KEYS), 0..12),
        ) {
            let mut props = top;
            props["monsters"] = Value::Array(monsters);
            props["hand"] = Value::Array(hand);
            let obs = encode(&props);
            prop_assert_eq!(obs.as_slice().len(), OBS_DIM);
            for v in obs.as_slice() {
                prop_assert!(v.is_finite());
                prop_assert!((OBS_LOW..=OBS_HIGH).contains(v));
            }
        }

        #[test]
        fn prop_padding_slots_are_zero(k in 0usize..5, h in 0usize..10) {
            let monsters: Vec<Value> = (0..k)
                .map(|i| json!({"cur_hp": 10 + i, "max_hp": 40, "intent_id": 1, "intent_dmg": 5, "intent_hits": 1, "is_alive": true}))
                .collect();
            let hand: Vec<Value> = (0..h)
                .map(|i| json!({"id": 100 + i, "cost": 1, "upgraded": true}))
                .collect();
            let obs = encode(&json!({"monsters": monsters, "hand": hand}));
            for slot in k..MONSTER_SLOTS {
                for f in 0..MONSTER_FEATURES {
                    prop_assert_eq!(obs.get(monster(slot, f)), 0.0);
                }
            }
            for slot in h..HAND_SLOTS {
                for f in 0..CARD_FEATURES {
                    prop_assert_eq!(obs.get(card(slot, f)), 0.0);
                }
            }
        }
    }
}
