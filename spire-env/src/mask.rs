//! Discrete action space and validity masking.

use crate::engine::{HandCard, ScreenState};
use crate::observation::Observation;
use serde::{Deserialize, Serialize};

/// Size of the flat discrete action space.
pub const ACTION_COUNT: usize = 15;
/// Highest card-play action (hand slot 9).
pub const MAX_CARD_ACTION: usize = 9;
pub const END_TURN: usize = 10;
/// Generic "advance / interact" action for every non-combat screen.
pub const PROCEED: usize = 11;

/// Validity of each action code.
pub type ActionMask = [bool; ACTION_COUNT];

/// Decoded action code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    PlayCard { slot: usize },
    EndTurn,
    Proceed,
    /// Codes 12–14: accepted as "proceed" off-combat, never unmasked.
    Reserved(usize),
}

impl Action {
    pub fn from_code(code: usize) -> Option<Self> {
        match code {
            0..=MAX_CARD_ACTION => Some(Action::PlayCard { slot: code }),
            END_TURN => Some(Action::EndTurn),
            PROCEED => Some(Action::Proceed),
            12..=14 => Some(Action::Reserved(code)),
            _ => None,
        }
    }

    pub fn code(self) -> usize {
        match self {
            Action::PlayCard { slot } => slot,
            Action::EndTurn => END_TURN,
            Action::Proceed => PROCEED,
            Action::Reserved(code) => code,
        }
    }
}

/// Compute the action mask.
///
/// Energy comes from the observation the policy saw, not from the engine,
/// so the mask never disagrees with the policy's input.
pub fn action_mask(screen: ScreenState, hand: &[HandCard], obs: &Observation) -> ActionMask {
    let mut mask = [false; ACTION_COUNT];

    if screen.is_battle() {
        let energy = obs.energy();
        for (slot, card) in hand.iter().take(MAX_CARD_ACTION + 1).enumerate() {
            mask[slot] = card.cost as f32 <= energy;
        }
        mask[END_TURN] = true;
    } else {
        mask[PROCEED] = true;
    }

    mask
}

/// Indices of valid actions, ascending.
pub fn valid_actions(mask: &ActionMask) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, ok)| ok.then_some(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{layout, OBS_DIM};
    use proptest::prelude::*;

    fn obs_with_energy(energy: f32) -> Observation {
        let mut v = [0.0f32; OBS_DIM];
        v[layout::ENERGY] = energy;
        Observation::from_values(v)
    }

    fn card(cost: i32) -> HandCard {
        HandCard {
            id: 1,
            cost,
            upgraded: false,
        }
    }

    #[test]
    fn test_action_decoding() {
        assert_eq!(Action::from_code(3), Some(Action::PlayCard { slot: 3 }));
        assert_eq!(Action::from_code(10), Some(Action::EndTurn));
        assert_eq!(Action::from_code(11), Some(Action::Proceed));
        assert_eq!(Action::from_code(14), Some(Action::Reserved(14)));
        assert_eq!(Action::from_code(15), None);
        for code in 0..ACTION_COUNT {
            assert_eq!(Action::from_code(code).unwrap().code(), code);
        }
    }

    #[test]
    fn test_battle_mask() {
        let hand = [card(1), card(3), card(0)];
        let mask = action_mask(ScreenState::Battle, &hand, &obs_with_energy(2.0));
        assert_eq!(valid_actions(&mask), vec![0, 2, END_TURN]);
    }

    #[test]
    fn test_battle_mask_empty_hand() {
        let mask = action_mask(ScreenState::Battle, &[], &obs_with_energy(3.0));
        assert_eq!(valid_actions(&mask), vec![END_TURN]);
    }

    #[test]
    fn test_non_battle_mask() {
        let hand = [card(0)];
        for screen in ScreenState::ALL {
            if screen.is_battle() {
                continue;
            }
            let mask = action_mask(screen, &hand, &obs_with_energy(3.0));
            assert_eq!(valid_actions(&mask), vec![PROCEED], "{:?}", screen);
        }
    }

    proptest! {
        #[test]
        fn prop_battle_mask_matches_costs(
            energy in 0i32..6,
            costs in proptest::collection::vec(-2i32..6, 0..12),
        ) {
            let hand: Vec<HandCard> = costs.iter().map(|&c| card(c)).collect();
            let mask = action_mask(ScreenState::Battle, &hand, &obs_with_energy(energy as f32));
            for i in 0..=MAX_CARD_ACTION {
                let expected = i < hand.len() && hand[i].cost <= energy;
                prop_assert_eq!(mask[i], expected);
            }
            prop_assert!(mask[END_TURN]);
            prop_assert!(!mask[PROCEED]);
            for i in 12..ACTION_COUNT {
                prop_assert!(!mask[i]);
            }
        }
    }
}
