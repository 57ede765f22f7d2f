use crate::ai::Policy;
use crate::mask::{ActionMask, END_TURN, MAX_CARD_ACTION, PROCEED};
use crate::observation::{layout, Observation};

/// Deterministic baseline: spend energy on the costliest playable card.
///
/// Unlike `RandomMaskedPolicy`, this always picks the highest-scoring valid
/// action; ties go to the lowest action code.
#[derive(Default)]
pub struct GreedyPolicy;

impl GreedyPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Higher is better. `None` means the action is not considered.
    fn score_action(&self, action: usize, obs: &Observation) -> Option<f32> {
        match action {
            0..=MAX_CARD_ACTION => Some(obs.get(layout::card(action, 1)).max(0.0) + 1.0),
            END_TURN => Some(0.0),
            PROCEED => Some(-1.0),
            _ => None,
        }
    }
}

impl Policy for GreedyPolicy {
    fn act(&mut self, obs: &Observation, mask: &ActionMask) -> usize {
        let mut best: Option<(usize, f32)> = None;
        for (action, _) in mask.iter().enumerate().filter(|(_, ok)| **ok) {
            if let Some(score) = self.score_action(action, obs) {
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((action, score));
                }
            }
        }
        best.map(|(action, _)| action).unwrap_or(PROCEED)
    }
}
