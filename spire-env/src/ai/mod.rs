//! Action-selection policies used by audits and smoke runs.
//!
//! Training drives the environment from outside; these are the baselines.

use crate::mask::{valid_actions, ActionMask, PROCEED};
use crate::observation::Observation;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub mod greedy;
pub use greedy::GreedyPolicy;

/// Chooses one action code per step.
pub trait Policy: Send {
    /// Pick an action given the latest observation and its mask.
    ///
    /// The mask is advisory; returning a masked action is allowed and earns
    /// the invalid-action penalty.
    fn act(&mut self, obs: &Observation, mask: &ActionMask) -> usize;
}

/// Uniform over the valid actions; proceeds when nothing is valid.
pub struct RandomMaskedPolicy {
    rng: rand::rngs::StdRng,
}

impl RandomMaskedPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomMaskedPolicy {
    fn act(&mut self, _obs: &Observation, mask: &ActionMask) -> usize {
        valid_actions(mask)
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(PROCEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{ACTION_COUNT, END_TURN};

    #[test]
    fn random_policy_respects_mask() {
        let mut policy = RandomMaskedPolicy::new(12345);
        let mut mask = [false; ACTION_COUNT];
        mask[2] = true;
        mask[END_TURN] = true;
        for _ in 0..50 {
            let a = policy.act(&Observation::zeros(), &mask);
            assert!(a == 2 || a == END_TURN);
        }
    }

    #[test]
    fn random_policy_empty_mask_proceeds() {
        let mut policy = RandomMaskedPolicy::new(1);
        assert_eq!(policy.act(&Observation::zeros(), &[false; ACTION_COUNT]), PROCEED);
    }

    #[test]
    fn random_policy_is_seeded() {
        let mask = [true; ACTION_COUNT];
        let run = |seed| {
            let mut p = RandomMaskedPolicy::new(seed);
            (0..20).map(|_| p.act(&Observation::zeros(), &mask)).collect::<Vec<_>>()
        };
        assert_eq!(run(8), run(8));
    }
}
