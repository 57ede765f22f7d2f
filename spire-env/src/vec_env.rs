//! A batch of independent environments stepped in parallel.

use crate::config::EnvConfig;
use crate::engine::EngineFactory;
use crate::env::{SpireEnv, StepResult};
use crate::mask::ActionMask;
use crate::observation::Observation;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VecEnvError {
    #[error("expected {expected} actions, got {got}")]
    ActionCount { expected: usize, got: usize },
}

/// One environment's step inside a batch.
///
/// When the episode ended, the environment has already been reset:
/// `result.observation` is the new episode's first observation and
/// `final_observation` holds the last one of the finished episode.
#[derive(Debug, Clone, PartialEq)]
pub struct VecStep {
    pub result: StepResult,
    pub final_observation: Option<Observation>,
}

pub struct VecEnv<F: EngineFactory> {
    envs: Vec<SpireEnv<F>>,
}

impl<F> VecEnv<F>
where
    F: EngineFactory + Send,
    F::Engine: Send,
{
    /// One environment per factory. With a configured seed, environment `i`
    /// is seeded with `seed + i`.
    pub fn new(factories: impl IntoIterator<Item = F>, config: &EnvConfig) -> Self {
        let envs = factories
            .into_iter()
            .enumerate()
            .map(|(i, factory)| {
                let mut config = config.clone();
                config.seed = config.seed.map(|s| s.wrapping_add(i as u64));
                SpireEnv::new(factory, config)
            })
            .collect();
        Self { envs }
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn reset(&mut self, seed: Option<u64>) -> Vec<Observation> {
        self.envs
            .par_iter_mut()
            .enumerate()
            .map(|(i, env)| env.reset(seed.map(|s| s.wrapping_add(i as u64))))
            .collect()
    }

    /// Step every environment with its action, auto-resetting finished ones.
    pub fn step(&mut self, actions: &[usize]) -> Result<Vec<VecStep>, VecEnvError> {
        if actions.len() != self.envs.len() {
            return Err(VecEnvError::ActionCount {
                expected: self.envs.len(),
                got: actions.len(),
            });
        }

        Ok(self
            .envs
            .par_iter_mut()
            .zip(actions.par_iter())
            .map(|(env, &action)| {
                let mut result = env.step(action);
                if result.terminated || result.truncated {
                    let last = result.observation;
                    result.observation = env.reset(None);
                    VecStep {
                        result,
                        final_observation: Some(last),
                    }
                } else {
                    VecStep {
                        result,
                        final_observation: None,
                    }
                }
            })
            .collect())
    }

    pub fn action_masks(&self) -> Vec<ActionMask> {
        self.envs.iter().map(SpireEnv::action_masks).collect()
    }

    pub fn envs(&self) -> &[SpireEnv<F>] {
        &self.envs
    }

    pub fn env_mut(&mut self, index: usize) -> Option<&mut SpireEnv<F>> {
        self.envs.get_mut(index)
    }
}
