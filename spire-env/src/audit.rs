//! Long-running logic audit: drive an environment with a policy and count
//! how often the run gets through act boundaries, dies, or needs rescuing.

use crate::ai::Policy;
use crate::engine::{EngineFactory, GameEngine};
use crate::env::SpireEnv;
use crate::episode::Terminal;
use serde::Serialize;

/// Floors crossed when moving from one act to the next.
pub const ACT2_TRANSITION: (i32, i32) = (16, 17);
pub const ACT3_TRANSITION: (i32, i32) = (33, 34);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditReport {
    pub steps: u64,
    /// Episodes that ended (terminated or truncated) during the audit.
    pub episodes: u64,
    pub max_floor: i32,
    pub act2_transitions: u64,
    pub act3_transitions: u64,
    pub victories: u64,
    pub deaths: u64,
    pub truncations: u64,
    pub recoveries: u64,
    pub invalid_actions: u64,
    pub total_reward: f64,
}

impl AuditReport {
    pub fn invalid_rate(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.invalid_actions as f64 / self.steps as f64
        }
    }
}

/// Run `steps` steps, resetting whenever an episode ends.
pub fn run_audit<F, P>(env: &mut SpireEnv<F>, policy: &mut P, steps: u64) -> AuditReport
where
    F: EngineFactory,
    P: Policy + ?Sized,
{
    let mut report = AuditReport::default();
    let mut prev_floor = env.engine().floor_num();
    report.max_floor = prev_floor;

    for _ in 0..steps {
        let mask = env.action_masks();
        let action = policy.act(env.observation(), &mask);
        let result = env.step(action);
        let floor = result.info.floor;

        report.steps += 1;
        report.total_reward += result.reward;
        report.max_floor = report.max_floor.max(floor);
        if result.info.error.is_some() {
            report.invalid_actions += 1;
        }
        if result.info.recovered {
            report.recoveries += 1;
        }
        if (prev_floor, floor) == ACT2_TRANSITION {
            log::info!("Audit: act 1 -> 2 at step {}", report.steps);
            report.act2_transitions += 1;
        }
        if (prev_floor, floor) == ACT3_TRANSITION {
            log::info!("Audit: act 2 -> 3 at step {}", report.steps);
            report.act3_transitions += 1;
        }
        prev_floor = floor;

        if result.terminated || result.truncated {
            report.episodes += 1;
            match result.info.terminal {
                Some(Terminal::Victory) => report.victories += 1,
                Some(Terminal::Death) => report.deaths += 1,
                Some(Terminal::ActClear) | None => {}
            }
            if result.truncated {
                report.truncations += 1;
            }
            env.reset(None);
            prev_floor = env.engine().floor_num();
        }
    }

    log::info!(
        "Audit done: {} steps, {} episodes, max floor {}, {} recoveries, invalid rate {:.3}",
        report.steps,
        report.episodes,
        report.max_floor,
        report.recoveries,
        report.invalid_rate()
    );
    report
}
