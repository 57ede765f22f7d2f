//! # Spire Environment
//!
//! Reinforcement-learning environment over an opaque Slay the Spire engine.
//!
//! The engine owns the game rules; this crate turns it into a fixed-shape
//! decision process: a 72-float observation, 15 discrete actions with a
//! validity mask, and a dense shaped reward. Non-combat screens are driven
//! by heuristics, with map routing done by backward induction.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐ action ┌──────────────┐ mutators ┌──────────────┐
//! │    Policy    │───────▶│   SpireEnv   │─────────▶│  GameEngine  │
//! │  (or agent)  │        │  (step/mask) │◀─────────│ (opaque sim) │
//! └──────▲───────┘        └──────┬───────┘  props   └──────────────┘
//!        │                       │
//!        │         ┌─────────────┼──────────────┬────────────────┐
//!        │         ▼             ▼              ▼                ▼
//!        │  ┌────────────┐ ┌────────────┐ ┌─────────────┐ ┌─────────────┐
//!        └──│  encode    │ │RewardShaper│ │ScreenNavig. │ │ EpisodeCtx  │
//!     obs   │ (72 × f32) │ │ (pure fn)  │ │ + map route │ │ (budgets)   │
//!           └────────────┘ └────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`SpireEnv`] | One environment: `reset`, `step`, `action_masks` |
//! | [`GameEngine`] | Trait the external engine binding implements |
//! | [`Observation`] | Bounded 72-dimensional feature vector |
//! | [`RewardShaper`] | Named reward components from observation pairs |
//! | [`MapPathOptimizer`] | HP/gold-aware route choice on the act map |
//! | [`VecEnv`] | Parallel batch of environments |
//! | [`EnvConfig`] | Budgets, penalties, bonuses and weights |
//!
//! ## Policies
//!
//! - [`RandomMaskedPolicy`]: uniform over valid actions, seeded
//! - [`GreedyPolicy`]: costliest playable card, then end turn
//!
//! [`run_audit`] drives either one for a fixed number of steps and reports
//! act transitions, deaths and forced recoveries.

pub mod ai;
pub mod audit;
pub mod config;
pub mod engine;
pub mod env;
pub mod episode;
pub mod map;
pub mod mask;
pub mod metrics;
pub mod observation;
pub mod reward;
pub mod screens;
pub mod testing;
pub mod vec_env;

pub use ai::{GreedyPolicy, Policy, RandomMaskedPolicy};
pub use audit::{run_audit, AuditReport};
pub use config::{ConfigError, EnvConfig};
pub use engine::{
    DebugHooks, EngineError, EngineFactory, GameEngine, GameOutcome, MapInfo, RoomType,
    ScreenState,
};
pub use env::{InvalidAction, SpireEnv, StepInfo, StepResult};
pub use episode::{EpisodeContext, Terminal, Truncation};
pub use map::{MapChoice, MapPathOptimizer, MapWeights, PlayerStats};
pub use mask::{action_mask, Action, ActionMask, ACTION_COUNT};
pub use metrics::EpisodeMetrics;
pub use observation::{encode, Observation, OBS_DIM};
pub use reward::{RewardBreakdown, RewardShaper, RewardWeights};
pub use vec_env::{VecEnv, VecEnvError, VecStep};
