//! Core environment trait and shared types.
//!
//! Every control environment (the built-in point-mass task, a remote
//! simulator, ...) implements the [`Environment`] trait so that the episode
//! driver and the rollout augmentor can interact with it uniformly.

use serde::{Deserialize, Serialize};

use crate::safety::Action;

/// Opaque context the safety filter needs alongside an observation
/// (barrier parameters, obstacle geometry, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SafetyContext(pub serde_json::Value);

/// Auxiliary information attached to a reset or a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Safety cost incurred by the transition (0 when not reported).
    #[serde(default)]
    pub cost: f64,
    /// Set when the simulator flagged an exceptional cost event.
    #[serde(default)]
    pub cost_exception: bool,
    /// Context for the safety filter at the resulting state.
    #[serde(default, rename = "cbf_info")]
    pub safety_context: Option<SafetyContext>,
}

/// The result of resetting an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvReset {
    pub observation: Vec<f64>,
    #[serde(default)]
    pub info: StepInfo,
}

/// The result of stepping an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvStep {
    pub observation: Vec<f64>,
    pub reward: f64,
    /// Whether the episode has terminated (goal, failure, or time limit).
    pub done: bool,
    #[serde(default)]
    pub info: StepInfo,
}

/// Static description of an environment instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSpec {
    /// A short label for the environment (e.g. "PointMass").
    pub name: String,
    pub observation_dim: usize,
    pub action_dim: usize,
    /// Symmetric bound on each action component.
    pub action_bound: f64,
    /// Number of steps after which the episode is cut off.
    pub max_episode_steps: usize,
    /// Control period in seconds.
    pub dt: f64,
}

/// The core environment trait.
#[allow(async_fn_in_trait)]
pub trait Environment: Send + Sync {
    /// Start a new episode and return the initial observation.
    async fn reset(&mut self) -> anyhow::Result<EnvReset>;

    /// Apply `action` and return the resulting transition.
    async fn step(&mut self, action: &Action) -> anyhow::Result<EnvStep>;

    /// Re-seed any randomness in the environment.
    async fn seed(&mut self, seed: u64) -> anyhow::Result<()>;

    /// The reward the environment would assign to a transition, used to score
    /// model-generated rollouts.
    async fn reward(
        &self,
        observation: &[f64],
        action: &Action,
        next_observation: &[f64],
    ) -> anyhow::Result<f64>;

    fn spec(&self) -> &EnvSpec;

    fn max_episode_steps(&self) -> usize {
        self.spec().max_episode_steps
    }

    fn dt(&self) -> f64 {
        self.spec().dt
    }
}
