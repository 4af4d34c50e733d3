//! The agent interface the orchestrator drives.
//!
//! An agent bundles the policy, the safety filter that wraps it, and the
//! optional compensator. The orchestrator only ever asks it for sub-actions,
//! hands it training batches, and tells it when to persist itself.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::dynamics::DynamicsModel;
use crate::env::SafetyContext;
use crate::memory::{CompensatorRolloutPool, TrainingBatch};
use crate::safety::ActionProposal;

/// Inputs to one action query.
#[derive(Debug, Clone, Copy)]
pub struct ActionRequest<'a> {
    pub observation: &'a [f64],
    /// True while the global step count is below the warmup threshold; the
    /// policy should explore at random.
    pub warmup: bool,
    /// Whether the safety filter should produce a correction.
    pub safe_action: bool,
    pub safety_context: Option<&'a SafetyContext>,
    /// Deterministic (non-exploratory) action selection.
    pub evaluate: bool,
}

/// Loss components reported by one parameter update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateLosses {
    pub critic_1: f64,
    pub critic_2: f64,
    pub policy: f64,
    pub entropy: f64,
    pub alpha: f64,
}

impl UpdateLosses {
    /// Metric keys and values, in emission order.
    pub fn metrics(&self) -> [(&'static str, f64); 5] {
        [
            ("loss/critic_1", self.critic_1),
            ("loss/critic_2", self.critic_2),
            ("loss/policy", self.policy),
            ("loss/entropy_loss", self.entropy),
            ("entropy_temperature/alpha", self.alpha),
        ]
    }
}

#[allow(async_fn_in_trait)]
pub trait Agent: Send + Sync {
    /// Propose the sub-actions for the current observation.
    async fn select_action<D: DynamicsModel>(
        &mut self,
        request: &ActionRequest<'_>,
        dynamics: &D,
    ) -> Result<ActionProposal>;

    /// Run one optimisation step on `batch`.
    async fn update_parameters<D: DynamicsModel>(
        &mut self,
        batch: &TrainingBatch,
        update_index: u64,
        dynamics: &D,
    ) -> Result<UpdateLosses>;

    /// Train the compensator on every episode in `pool`.
    async fn update_parameters_compensator(&mut self, pool: &CompensatorRolloutPool) -> Result<()>;

    async fn save_model(&self, dir: &Path) -> Result<()>;

    async fn load_weights(&mut self, dir: &Path) -> Result<()>;

    /// Re-seed the agent's exploration randomness.
    async fn seed(&mut self, seed: u64) -> Result<()>;
}
