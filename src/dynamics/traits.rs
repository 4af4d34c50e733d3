//! The dynamics-model interface the orchestrator relies on.

use std::path::Path;

use anyhow::Result;

use crate::safety::Action;

/// A learned model of the system dynamics (nominal model plus learned
/// disturbance terms).
///
/// The orchestrator feeds it real transitions online, persists its
/// disturbance models with each checkpoint, and the rollout augmentor queries
/// it for one-step predictions. How it regresses is not its caller's concern.
#[allow(async_fn_in_trait)]
pub trait DynamicsModel: Send + Sync {
    /// Map an environment observation to the model's internal state.
    async fn get_state(&self, observation: &[f64]) -> Result<Vec<f64>>;

    /// Record one observed transition for online disturbance learning.
    ///
    /// `time` is the episode time of `state` in seconds.
    async fn append_transition(
        &mut self,
        state: &[f64],
        action: &Action,
        next_state: &[f64],
        time: f64,
    ) -> Result<()>;

    /// Predict the observation that follows applying `action` at
    /// `observation`.
    async fn predict_next_observation(
        &self,
        observation: &[f64],
        action: &Action,
        time: f64,
    ) -> Result<Vec<f64>>;

    async fn seed(&mut self, seed: u64) -> Result<()>;

    /// Persist the learned disturbance models under `dir`.
    async fn save_disturbance_models(&self, dir: &Path) -> Result<()>;

    /// Restore disturbance models previously written by
    /// [`save_disturbance_models`](Self::save_disturbance_models).
    async fn load_disturbance_models(&mut self, dir: &Path) -> Result<()>;

    /// Number of transitions the model retains for fitting.
    fn max_history_count(&self) -> usize;
}
