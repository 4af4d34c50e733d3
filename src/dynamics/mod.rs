//! Dynamics-model interface and implementations.
//!
//! - [`traits::DynamicsModel`] -- what the orchestrator needs from a model.
//! - [`mock::MockDynamics`] -- in-process mean-residual model.
//! - [`remote::RemoteDynamics`] -- model hosted by the learner server.

pub mod mock;
pub mod remote;
pub mod traits;

pub use mock::MockDynamics;
pub use remote::RemoteDynamics;
pub use traits::DynamicsModel;

use std::path::Path;

use anyhow::Result;

use crate::safety::Action;

/// Enum dispatch over the concrete dynamics models.
pub enum AnyDynamics {
    Mock(MockDynamics),
    Remote(RemoteDynamics),
}

impl DynamicsModel for AnyDynamics {
    async fn get_state(&self, observation: &[f64]) -> Result<Vec<f64>> {
        match self {
            Self::Mock(m) => m.get_state(observation).await,
            Self::Remote(m) => m.get_state(observation).await,
        }
    }

    async fn append_transition(
        &mut self,
        state: &[f64],
        action: &Action,
        next_state: &[f64],
        time: f64,
    ) -> Result<()> {
        match self {
            Self::Mock(m) => m.append_transition(state, action, next_state, time).await,
            Self::Remote(m) => m.append_transition(state, action, next_state, time).await,
        }
    }

    async fn predict_next_observation(
        &self,
        observation: &[f64],
        action: &Action,
        time: f64,
    ) -> Result<Vec<f64>> {
        match self {
            Self::Mock(m) => m.predict_next_observation(observation, action, time).await,
            Self::Remote(m) => m.predict_next_observation(observation, action, time).await,
        }
    }

    async fn seed(&mut self, seed: u64) -> Result<()> {
        match self {
            Self::Mock(m) => m.seed(seed).await,
            Self::Remote(m) => m.seed(seed).await,
        }
    }

    async fn save_disturbance_models(&self, dir: &Path) -> Result<()> {
        match self {
            Self::Mock(m) => m.save_disturbance_models(dir).await,
            Self::Remote(m) => m.save_disturbance_models(dir).await,
        }
    }

    async fn load_disturbance_models(&mut self, dir: &Path) -> Result<()> {
        match self {
            Self::Mock(m) => m.load_disturbance_models(dir).await,
            Self::Remote(m) => m.load_disturbance_models(dir).await,
        }
    }

    fn max_history_count(&self) -> usize {
        match self {
            Self::Mock(m) => m.max_history_count(),
            Self::Remote(m) => m.max_history_count(),
        }
    }
}
