//! Agent interface and implementations.
//!
//! - [`traits::Agent`] -- policy, safety filter and compensator as one
//!   collaborator.
//! - [`mock::MockAgent`] -- in-process agent for local runs and tests.
//! - [`remote::RemoteAgent`] -- agent hosted by the learner server.

pub mod mock;
pub mod remote;
pub mod traits;

pub use mock::{MockAgent, MockAgentConfig};
pub use remote::RemoteAgent;
pub use traits::{ActionRequest, Agent, UpdateLosses};

use std::path::Path;

use anyhow::Result;

use crate::dynamics::DynamicsModel;
use crate::memory::{CompensatorRolloutPool, TrainingBatch};
use crate::safety::ActionProposal;

/// Enum dispatch over the concrete agents.
pub enum AnyAgent {
    Mock(MockAgent),
    Remote(RemoteAgent),
}

impl Agent for AnyAgent {
    async fn select_action<D: DynamicsModel>(
        &mut self,
        request: &ActionRequest<'_>,
        dynamics: &D,
    ) -> Result<ActionProposal> {
        match self {
            Self::Mock(a) => a.select_action(request, dynamics).await,
            Self::Remote(a) => a.select_action(request, dynamics).await,
        }
    }

    async fn update_parameters<D: DynamicsModel>(
        &mut self,
        batch: &TrainingBatch,
        update_index: u64,
        dynamics: &D,
    ) -> Result<UpdateLosses> {
        match self {
            Self::Mock(a) => a.update_parameters(batch, update_index, dynamics).await,
            Self::Remote(a) => a.update_parameters(batch, update_index, dynamics).await,
        }
    }

    async fn update_parameters_compensator(&mut self, pool: &CompensatorRolloutPool) -> Result<()> {
        match self {
            Self::Mock(a) => a.update_parameters_compensator(pool).await,
            Self::Remote(a) => a.update_parameters_compensator(pool).await,
        }
    }

    async fn save_model(&self, dir: &Path) -> Result<()> {
        match self {
            Self::Mock(a) => a.save_model(dir).await,
            Self::Remote(a) => a.save_model(dir).await,
        }
    }

    async fn load_weights(&mut self, dir: &Path) -> Result<()> {
        match self {
            Self::Mock(a) => a.load_weights(dir).await,
            Self::Remote(a) => a.load_weights(dir).await,
        }
    }

    async fn seed(&mut self, seed: u64) -> Result<()> {
        match self {
            Self::Mock(a) => a.seed(seed).await,
            Self::Remote(a) => a.seed(seed).await,
        }
    }
}
