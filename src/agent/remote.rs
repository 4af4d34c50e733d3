//! Agent hosted by the external learner process.
//!
//! Policy, critics, safety filter and compensator all live server-side; this
//! client only forwards requests. The dynamics model argument of the trait
//! methods is ignored because a remote learner owns its own model instance.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::client::LearnerClient;
use crate::config::LearnerConfig;
use crate::dynamics::DynamicsModel;
use crate::env::SafetyContext;
use crate::memory::{CompensatorRolloutPool, EpisodeRollout, TrainingBatch};
use crate::safety::ActionProposal;

use super::traits::{ActionRequest, Agent, UpdateLosses};

#[derive(Serialize)]
struct SelectActionBody<'a> {
    observation: &'a [f64],
    warmup: bool,
    safe_action: bool,
    cbf_info: Option<&'a SafetyContext>,
    evaluate: bool,
}

#[derive(Serialize)]
struct UpdateBody<'a> {
    batch: &'a TrainingBatch,
    update_index: u64,
}

/// Hyperparameters sent to the learner once, before any other call.
#[derive(Debug, Serialize)]
struct ConfigureBody {
    gamma: f64,
    tau: f64,
    lr: f64,
    alpha: f64,
}

impl From<&LearnerConfig> for ConfigureBody {
    fn from(config: &LearnerConfig) -> Self {
        Self {
            gamma: config.gamma,
            tau: config.tau,
            lr: config.learning_rate,
            alpha: config.alpha,
        }
    }
}

#[derive(Serialize)]
struct CompensatorBody {
    rollouts: Vec<EpisodeRollout>,
}

/// Calls `{api_base}/agent/*` on the learner server.
#[derive(Debug, Clone)]
pub struct RemoteAgent {
    client: LearnerClient,
}

impl RemoteAgent {
    /// Wrap `client` without contacting the server.
    pub fn new(client: LearnerClient) -> Self {
        Self { client }
    }

    /// Push the learner hyperparameters to the server and return the agent.
    pub async fn connect(client: LearnerClient, config: &LearnerConfig) -> Result<Self> {
        let _: serde_json::Value = client
            .post("agent/configure", &ConfigureBody::from(config))
            .await
            .context("failed to configure remote learner")?;
        Ok(Self::new(client))
    }

    async fn post_dir(&self, path: &str, dir: &Path) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .post(path, &serde_json::json!({ "dir": dir.to_string_lossy() }))
            .await?;
        Ok(())
    }
}

impl Agent for RemoteAgent {
    async fn select_action<D: DynamicsModel>(
        &mut self,
        request: &ActionRequest<'_>,
        _dynamics: &D,
    ) -> Result<ActionProposal> {
        let body = SelectActionBody {
            observation: request.observation,
            warmup: request.warmup,
            safe_action: request.safe_action,
            cbf_info: request.safety_context,
            evaluate: request.evaluate,
        };
        self.client
            .post("agent/select_action", &body)
            .await
            .context("remote action selection failed")
    }

    async fn update_parameters<D: DynamicsModel>(
        &mut self,
        batch: &TrainingBatch,
        update_index: u64,
        _dynamics: &D,
    ) -> Result<UpdateLosses> {
        let body = UpdateBody {
            batch,
            update_index,
        };
        self.client
            .post("agent/update", &body)
            .await
            .with_context(|| format!("remote update {update_index} failed"))
    }

    async fn update_parameters_compensator(&mut self, pool: &CompensatorRolloutPool) -> Result<()> {
        let body = CompensatorBody {
            rollouts: pool.to_vec(),
        };
        let _: serde_json::Value = self.client.post("agent/update_compensator", &body).await?;
        Ok(())
    }

    async fn save_model(&self, dir: &Path) -> Result<()> {
        self.post_dir("agent/save", dir).await
    }

    async fn load_weights(&mut self, dir: &Path) -> Result<()> {
        self.post_dir("agent/load", dir).await
    }

    async fn seed(&mut self, seed: u64) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .post("agent/seed", &serde_json::json!({ "seed": seed }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_body_carries_every_hyperparameter() {
        let config = LearnerConfig {
            url: Some("http://localhost:8700".into()),
            gamma: 0.95,
            tau: 0.01,
            learning_rate: 1e-3,
            alpha: 0.1,
        };
        let body = serde_json::to_value(ConfigureBody::from(&config)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "gamma": 0.95, "tau": 0.01, "lr": 1e-3, "alpha": 0.1 })
        );
    }
}
