//! Dynamics model hosted by the external learner process.

use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

use crate::client::LearnerClient;
use crate::safety::Action;

use super::traits::DynamicsModel;

#[derive(Debug, Deserialize)]
struct DynamicsInfo {
    max_history_count: usize,
}

#[derive(Debug, Deserialize)]
struct StateResponse {
    state: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    next_observation: Vec<f64>,
}

/// Calls `{api_base}/dynamics/*` on the learner server.
#[derive(Debug, Clone)]
pub struct RemoteDynamics {
    client: LearnerClient,
    max_history_count: usize,
}

impl RemoteDynamics {
    /// Connect and fetch the model's static info.
    pub async fn connect(client: LearnerClient) -> Result<Self> {
        let info: DynamicsInfo = client.get("dynamics/info").await?;
        tracing::info!(
            max_history_count = info.max_history_count,
            "connected to remote dynamics model"
        );
        Ok(Self {
            client,
            max_history_count: info.max_history_count,
        })
    }
}

impl DynamicsModel for RemoteDynamics {
    async fn get_state(&self, observation: &[f64]) -> Result<Vec<f64>> {
        let resp: StateResponse = self
            .client
            .post("dynamics/state", &serde_json::json!({ "observation": observation }))
            .await?;
        Ok(resp.state)
    }

    async fn append_transition(
        &mut self,
        state: &[f64],
        action: &Action,
        next_state: &[f64],
        time: f64,
    ) -> Result<()> {
        let body = serde_json::json!({
            "state": state,
            "action": action,
            "next_state": next_state,
            "t_batch": [time],
        });
        let _: serde_json::Value = self.client.post("dynamics/append", &body).await?;
        Ok(())
    }

    async fn predict_next_observation(
        &self,
        observation: &[f64],
        action: &Action,
        time: f64,
    ) -> Result<Vec<f64>> {
        let body = serde_json::json!({
            "observation": observation,
            "action": action,
            "t": time,
        });
        let resp: PredictionResponse = self.client.post("dynamics/predict", &body).await?;
        Ok(resp.next_observation)
    }

    async fn seed(&mut self, seed: u64) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .post("dynamics/seed", &serde_json::json!({ "seed": seed }))
            .await?;
        Ok(())
    }

    async fn save_disturbance_models(&self, dir: &Path) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .post("dynamics/save", &serde_json::json!({ "dir": dir.to_string_lossy() }))
            .await?;
        Ok(())
    }

    async fn load_disturbance_models(&mut self, dir: &Path) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .post("dynamics/load", &serde_json::json!({ "dir": dir.to_string_lossy() }))
            .await?;
        Ok(())
    }

    fn max_history_count(&self) -> usize {
        self.max_history_count
    }
}
