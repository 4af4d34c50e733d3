//! HTTP bridge to an external simulator.
//!
//! The simulator is expected to expose:
//! - `GET  {base_url}/spec`   -- returns an [`EnvSpec`]
//! - `POST {base_url}/reset`  -- returns an [`EnvReset`]
//! - `POST {base_url}/step`   -- body: `{"action": [..]}`, returns an [`EnvStep`]
//! - `POST {base_url}/seed`   -- body: `{"seed": <u64>}`
//! - `POST {base_url}/reward` -- body: `{"observation", "action", "next_observation"}`,
//!   returns `{"reward": <f64>}`

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::safety::Action;

use super::traits::{EnvReset, EnvSpec, EnvStep, Environment};

#[derive(Debug, Deserialize)]
struct RewardResponse {
    reward: f64,
}

/// An environment hosted by a separate simulator process.
#[derive(Debug, Clone)]
pub struct RemoteEnv {
    base_url: String,
    http: reqwest::Client,
    spec: EnvSpec,
    done: bool,
}

impl RemoteEnv {
    /// Connect to the simulator at `base_url` and fetch its spec.
    pub async fn connect(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client for remote environment")?;

        let spec: EnvSpec = http
            .get(format!("{base_url}/spec"))
            .send()
            .await
            .context("failed to reach simulator for its spec")?
            .error_for_status()
            .context("simulator rejected spec request")?
            .json()
            .await
            .context("failed to parse simulator spec")?;

        tracing::info!(
            env = %spec.name,
            obs_dim = spec.observation_dim,
            act_dim = spec.action_dim,
            max_episode_steps = spec.max_episode_steps,
            dt = spec.dt,
            "connected to remote environment"
        );

        Ok(Self {
            base_url,
            http,
            spec,
            done: false,
        })
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        self.http
            .post(format!("{}/{path}", self.base_url))
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to reach simulator on {path}"))?
            .error_for_status()
            .with_context(|| format!("simulator rejected {path} request"))?
            .json()
            .await
            .with_context(|| format!("failed to parse simulator {path} response"))
    }
}

impl Environment for RemoteEnv {
    async fn reset(&mut self) -> Result<EnvReset> {
        self.done = false;
        self.post("reset", &serde_json::json!({})).await
    }

    async fn step(&mut self, action: &Action) -> Result<EnvStep> {
        if self.done {
            anyhow::bail!("cannot step in a terminated episode");
        }
        let out: EnvStep = self
            .post("step", &serde_json::json!({ "action": action }))
            .await?;
        self.done = out.done;
        Ok(out)
    }

    async fn seed(&mut self, seed: u64) -> Result<()> {
        let _: serde_json::Value = self
            .post("seed", &serde_json::json!({ "seed": seed }))
            .await?;
        Ok(())
    }

    async fn reward(
        &self,
        observation: &[f64],
        action: &Action,
        next_observation: &[f64],
    ) -> Result<f64> {
        let body = serde_json::json!({
            "observation": observation,
            "action": action,
            "next_observation": next_observation,
        });
        let resp: RewardResponse = self.post("reward", &body).await?;
        Ok(resp.reward)
    }

    fn spec(&self) -> &EnvSpec {
        &self.spec
    }
}
