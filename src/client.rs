//! JSON-over-HTTP client for an external learner process.
//!
//! The policy learner and the dynamics model may live in a separate process
//! (typically one with GPU access). [`LearnerClient`] is the shared transport
//! used by [`crate::agent::RemoteAgent`] and
//! [`crate::dynamics::RemoteDynamics`].

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// HTTP client bound to a learner server's base URL.
#[derive(Debug, Clone)]
pub struct LearnerClient {
    /// The base URL for requests (e.g. `"http://localhost:8700"`).
    pub api_base: String,
    http: reqwest::Client,
}

impl LearnerClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("failed to build HTTP client for learner")?;

        Ok(Self {
            api_base: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// `POST {api_base}/{path}` with a JSON body, parsing a JSON response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.api_base);
        debug!(%url, "learner request");

        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to send learner request to {path}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("learner {path} returned {status}: {text}");
        }

        resp.json()
            .await
            .with_context(|| format!("failed to parse learner {path} response"))
    }

    /// `GET {api_base}/{path}`, parsing a JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{path}", self.api_base);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to send learner request to {path}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("learner {path} returned {status}: {text}");
        }

        resp.json()
            .await
            .with_context(|| format!("failed to parse learner {path} response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = LearnerClient::new("http://localhost:8700/").unwrap();
        assert_eq!(client.api_base, "http://localhost:8700");
    }
}
