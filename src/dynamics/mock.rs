//! In-process dynamics model with a mean-residual disturbance estimate.
//!
//! The nominal model is a single integrator, `x' = x + a·dt`. Every recorded
//! transition contributes a residual `(x' - x)/dt - a`; the disturbance is
//! the mean residual over the retained history. Good enough to exercise the
//! model-based path of the training loop against [`crate::env::PointMassEnv`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{read_json, write_json};
use crate::memory::RingBuffer;
use crate::safety::Action;

use super::traits::DynamicsModel;

/// File name of the persisted disturbance model inside a checkpoint directory.
pub const DISTURBANCE_FILE: &str = "disturbance_model.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DisturbanceSnapshot {
    dt: f64,
    max_history_count: usize,
    residuals: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct MockDynamics {
    dt: f64,
    history: RingBuffer<Vec<f64>>,
}

impl MockDynamics {
    pub fn new(dt: f64, max_history_count: usize) -> Self {
        Self {
            dt,
            history: RingBuffer::new(max_history_count),
        }
    }

    /// Number of residuals currently retained.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Mean residual per state dimension (empty when nothing was recorded).
    pub fn disturbance(&self) -> Vec<f64> {
        let n = self.history.len();
        let Some(first) = self.history.iter().next() else {
            return Vec::new();
        };
        let mut mean = vec![0.0; first.len()];
        for residual in self.history.iter() {
            for (m, r) in mean.iter_mut().zip(residual) {
                *m += r;
            }
        }
        for m in &mut mean {
            *m /= n as f64;
        }
        mean
    }
}

impl DynamicsModel for MockDynamics {
    async fn get_state(&self, observation: &[f64]) -> Result<Vec<f64>> {
        Ok(observation.to_vec())
    }

    async fn append_transition(
        &mut self,
        state: &[f64],
        action: &Action,
        next_state: &[f64],
        _time: f64,
    ) -> Result<()> {
        let residual = state
            .iter()
            .zip(next_state)
            .zip(action.as_slice())
            .map(|((x, x_next), a)| (x_next - x) / self.dt - a)
            .collect();
        self.history.push(residual);
        Ok(())
    }

    async fn predict_next_observation(
        &self,
        observation: &[f64],
        action: &Action,
        _time: f64,
    ) -> Result<Vec<f64>> {
        let disturbance = self.disturbance();
        Ok(observation
            .iter()
            .enumerate()
            .map(|(i, x)| {
                let a = action.as_slice().get(i).copied().unwrap_or(0.0);
                let d = disturbance.get(i).copied().unwrap_or(0.0);
                x + (a + d) * self.dt
            })
            .collect())
    }

    /// The estimate is deterministic; there is nothing to seed.
    async fn seed(&mut self, _seed: u64) -> Result<()> {
        Ok(())
    }

    async fn save_disturbance_models(&self, dir: &Path) -> Result<()> {
        let snapshot = DisturbanceSnapshot {
            dt: self.dt,
            max_history_count: self.history.capacity(),
            residuals: self.history.iter_chronological().cloned().collect(),
        };
        write_json(&dir.join(DISTURBANCE_FILE), &snapshot)?;
        Ok(())
    }

    async fn load_disturbance_models(&mut self, dir: &Path) -> Result<()> {
        let path = dir.join(DISTURBANCE_FILE);
        let snapshot: DisturbanceSnapshot = read_json(&path)?;
        if !(snapshot.dt > 0.0 && snapshot.dt.is_finite()) {
            anyhow::bail!("{}: dt must be positive, got {}", path.display(), snapshot.dt);
        }
        let mut history = RingBuffer::try_new(snapshot.max_history_count)
            .with_context(|| format!("invalid disturbance model at {}", path.display()))?;
        for residual in snapshot.residuals {
            history.push(residual);
        }
        self.dt = snapshot.dt;
        self.history = history;
        Ok(())
    }

    fn max_history_count(&self) -> usize {
        self.history.capacity()
    }
}
