//! In-process agent for local runs and tests.
//!
//! - **Policy**: proportional controller towards the origin, `u = -k·x`, with
//!   uniform exploration noise; uniform random actions during warmup.
//! - **Safety filter**: box filter that returns the correction bringing
//!   `policy + compensator` back inside the action bounds.
//! - **Compensator**: a constant bias, smoothed towards the mean total
//!   correction (`safety + compensator`) seen in the rollout pool.
//! - **Learner**: a scalar TD(0) value estimate, enough to report
//!   meaningful losses from the batches it is given.

use std::path::Path;

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::checkpoint::{read_json, write_json};
use crate::dynamics::DynamicsModel;
use crate::error::ConfigError;
use crate::memory::{CompensatorRolloutPool, TrainingBatch};
use crate::safety::{Action, ActionProposal};

use super::traits::{ActionRequest, Agent, UpdateLosses};

/// File name of the persisted agent inside a checkpoint directory.
pub const AGENT_FILE: &str = "agent.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockAgentConfig {
    pub gain: f64,
    pub noise_scale: f64,
    pub action_bound: f64,
    pub gamma: f64,
    pub learning_rate: f64,
    pub comp_rate: f64,
    pub alpha: f64,
}

impl Default for MockAgentConfig {
    fn default() -> Self {
        Self {
            gain: 1.0,
            noise_scale: 0.1,
            action_bound: 1.0,
            gamma: 0.99,
            learning_rate: 3e-4,
            comp_rate: 0.005,
            alpha: 0.2,
        }
    }
}

impl MockAgentConfig {
    /// Reject settings that would leave the sampling ranges empty. The action
    /// bound usually comes from the environment spec, which may be remote.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.action_bound > 0.0 && self.action_bound.is_finite()) {
            return Err(ConfigError::NonPositive {
                field: "agent.action_bound",
            });
        }
        for (field, value) in [
            ("agent.noise_scale", self.noise_scale),
            ("agent.gain", self.gain),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AgentWeights {
    value: f64,
    compensator: Action,
    updates: u64,
}

#[derive(Debug, Clone)]
pub struct MockAgent {
    config: MockAgentConfig,
    action_dim: usize,
    use_compensator: bool,
    rng: ChaCha8Rng,
    weights: AgentWeights,
}

impl MockAgent {
    pub fn new(config: MockAgentConfig, action_dim: usize, use_compensator: bool) -> Self {
        Self {
            config,
            action_dim,
            use_compensator,
            rng: ChaCha8Rng::seed_from_u64(0),
            weights: AgentWeights {
                value: 0.0,
                compensator: Action::zeros(action_dim),
                updates: 0,
            },
        }
    }

    pub fn value_estimate(&self) -> f64 {
        self.weights.value
    }

    pub fn compensator(&self) -> &Action {
        &self.weights.compensator
    }

    pub fn updates(&self) -> u64 {
        self.weights.updates
    }

    fn policy_action(&mut self, request: &ActionRequest<'_>) -> Action {
        let bound = self.config.action_bound;
        if request.warmup && !request.evaluate {
            return Action(
                (0..self.action_dim)
                    .map(|_| self.rng.gen_range(-bound..=bound))
                    .collect(),
            );
        }

        let noise = self.config.noise_scale;
        Action(
            (0..self.action_dim)
                .map(|i| {
                    let x = request.observation.get(i).copied().unwrap_or(0.0);
                    let u = -self.config.gain * x;
                    if request.evaluate || noise <= 0.0 {
                        u
                    } else {
                        u + self.rng.gen_range(-noise..=noise)
                    }
                })
                .collect(),
        )
    }

    /// Correction that clamps `nominal` into the action box.
    fn box_filter(&self, nominal: &Action) -> Action {
        let bound = self.config.action_bound;
        Action(
            nominal
                .as_slice()
                .iter()
                .map(|&u| u.clamp(-bound, bound) - u)
                .collect(),
        )
    }
}

impl Agent for MockAgent {
    async fn select_action<D: DynamicsModel>(
        &mut self,
        request: &ActionRequest<'_>,
        _dynamics: &D,
    ) -> Result<ActionProposal> {
        let policy = self.policy_action(request);
        let compensator = self
            .use_compensator
            .then(|| self.weights.compensator.clone());

        let safety = if request.safe_action {
            let nominal = match &compensator {
                Some(comp) => policy.checked_add(comp)?,
                None => policy.clone(),
            };
            Some(self.box_filter(&nominal))
        } else {
            None
        };

        Ok(ActionProposal {
            policy,
            safety,
            compensator,
        })
    }

    async fn update_parameters<D: DynamicsModel>(
        &mut self,
        batch: &TrainingBatch,
        _update_index: u64,
        _dynamics: &D,
    ) -> Result<UpdateLosses> {
        if batch.is_empty() {
            anyhow::bail!("cannot update on an empty batch");
        }

        let v = self.weights.value;
        let n = batch.len() as f64;
        let (sum_td, sum_sq) = batch
            .transitions
            .iter()
            .map(|t| t.reward + self.config.gamma * t.mask * v - v)
            .fold((0.0, 0.0), |(s, sq), td| (s + td, sq + td * td));

        let critic_loss = sum_sq / n;
        self.weights.value += self.config.learning_rate * sum_td / n;
        self.weights.updates += 1;

        Ok(UpdateLosses {
            critic_1: critic_loss,
            critic_2: critic_loss,
            policy: -self.weights.value,
            entropy: 0.0,
            alpha: self.config.alpha,
        })
    }

    async fn update_parameters_compensator(&mut self, pool: &CompensatorRolloutPool) -> Result<()> {
        let steps = pool.total_steps();
        if steps == 0 {
            return Ok(());
        }

        let mut target = vec![0.0; self.action_dim];
        for step in pool.episodes().flat_map(|e| e.steps.iter()) {
            let correction = step.safety_action.checked_add(&step.compensator_action)?;
            for (t, c) in target.iter_mut().zip(correction.as_slice()) {
                *t += c / steps as f64;
            }
        }

        let rate = self.config.comp_rate;
        for (w, t) in self.weights.compensator.0.iter_mut().zip(&target) {
            *w += rate * (t - *w);
        }

        tracing::debug!(
            episodes = pool.len(),
            steps,
            compensator = ?self.weights.compensator,
            "compensator updated"
        );
        Ok(())
    }

    async fn save_model(&self, dir: &Path) -> Result<()> {
        write_json(&dir.join(AGENT_FILE), &self.weights)?;
        Ok(())
    }

    async fn load_weights(&mut self, dir: &Path) -> Result<()> {
        let weights: AgentWeights = read_json(&dir.join(AGENT_FILE))?;
        if weights.compensator.dim() != self.action_dim {
            anyhow::bail!(
                "stored compensator has dimension {}, agent expects {}",
                weights.compensator.dim(),
                self.action_dim
            );
        }
        self.weights = weights;
        Ok(())
    }

    async fn seed(&mut self, seed: u64) -> Result<()> {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::MockDynamics;
    use crate::memory::{BatchComposition, EpisodeRollout, Transition};

    fn request(observation: &[f64], evaluate: bool, warmup: bool) -> ActionRequest<'_> {
        ActionRequest {
            observation,
            warmup,
            safe_action: true,
            safety_context: None,
            evaluate,
        }
    }

    #[tokio::test]
    async fn evaluation_is_deterministic_proportional_control() {
        let mut agent = MockAgent::new(MockAgentConfig::default(), 2, false);
        let dynamics = MockDynamics::new(0.1, 10);
        let proposal = agent
            .select_action(&request(&[0.4, -0.3], true, true), &dynamics)
            .await
            .unwrap();
        assert_eq!(proposal.policy, Action(vec![-0.4, 0.3]));
        assert_eq!(proposal.safety, Some(Action(vec![0.0, 0.0])));
        assert!(proposal.compensator.is_none());
    }

    #[tokio::test]
    async fn safety_filter_clamps_to_bounds() {
        let mut agent = MockAgent::new(MockAgentConfig::default(), 2, false);
        let dynamics = MockDynamics::new(0.1, 10);
        let proposal = agent
            .select_action(&request(&[-2.5, 0.5], true, false), &dynamics)
            .await
            .unwrap();
        // Policy wants 2.5 in x; the filter removes the excess 1.5.
        let safety = proposal.safety.unwrap();
        assert!((safety.0[0] + 1.5).abs() < 1e-12);
        assert_eq!(safety.0[1], 0.0);
    }

    #[tokio::test]
    async fn warmup_actions_are_random_within_bounds() {
        let mut agent = MockAgent::new(MockAgentConfig::default(), 2, false);
        agent.seed(3).await.unwrap();
        let dynamics = MockDynamics::new(0.1, 10);
        for _ in 0..20 {
            let p = agent
                .select_action(&request(&[5.0, 5.0], false, true), &dynamics)
                .await
                .unwrap();
            assert!(p.policy.0.iter().all(|u| (-1.0..=1.0).contains(u)));
        }
    }

    #[tokio::test]
    async fn td_update_moves_value_towards_reward() {
        let mut agent = MockAgent::new(MockAgentConfig::default(), 1, false);
        let dynamics = MockDynamics::new(0.1, 10);
        let transition = Transition {
            state: vec![0.0],
            action: Action(vec![0.0]),
            reward: 1.0,
            next_state: vec![0.0],
            mask: 1.0,
            time: 0.0,
            next_time: 0.1,
            safety_context: None,
            next_safety_context: None,
        };
        let batch = TrainingBatch {
            transitions: vec![transition; 4],
            composition: BatchComposition {
                real: 4,
                synthetic: 0,
                real_ratio: None,
            },
        };
        let losses = agent.update_parameters(&batch, 0, &dynamics).await.unwrap();
        assert!((losses.critic_1 - 1.0).abs() < 1e-12);
        assert!(agent.value_estimate() > 0.0);
        assert_eq!(agent.updates(), 1);
    }

    #[tokio::test]
    async fn compensator_tracks_mean_correction() {
        let config = MockAgentConfig {
            comp_rate: 1.0,
            ..MockAgentConfig::default()
        };
        let mut agent = MockAgent::new(config, 2, true);
        let mut pool = CompensatorRolloutPool::new(4);
        let mut rollout = EpisodeRollout::new();
        rollout.push(&[0.0, 0.0], &Action(vec![-0.2, 0.0]), &Action(vec![0.0, 0.0]));
        rollout.push(&[0.0, 0.0], &Action(vec![-0.4, 0.2]), &Action(vec![0.0, 0.0]));
        pool.push(rollout);

        agent.update_parameters_compensator(&pool).await.unwrap();
        assert!(agent.compensator().approx_eq(&Action(vec![-0.3, 0.1]), 1e-12));
    }

    #[tokio::test]
    async fn weights_persist() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = MockAgent::new(MockAgentConfig::default(), 2, true);
        agent.weights.value = 4.5;
        agent.save_model(dir.path()).await.unwrap();

        let mut restored = MockAgent::new(MockAgentConfig::default(), 2, true);
        restored.load_weights(dir.path()).await.unwrap();
        assert_eq!(restored.value_estimate(), 4.5);

        let mut wrong_dim = MockAgent::new(MockAgentConfig::default(), 3, true);
        assert!(wrong_dim.load_weights(dir.path()).await.is_err());
    }

    #[test]
    fn unusable_action_bounds_are_rejected() {
        assert!(MockAgentConfig::default().validate().is_ok());
        for bound in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = MockAgentConfig {
                action_bound: bound,
                ..MockAgentConfig::default()
            };
            assert_eq!(
                config.validate(),
                Err(ConfigError::NonPositive {
                    field: "agent.action_bound"
                }),
                "bound={bound}"
            );
        }
        let noisy = MockAgentConfig {
            noise_scale: f64::NAN,
            ..MockAgentConfig::default()
        };
        assert!(matches!(
            noisy.validate(),
            Err(ConfigError::NotFinite {
                field: "agent.noise_scale",
                ..
            })
        ));
    }
}
