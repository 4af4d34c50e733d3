//! Built-in point-mass navigation task.
//!
//! A planar single integrator `p' = p + a·dt` has to reach the origin while a
//! circular hazard sits on the straight-line path from the default start.
//! Entering the hazard costs 1 per step; reaching its inner half raises a
//! `cost_exception`. The task is deterministic given its seed, which makes it
//! the environment of choice for tests and for `--env point-mass` runs.

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::safety::Action;

use super::traits::{EnvReset, EnvSpec, EnvStep, Environment, SafetyContext, StepInfo};

/// Parameters of the point-mass task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointMassConfig {
    pub max_episode_steps: usize,
    pub dt: f64,
    /// Start position when `rand_init` is false.
    pub start: [f64; 2],
    /// Draw the start position uniformly from `[-3, -2]²` instead.
    pub rand_init: bool,
    pub hazard_center: [f64; 2],
    pub hazard_radius: f64,
    /// Distance to the origin at which the goal counts as reached.
    pub goal_radius: f64,
    pub action_bound: f64,
}

impl Default for PointMassConfig {
    fn default() -> Self {
        Self {
            max_episode_steps: 100,
            dt: 0.1,
            start: [-2.5, -2.5],
            rand_init: false,
            hazard_center: [-1.2, -1.2],
            hazard_radius: 0.5,
            goal_radius: 0.2,
            action_bound: 1.0,
        }
    }
}

const STEP_PENALTY: f64 = 0.01;
const GOAL_BONUS: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct PointMassEnv {
    config: PointMassConfig,
    spec: EnvSpec,
    rng: ChaCha8Rng,
    position: [f64; 2],
    episode_step: usize,
    done: bool,
}

impl PointMassEnv {
    pub fn new(config: PointMassConfig) -> Self {
        let spec = EnvSpec {
            name: "PointMass".into(),
            observation_dim: 2,
            action_dim: 2,
            action_bound: config.action_bound,
            max_episode_steps: config.max_episode_steps,
            dt: config.dt,
        };
        Self {
            position: config.start,
            config,
            spec,
            rng: ChaCha8Rng::seed_from_u64(0),
            episode_step: 0,
            done: false,
        }
    }

    /// Default task with a custom time limit.
    pub fn with_max_steps(max_episode_steps: usize) -> Self {
        Self::new(PointMassConfig {
            max_episode_steps,
            ..PointMassConfig::default()
        })
    }

    pub fn episode_step(&self) -> usize {
        self.episode_step
    }

    fn observation(&self) -> Vec<f64> {
        self.position.to_vec()
    }

    fn safety_context(&self) -> SafetyContext {
        SafetyContext(serde_json::json!({
            "position": self.position,
            "hazard_center": self.config.hazard_center,
            "hazard_radius": self.config.hazard_radius,
            "action_bound": self.config.action_bound,
        }))
    }

    fn hazard_distance(&self, p: &[f64]) -> f64 {
        distance(p, &self.config.hazard_center)
    }

    fn transition_reward(&self, observation: &[f64], next_observation: &[f64]) -> f64 {
        let before = distance(observation, &[0.0, 0.0]);
        let after = distance(next_observation, &[0.0, 0.0]);
        let bonus = if after < self.config.goal_radius {
            GOAL_BONUS
        } else {
            0.0
        };
        before - after - STEP_PENALTY + bonus
    }
}

impl Default for PointMassEnv {
    fn default() -> Self {
        Self::new(PointMassConfig::default())
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

impl Environment for PointMassEnv {
    async fn reset(&mut self) -> Result<EnvReset> {
        self.episode_step = 0;
        self.done = false;
        self.position = if self.config.rand_init {
            [self.rng.gen_range(-3.0..-2.0), self.rng.gen_range(-3.0..-2.0)]
        } else {
            self.config.start
        };

        Ok(EnvReset {
            observation: self.observation(),
            info: StepInfo {
                cost: 0.0,
                cost_exception: false,
                safety_context: Some(self.safety_context()),
            },
        })
    }

    async fn step(&mut self, action: &Action) -> Result<EnvStep> {
        if self.done {
            anyhow::bail!("cannot step in a terminated episode");
        }
        if action.dim() != self.spec.action_dim {
            anyhow::bail!(
                "expected a {}-dimensional action, got {}",
                self.spec.action_dim,
                action.dim()
            );
        }

        let before = self.observation();
        for (p, a) in self.position.iter_mut().zip(action.as_slice()) {
            *p += a * self.config.dt;
        }
        self.episode_step += 1;
        let after = self.observation();

        let hazard = self.hazard_distance(&after);
        let cost = if hazard < self.config.hazard_radius {
            1.0
        } else {
            0.0
        };
        let reached = distance(&after, &[0.0, 0.0]) < self.config.goal_radius;
        let truncated = self.episode_step >= self.config.max_episode_steps;
        self.done = reached || truncated;

        Ok(EnvStep {
            reward: self.transition_reward(&before, &after),
            observation: after,
            done: self.done,
            info: StepInfo {
                cost,
                cost_exception: hazard < 0.5 * self.config.hazard_radius,
                safety_context: Some(self.safety_context()),
            },
        })
    }

    async fn seed(&mut self, seed: u64) -> Result<()> {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        Ok(())
    }

    async fn reward(
        &self,
        observation: &[f64],
        _action: &Action,
        next_observation: &[f64],
    ) -> Result<f64> {
        Ok(self.transition_reward(observation, next_observation))
    }

    fn spec(&self) -> &EnvSpec {
        &self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn truncates_at_the_time_limit() {
        let mut env = PointMassEnv::with_max_steps(5);
        env.reset().await.unwrap();
        let idle = Action::zeros(2);
        let mut steps = 0;
        loop {
            let out = env.step(&idle).await.unwrap();
            steps += 1;
            if out.done {
                break;
            }
        }
        assert_eq!(steps, 5);
        assert!(env.step(&idle).await.is_err());
    }

    #[tokio::test]
    async fn reaching_the_goal_ends_the_episode_with_a_bonus() {
        let mut env = PointMassEnv::new(PointMassConfig {
            start: [0.25, 0.0],
            ..PointMassConfig::default()
        });
        env.reset().await.unwrap();
        let out = env.step(&Action(vec![-1.0, 0.0])).await.unwrap();
        assert!(out.done);
        assert!(out.reward > GOAL_BONUS);
    }

    #[tokio::test]
    async fn hazard_incurs_cost_and_exception() {
        let mut env = PointMassEnv::new(PointMassConfig {
            start: [-1.2, -1.2],
            ..PointMassConfig::default()
        });
        env.reset().await.unwrap();
        let out = env.step(&Action::zeros(2)).await.unwrap();
        assert_eq!(out.info.cost, 1.0);
        assert!(out.info.cost_exception);
        assert!(out.info.safety_context.is_some());
    }

    #[tokio::test]
    async fn seeded_random_starts_are_reproducible() {
        let config = PointMassConfig {
            rand_init: true,
            ..PointMassConfig::default()
        };
        let mut a = PointMassEnv::new(config.clone());
        let mut b = PointMassEnv::new(config);
        a.seed(9).await.unwrap();
        b.seed(9).await.unwrap();
        for _ in 0..3 {
            let ra = a.reset().await.unwrap();
            let rb = b.reset().await.unwrap();
            assert_eq!(ra.observation, rb.observation);
            assert!(ra.observation.iter().all(|x| (-3.0..-2.0).contains(x)));
        }
    }

    #[tokio::test]
    async fn reward_function_matches_step_reward() {
        let mut env = PointMassEnv::default();
        let reset = env.reset().await.unwrap();
        let action = Action(vec![0.4, 0.7]);
        let out = env.step(&action).await.unwrap();
        let predicted = env
            .reward(&reset.observation, &action, &out.observation)
            .await
            .unwrap();
        assert!((predicted - out.reward).abs() < 1e-12);
    }
}
