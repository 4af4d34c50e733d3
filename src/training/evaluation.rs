//! Deterministic policy evaluation.
//!
//! An evaluation pass is a reduced episode driver: actions are selected with
//! `evaluate = true`, nothing is stored, and nothing is learned. The pass
//! never sees the transition stores and never calls an update method.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::debug;

use crate::agent::{ActionRequest, Agent};
use crate::dynamics::DynamicsModel;
use crate::env::Environment;
use crate::safety::ActionComposer;

/// Result of one evaluation episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalEpisode {
    pub reward: f64,
    pub cost: f64,
    pub steps: usize,
    /// Terminated before the time limit.
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationSummary {
    pub episodes: Vec<EvalEpisode>,
    /// Wall-clock time spent inside `select_action`.
    pub policy_time: Duration,
    pub policy_calls: usize,
}

impl EvaluationSummary {
    pub fn rewards(&self) -> Vec<f64> {
        self.episodes.iter().map(|e| e.reward).collect()
    }

    pub fn avg_reward(&self) -> f64 {
        mean(self.episodes.iter().map(|e| e.reward))
    }

    pub fn avg_cost(&self) -> f64 {
        mean(self.episodes.iter().map(|e| e.cost))
    }

    /// Population standard deviation of episode rewards.
    pub fn std_reward(&self) -> f64 {
        let n = self.episodes.len();
        if n == 0 {
            return 0.0;
        }
        let mu = self.avg_reward();
        let var = self
            .episodes
            .iter()
            .map(|e| (e.reward - mu).powi(2))
            .sum::<f64>()
            / n as f64;
        var.sqrt()
    }

    pub fn completion_rate(&self) -> f64 {
        mean(
            self.episodes
                .iter()
                .map(|e| if e.completed { 1.0 } else { 0.0 }),
        )
    }

    pub fn mean_policy_time(&self) -> Duration {
        if self.policy_calls == 0 {
            return Duration::ZERO;
        }
        self.policy_time / self.policy_calls as u32
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Run `episodes` deterministic episodes and collect their returns.
pub async fn evaluate_policy<E, A, D>(
    env: &mut E,
    agent: &mut A,
    dynamics: &D,
    composer: ActionComposer,
    episodes: usize,
) -> Result<EvaluationSummary>
where
    E: Environment,
    A: Agent,
    D: DynamicsModel,
{
    let max_episode_steps = env.max_episode_steps();
    let mut summary = EvaluationSummary::default();

    for index in 0..episodes {
        let reset = env
            .reset()
            .await
            .context("environment reset failed during evaluation")?;
        let mut observation = reset.observation;
        let mut context = reset.info.safety_context;
        let mut result = EvalEpisode {
            reward: 0.0,
            cost: 0.0,
            steps: 0,
            completed: false,
        };
        let mut done = false;

        while !done {
            let started = Instant::now();
            let proposal = agent
                .select_action(
                    &ActionRequest {
                        observation: &observation,
                        warmup: false,
                        safe_action: composer.wants_safety(),
                        safety_context: context.as_ref(),
                        evaluate: true,
                    },
                    dynamics,
                )
                .await?;
            summary.policy_time += started.elapsed();
            summary.policy_calls += 1;

            let composed = composer.compose(&proposal)?;
            let step = env.step(&composed.applied).await?;
            result.reward += step.reward;
            result.cost += step.info.cost;
            result.steps += 1;
            observation = step.observation;
            context = step.info.safety_context;
            done = step.done;
        }
        result.completed = result.steps < max_episode_steps;

        debug!(
            episode = index,
            reward = result.reward,
            cost = result.cost,
            steps = result.steps,
            "evaluation episode finished"
        );
        summary.episodes.push(result);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{MockAgent, MockAgentConfig};
    use crate::dynamics::MockDynamics;
    use crate::env::{PointMassConfig, PointMassEnv};
    use crate::safety::SafetyMode;

    #[tokio::test]
    async fn repeated_passes_with_the_same_seed_match() {
        let mut env = PointMassEnv::new(PointMassConfig {
            rand_init: true,
            max_episode_steps: 40,
            ..PointMassConfig::default()
        });
        let mut agent = MockAgent::new(MockAgentConfig::default(), 2, false);
        let dynamics = MockDynamics::new(0.1, 10);
        let composer = ActionComposer::new(SafetyMode::Mod, false);

        env.seed(7).await.unwrap();
        let first = evaluate_policy(&mut env, &mut agent, &dynamics, composer, 3)
            .await
            .unwrap();
        env.seed(7).await.unwrap();
        let second = evaluate_policy(&mut env, &mut agent, &dynamics, composer, 3)
            .await
            .unwrap();

        assert_eq!(first.rewards(), second.rewards());
        assert_eq!(first.episodes.len(), 3);
        assert_eq!(agent.updates(), 0);
    }

    #[test]
    fn summary_statistics() {
        let summary = EvaluationSummary {
            episodes: vec![
                EvalEpisode {
                    reward: 1.0,
                    cost: 0.0,
                    steps: 10,
                    completed: true,
                },
                EvalEpisode {
                    reward: 3.0,
                    cost: 2.0,
                    steps: 100,
                    completed: false,
                },
            ],
            policy_time: Duration::from_millis(10),
            policy_calls: 5,
        };
        assert_eq!(summary.avg_reward(), 2.0);
        assert_eq!(summary.avg_cost(), 1.0);
        assert_eq!(summary.std_reward(), 1.0);
        assert_eq!(summary.completion_rate(), 0.5);
        assert_eq!(summary.mean_policy_time(), Duration::from_millis(2));
        assert_eq!(EvaluationSummary::default().avg_reward(), 0.0);
    }
}
