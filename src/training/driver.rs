//! Runs one training episode.
//!
//! ```text
//! RESET -> STEPPING -> per step:
//!   MAYBE_AUGMENT -> MAYBE_UPDATE -> ACT -> OBSERVE -> STORE
//!   -> MAYBE_FIT_DYNAMICS -> MAYBE_ACCUMULATE_COMPENSATOR_ROLLOUT
//! -> loop until done -> TERMINATED
//! ```

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::agent::{ActionRequest, Agent};
use crate::config::TrainConfig;
use crate::dynamics::DynamicsModel;
use crate::env::Environment;
use crate::memory::{EpisodeRollout, Transition};
use crate::metrics::MetricsSink;
use crate::safety::ActionComposer;

use super::augment::{AugmentSchedule, RolloutAugmentor};
use super::mixing::MixingScheduler;
use super::state::TrainingState;

/// Feed the dynamics model every this many episode steps.
pub const DYNAMICS_APPEND_EVERY: usize = 2;

const PROGRESS_EVERY: usize = 10;

/// What one episode produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeOutcome {
    pub reward: f64,
    pub cost: f64,
    pub steps: usize,
    /// Per-step compensator training data, when the compensator is enabled.
    pub rollout: Option<EpisodeRollout>,
}

/// Continuation mask for a transition that ended at `episode_steps`.
///
/// 0 at the time limit regardless of the raw `done` signal, 0 on any other
/// termination, 1 otherwise.
pub fn continuation_mask(episode_steps: usize, max_episode_steps: usize, done: bool) -> f64 {
    if episode_steps == max_episode_steps || done {
        0.0
    } else {
        1.0
    }
}

/// Per-episode control flow, configured once per run.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeDriver {
    pub composer: ActionComposer,
    pub mixing: MixingScheduler,
    pub augment: AugmentSchedule,
    pub batch_size: usize,
    pub updates_per_step: usize,
    pub start_steps: u64,
    pub model_based: bool,
    pub gp_max_episodes: u64,
}

impl EpisodeDriver {
    pub fn from_config(config: &TrainConfig) -> Self {
        let mb = &config.model_based;
        Self {
            composer: ActionComposer::new(config.safety.cbf_mode, config.compensator.enabled),
            mixing: MixingScheduler::new(mb.real_ratio, config.training.batch_size, mb.enabled),
            augment: AugmentSchedule {
                enabled: mb.enabled,
                horizon: mb.k_horizon,
                rollout_batch_size: mb.rollout_batch_size,
                start_steps: config.training.start_steps,
            },
            batch_size: config.training.batch_size,
            updates_per_step: config.training.updates_per_step,
            start_steps: config.training.start_steps,
            model_based: mb.enabled,
            gp_max_episodes: config.dynamics.gp_max_episodes,
        }
    }

    /// Run episode `state.episode` to termination.
    ///
    /// Advances `state.total_steps` and `state.updates`; the caller owns the
    /// episode counter.
    pub async fn run_episode<E, A, D, R, M>(
        &self,
        state: &mut TrainingState,
        env: &mut E,
        agent: &mut A,
        dynamics: &mut D,
        augmentor: &mut R,
        metrics: &mut M,
    ) -> Result<EpisodeOutcome>
    where
        E: Environment,
        A: Agent,
        D: DynamicsModel,
        R: RolloutAugmentor,
        M: MetricsSink,
    {
        let episode = state.episode;
        let dt = env.dt();
        let max_episode_steps = env.max_episode_steps();

        let reset = env.reset().await.context("environment reset failed")?;
        let mut observation = reset.observation;
        let mut context = reset.info.safety_context;
        let mut rollout = self.composer.compensator_enabled.then(EpisodeRollout::new);

        let mut episode_reward = 0.0;
        let mut episode_cost = 0.0;
        let mut episode_steps = 0usize;
        let mut done = false;

        while !done {
            if episode_steps % PROGRESS_EVERY == 0 {
                debug!(
                    episode,
                    step = episode_steps,
                    reward = episode_reward,
                    cost = episode_cost,
                    "episode progress"
                );
            }

            if let Some(request) = self.augment.request(
                episode_steps,
                state.total_steps,
                state.real.size(),
                dynamics.max_history_count(),
            ) {
                augmentor
                    .augment(
                        request,
                        &*env,
                        &mut state.real,
                        &mut state.synthetic,
                        agent,
                        &*dynamics,
                    )
                    .await
                    .context("model rollout augmentation failed")?;
            }

            if state.ready_for_update(self.batch_size, self.model_based) {
                for _ in 0..self.updates_per_step {
                    let batch = self.mixing.draw(&mut state.real, &mut state.synthetic)?;
                    let losses = agent
                        .update_parameters(&batch, state.updates, &*dynamics)
                        .await
                        .with_context(|| format!("parameter update {} failed", state.updates))?;
                    for (key, value) in losses.metrics() {
                        metrics.emit(key, value, state.updates)?;
                    }
                    state.updates += 1;
                }
            }

            let proposal = agent
                .select_action(
                    &ActionRequest {
                        observation: &observation,
                        warmup: state.total_steps < self.start_steps,
                        safe_action: self.composer.wants_safety(),
                        safety_context: context.as_ref(),
                        evaluate: false,
                    },
                    &*dynamics,
                )
                .await
                .context("action selection failed")?;
            let composed = self.composer.compose(&proposal)?;

            let step = env
                .step(&composed.applied)
                .await
                .context("environment step failed")?;
            if step.info.cost_exception {
                warn!(episode, step = episode_steps + 1, "cost exception occurred");
            }

            episode_steps += 1;
            state.total_steps += 1;
            episode_reward += step.reward;
            episode_cost += step.info.cost;

            let time = episode_steps as f64 * dt;
            state.real.push(Transition {
                state: observation.clone(),
                action: composed.stored.clone(),
                reward: step.reward,
                next_state: step.observation.clone(),
                mask: continuation_mask(episode_steps, max_episode_steps, step.done),
                time,
                next_time: (episode_steps + 1) as f64 * dt,
                safety_context: context.clone(),
                next_safety_context: step.info.safety_context.clone(),
            });

            if episode_steps % DYNAMICS_APPEND_EVERY == 0 && episode < self.gp_max_episodes {
                let model_state = dynamics.get_state(&observation).await?;
                let next_model_state = dynamics.get_state(&step.observation).await?;
                dynamics
                    .append_transition(&model_state, &composed.applied, &next_model_state, time)
                    .await
                    .context("dynamics data collection failed")?;
            }

            if let Some(rollout) = rollout.as_mut() {
                rollout.push(&observation, &composed.safety, &composed.compensator);
            }

            observation = step.observation;
            context = step.info.safety_context;
            done = step.done;
        }

        Ok(EpisodeOutcome {
            reward: episode_reward,
            cost: episode_cost,
            steps: episode_steps,
            rollout,
        })
    }
}
