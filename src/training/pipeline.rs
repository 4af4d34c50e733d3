//! The outer training loop.
//!
//! ```text
//! prepare: validate config, seed collaborators, optionally load weights
//! for episode = 0 .. max_episodes:
//!   a. run the episode driver (augment, update, act, store, fit dynamics)
//!   b. compensator: flush rollout into the pool; train on cadence
//!   c. every checkpoint_interval episodes (episode > 0): save checkpoint
//!   d. emit reward/train, cost/train
//!   e. every eval interval: deterministic evaluation, emit averages
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::checkpoint::{save_checkpoint, CheckpointManifest, ResumeTarget};
use crate::config::TrainConfig;
use crate::dynamics::DynamicsModel;
use crate::env::Environment;
use crate::error::OrchestratorError;
use crate::memory::EpisodeRollout;
use crate::metrics::MetricsSink;

use super::augment::RolloutAugmentor;
use super::driver::{EpisodeDriver, EpisodeOutcome};
use super::evaluation::{evaluate_policy, EvaluationSummary};
use super::state::TrainingState;

/// What a finished run reports back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub episodes: u64,
    pub total_steps: u64,
    pub updates: u64,
    pub episode_rewards: Vec<f64>,
    pub last_evaluation: Option<EvaluationSummary>,
}

/// Owns the collaborators and the training state for one run.
pub struct TrainingLoop<E, A, D, R, M> {
    config: TrainConfig,
    driver: EpisodeDriver,
    state: TrainingState,
    output_dir: PathBuf,
    env: E,
    agent: A,
    dynamics: D,
    augmentor: R,
    metrics: M,
}

impl<E, A, D, R, M> TrainingLoop<E, A, D, R, M>
where
    E: Environment,
    A: Agent,
    D: DynamicsModel,
    R: RolloutAugmentor,
    M: MetricsSink,
{
    /// Validate `config` and assemble a loop. Nothing runs yet.
    pub fn new(
        config: TrainConfig,
        output_dir: impl Into<PathBuf>,
        env: E,
        agent: A,
        dynamics: D,
        augmentor: R,
        metrics: M,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self {
            driver: EpisodeDriver::from_config(&config),
            state: TrainingState::new(&config),
            output_dir: output_dir.into(),
            config,
            env,
            agent,
            dynamics,
            augmentor,
            metrics,
        })
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn dynamics(&self) -> &D {
        &self.dynamics
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Seed every collaborator (when the seed is non-zero) and load agent
    /// weights when resuming from a numbered run.
    pub async fn prepare(&mut self, resume: Option<&ResumeTarget>) -> Result<()> {
        let seed = self.config.training.seed;
        if seed > 0 {
            self.env.seed(seed).await.context("failed to seed environment")?;
            self.dynamics
                .seed(seed)
                .await
                .context("failed to seed dynamics model")?;
            self.agent.seed(seed).await.context("failed to seed agent")?;
        }

        if let Some(target) = resume.filter(|t| t.load_agent) {
            self.agent
                .load_weights(&target.dir)
                .await
                .with_context(|| format!("failed to load agent from {}", target.dir.display()))?;
            info!(dir = %target.dir.display(), "agent weights loaded");
        }

        info!(
            name = %self.config.experiment_name(),
            tags = ?self.config.experiment_tags(),
            output = %self.output_dir.display(),
            "training prepared"
        );
        Ok(())
    }

    /// Train for the configured number of episodes.
    pub async fn run(&mut self) -> Result<TrainingReport> {
        let mut report = TrainingReport::default();
        while self.state.episode < self.config.training.max_episodes {
            let (outcome, evaluation) = self.run_episode().await?;
            report.episode_rewards.push(outcome.reward);
            if evaluation.is_some() {
                report.last_evaluation = evaluation;
            }
        }
        self.metrics.flush()?;

        report.episodes = self.state.episode;
        report.total_steps = self.state.total_steps;
        report.updates = self.state.updates;
        info!(
            episodes = report.episodes,
            total_steps = report.total_steps,
            updates = report.updates,
            "training finished"
        );
        Ok(report)
    }

    /// Run one full episode iteration and advance the episode counter.
    pub async fn run_episode(&mut self) -> Result<(EpisodeOutcome, Option<EvaluationSummary>)> {
        let episode = self.state.episode;
        let mut outcome = self
            .driver
            .run_episode(
                &mut self.state,
                &mut self.env,
                &mut self.agent,
                &mut self.dynamics,
                &mut self.augmentor,
                &mut self.metrics,
            )
            .await
            .with_context(|| format!("episode {episode} failed"))?;

        if let Some(rollout) = outcome.rollout.take() {
            self.train_compensator(episode, rollout).await?;
        }

        let interval = self.config.training.checkpoint_interval;
        if episode > 0 && episode % interval == 0 {
            let manifest = CheckpointManifest {
                episode,
                total_steps: self.state.total_steps,
                updates: self.state.updates,
                saved_at: Utc::now(),
            };
            save_checkpoint(&self.output_dir, &self.agent, &self.dynamics, &manifest).await?;
        }

        self.metrics.emit("reward/train", outcome.reward, episode)?;
        self.metrics.emit("cost/train", outcome.cost, episode)?;
        info!(
            episode,
            total_steps = self.state.total_steps,
            steps = outcome.steps,
            reward = outcome.reward,
            cost = outcome.cost,
            "episode finished"
        );

        let evaluation = if self.config.evaluation.enabled
            && episode % self.config.evaluation.interval == 0
        {
            Some(self.evaluate(episode).await?)
        } else {
            None
        };

        self.state.episode += 1;
        Ok((outcome, evaluation))
    }

    async fn train_compensator(&mut self, episode: u64, rollout: EpisodeRollout) -> Result<()> {
        let cfg = &self.config.compensator;
        if episode >= cfg.train_episodes {
            return Ok(());
        }
        let Some(pool) = self.state.compensator_pool.as_mut() else {
            warn!(episode, "compensator rollout produced without a pool");
            return Ok(());
        };

        pool.push(rollout);
        if episode % cfg.update_episode == 0 {
            info!(episode, pool_size = pool.len(), "training compensator");
            self.agent
                .update_parameters_compensator(pool)
                .await
                .context("compensator update failed")?;
        }
        Ok(())
    }

    async fn evaluate(&mut self, episode: u64) -> Result<EvaluationSummary> {
        info!(
            real = self.state.real.size(),
            synthetic = self.state.synthetic.size(),
            "replay buffer sizes"
        );
        let summary = evaluate_policy(
            &mut self.env,
            &mut self.agent,
            &self.dynamics,
            self.driver.composer,
            self.config.evaluation.episodes,
        )
        .await
        .with_context(|| format!("evaluation after episode {episode} failed"))?;

        self.metrics
            .emit("avg_reward/test", summary.avg_reward(), episode)?;
        self.metrics.emit("avg_cost/test", summary.avg_cost(), episode)?;
        info!(
            episodes = summary.episodes.len(),
            avg_reward = summary.avg_reward(),
            avg_cost = summary.avg_cost(),
            "evaluation finished"
        );
        Ok(summary)
    }
}
