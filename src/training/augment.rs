//! Model-based rollout augmentation.
//!
//! The episode driver decides *when* to augment (see [`AugmentSchedule`]);
//! a [`RolloutAugmentor`] decides *how*. The built-in
//! [`ModelRolloutAugmentor`] branches short policy rollouts off real start
//! states through the dynamics model's one-step prediction.

use anyhow::{Context, Result};
use tracing::debug;

use crate::agent::{ActionRequest, Agent};
use crate::dynamics::DynamicsModel;
use crate::env::Environment;
use crate::memory::{Transition, TransitionStore};
use crate::safety::ActionComposer;

/// Episode steps between two augmentation passes.
pub const AUGMENT_EVERY_STEPS: usize = 5;

/// Start states per pass are `ROLLOUT_BATCH_MULTIPLIER * rollout_batch_size`,
/// capped by the real store's size.
pub const ROLLOUT_BATCH_MULTIPLIER: usize = 5;

/// Inputs to one augmentation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AugmentRequest {
    /// Model steps per rollout.
    pub horizon: usize,
    /// Number of start states drawn from the real store.
    pub batch_size: usize,
    /// The policy is still exploring at random.
    pub warmup: bool,
}

/// When augmentation runs and how large each pass is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AugmentSchedule {
    pub enabled: bool,
    pub horizon: usize,
    pub rollout_batch_size: usize,
    /// Warmup lasts while the global step count is below this.
    pub start_steps: u64,
}

impl AugmentSchedule {
    /// The request for this step, or `None` when no pass is due.
    ///
    /// A pass is due every [`AUGMENT_EVERY_STEPS`] episode steps once the
    /// real store holds at least a third of the dynamics model's history
    /// capacity.
    pub fn request(
        &self,
        episode_steps: usize,
        total_steps: u64,
        real_size: usize,
        max_history_count: usize,
    ) -> Option<AugmentRequest> {
        let due = self.enabled
            && episode_steps % AUGMENT_EVERY_STEPS == 0
            && real_size > 0
            && 3 * real_size >= max_history_count;
        due.then(|| AugmentRequest {
            horizon: self.horizon,
            batch_size: real_size.min(ROLLOUT_BATCH_MULTIPLIER * self.rollout_batch_size),
            warmup: total_steps < self.start_steps,
        })
    }
}

/// Generates synthetic transitions into the synthetic store.
#[allow(async_fn_in_trait)]
pub trait RolloutAugmentor {
    /// Run one pass and return the number of transitions appended.
    async fn augment<E, A, D>(
        &mut self,
        request: AugmentRequest,
        env: &E,
        real: &mut TransitionStore,
        synthetic: &mut TransitionStore,
        agent: &mut A,
        dynamics: &D,
    ) -> Result<usize>
    where
        E: Environment,
        A: Agent,
        D: DynamicsModel;
}

/// Branches `horizon`-step policy rollouts off sampled real states.
///
/// Actions are composed exactly as in the real environment, and the stored
/// action is the residual policy action. Rollouts are never time-limit
/// truncations, so every synthetic transition carries mask 1.
#[derive(Debug, Clone, Copy)]
pub struct ModelRolloutAugmentor {
    composer: ActionComposer,
}

impl ModelRolloutAugmentor {
    pub fn new(composer: ActionComposer) -> Self {
        Self { composer }
    }
}

impl RolloutAugmentor for ModelRolloutAugmentor {
    async fn augment<E, A, D>(
        &mut self,
        request: AugmentRequest,
        env: &E,
        real: &mut TransitionStore,
        synthetic: &mut TransitionStore,
        agent: &mut A,
        dynamics: &D,
    ) -> Result<usize>
    where
        E: Environment,
        A: Agent,
        D: DynamicsModel,
    {
        let starts = real
            .sample(request.batch_size)
            .context("failed to sample rollout start states")?;
        let dt = env.dt();
        let mut appended = 0usize;

        for start in starts {
            let mut observation = start.state;
            let mut time = start.time;
            let context = start.safety_context;

            for _ in 0..request.horizon {
                let proposal = agent
                    .select_action(
                        &ActionRequest {
                            observation: &observation,
                            warmup: request.warmup,
                            safe_action: self.composer.wants_safety(),
                            safety_context: context.as_ref(),
                            evaluate: false,
                        },
                        dynamics,
                    )
                    .await?;
                let composed = self.composer.compose(&proposal)?;
                let next = dynamics
                    .predict_next_observation(&observation, &composed.applied, time)
                    .await
                    .context("dynamics prediction failed during rollout")?;
                let reward = env.reward(&observation, &composed.applied, &next).await?;

                synthetic.push(Transition {
                    state: observation,
                    action: composed.stored,
                    reward,
                    next_state: next.clone(),
                    mask: 1.0,
                    time,
                    next_time: time + dt,
                    safety_context: context.clone(),
                    next_safety_context: context.clone(),
                });
                appended += 1;
                observation = next;
                time += dt;
            }
        }

        debug!(
            appended,
            synthetic_size = synthetic.size(),
            warmup = request.warmup,
            "model rollouts generated"
        );
        Ok(appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{MockAgent, MockAgentConfig};
    use crate::dynamics::MockDynamics;
    use crate::env::PointMassEnv;
    use crate::safety::{Action, SafetyMode};

    fn schedule() -> AugmentSchedule {
        AugmentSchedule {
            enabled: true,
            horizon: 2,
            rollout_batch_size: 5,
            start_steps: 100,
        }
    }

    #[test]
    fn passes_are_due_every_fifth_step_once_enough_data_exists() {
        let s = schedule();
        assert!(s.request(0, 0, 9, 30).is_none());
        let req = s.request(0, 0, 10, 30).unwrap();
        assert_eq!(req.batch_size, 10);
        assert!(req.warmup);
        assert!(s.request(3, 0, 10, 30).is_none());

        let req = s.request(10, 500, 1000, 30).unwrap();
        assert_eq!(req.batch_size, 25);
        assert!(!req.warmup);

        let off = AugmentSchedule {
            enabled: false,
            ..s
        };
        assert!(off.request(0, 0, 1000, 30).is_none());
    }

    #[tokio::test]
    async fn rollouts_append_residual_transitions() {
        let env = PointMassEnv::default();
        let mut agent = MockAgent::new(MockAgentConfig::default(), 2, false);
        let dynamics = MockDynamics::new(0.1, 30);
        let mut real = TransitionStore::new("real", 100, 1);
        let mut synthetic = TransitionStore::new("synthetic", 100, 1);
        real.push(Transition {
            state: vec![-2.0, -2.0],
            action: Action(vec![0.0, 0.0]),
            reward: 0.0,
            next_state: vec![-2.0, -2.0],
            mask: 1.0,
            time: 0.3,
            next_time: 0.4,
            safety_context: None,
            next_safety_context: None,
        });

        let mut augmentor =
            ModelRolloutAugmentor::new(ActionComposer::new(SafetyMode::Baseline, false));
        let request = AugmentRequest {
            horizon: 2,
            batch_size: 3,
            warmup: false,
        };
        let n = augmentor
            .augment(request, &env, &mut real, &mut synthetic, &mut agent, &dynamics)
            .await
            .unwrap();

        assert_eq!(n, 6);
        assert_eq!(synthetic.size(), 6);
        assert_eq!(real.size(), 1);
        for t in synthetic.iter() {
            assert_eq!(t.mask, 1.0);
            assert!((t.next_time - t.time - 0.1).abs() < 1e-12);
        }
    }
}
