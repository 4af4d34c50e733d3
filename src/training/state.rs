//! Mutable state owned by the training loop.

use crate::config::TrainConfig;
use crate::memory::{CompensatorRolloutPool, TransitionStore};

/// Counters and data stores that live for the whole run.
///
/// Only the training loop mutates the counters. The episode driver receives
/// `&mut TrainingState` for the duration of one episode and touches the
/// stores only through `push` and `sample`.
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Environment steps taken across all training episodes.
    pub total_steps: u64,
    /// Parameter-update calls made so far.
    pub updates: u64,
    /// Index of the episode currently running (or about to run).
    pub episode: u64,
    pub real: TransitionStore,
    pub synthetic: TransitionStore,
    /// Present only when compensator training is enabled.
    pub compensator_pool: Option<CompensatorRolloutPool>,
}

impl TrainingState {
    pub fn new(config: &TrainConfig) -> Self {
        let seed = config.training.seed;
        let capacity = config.training.replay_size;
        Self {
            total_steps: 0,
            updates: 0,
            episode: 0,
            real: TransitionStore::new("real", capacity, seed),
            synthetic: TransitionStore::new("synthetic", capacity, seed),
            compensator_pool: config
                .compensator
                .enabled
                .then(|| CompensatorRolloutPool::new(config.compensator.pool_capacity)),
        }
    }

    /// The store-size gate before any update: the real store plus, when
    /// model-based augmentation is on, the synthetic store must exceed one
    /// batch.
    pub fn ready_for_update(&self, batch_size: usize, model_based: bool) -> bool {
        let synthetic = if model_based { self.synthetic.size() } else { 0 };
        self.real.size() + synthetic > batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Transition;
    use crate::safety::Action;

    fn transition() -> Transition {
        Transition {
            state: vec![0.0],
            action: Action(vec![0.0]),
            reward: 0.0,
            next_state: vec![0.0],
            mask: 1.0,
            time: 0.0,
            next_time: 0.1,
            safety_context: None,
            next_safety_context: None,
        }
    }

    #[test]
    fn pool_exists_only_with_compensator() {
        let mut config = TrainConfig::default();
        config.training.replay_size = 16;
        assert!(TrainingState::new(&config).compensator_pool.is_none());

        config.compensator.enabled = true;
        let state = TrainingState::new(&config);
        assert_eq!(state.compensator_pool.map(|p| p.capacity()), Some(50));
    }

    #[test]
    fn update_gate_counts_synthetic_only_when_model_based() {
        let mut config = TrainConfig::default();
        config.training.replay_size = 16;
        let mut state = TrainingState::new(&config);
        for _ in 0..3 {
            state.real.push(transition());
            state.synthetic.push(transition());
        }
        assert!(!state.ready_for_update(4, false));
        assert!(state.ready_for_update(4, true));
        assert!(!state.ready_for_update(6, true));
    }
}
