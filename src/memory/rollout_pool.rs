//! Per-episode rollouts used to train the compensator.

use serde::{Deserialize, Serialize};

use crate::safety::Action;

use super::ring::RingBuffer;

/// Default number of past episodes the compensator trains on.
pub const DEFAULT_POOL_CAPACITY: usize = 50;

/// One control step as seen by the compensator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutStep {
    pub observation: Vec<f64>,
    pub safety_action: Action,
    pub compensator_action: Action,
}

/// The ordered steps of a single episode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRollout {
    pub steps: Vec<RolloutStep>,
}

impl EpisodeRollout {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn push(&mut self, observation: &[f64], safety_action: &Action, compensator_action: &Action) {
        self.steps.push(RolloutStep {
            observation: observation.to_vec(),
            safety_action: safety_action.clone(),
            compensator_action: compensator_action.clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A bounded pool of the most recent episode rollouts.
#[derive(Debug, Clone)]
pub struct CompensatorRolloutPool {
    ring: RingBuffer<EpisodeRollout>,
}

impl CompensatorRolloutPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::new(capacity),
        }
    }

    /// Add an episode, overwriting the oldest one when the pool is full.
    pub fn push(&mut self, rollout: EpisodeRollout) {
        self.ring.push(rollout);
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn cursor(&self) -> usize {
        self.ring.cursor()
    }

    /// Episodes from oldest to newest.
    pub fn episodes(&self) -> impl Iterator<Item = &EpisodeRollout> {
        self.ring.iter_chronological()
    }

    /// Total number of steps across all pooled episodes.
    pub fn total_steps(&self) -> usize {
        self.ring.iter().map(EpisodeRollout::len).sum()
    }

    /// Owned copy of the pooled episodes, oldest first.
    pub fn to_vec(&self) -> Vec<EpisodeRollout> {
        self.episodes().cloned().collect()
    }
}

impl Default for CompensatorRolloutPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}
