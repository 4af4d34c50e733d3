//! Replay store for environment and model-generated transitions.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::OrchestratorError;

use super::ring::RingBuffer;
use super::transition::Transition;

/// A bounded, overwrite-on-full transition store with uniform sampling.
///
/// Two independent instances exist during training: one for real transitions
/// and one for synthetic rollouts. Each owns its own seeded RNG, so sampling
/// one never perturbs the other.
#[derive(Debug, Clone)]
pub struct TransitionStore {
    label: &'static str,
    ring: RingBuffer<Transition>,
    rng: ChaCha8Rng,
}

impl TransitionStore {
    /// Create an empty store. `capacity` must be non-zero.
    pub fn new(label: &'static str, capacity: usize, seed: u64) -> Self {
        Self {
            label,
            ring: RingBuffer::new(capacity),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Insert a transition, evicting the oldest one when full.
    pub fn push(&mut self, transition: Transition) {
        self.ring.push(transition);
    }

    /// Draw `n` transitions uniformly at random, with replacement.
    ///
    /// `n` may exceed [`size`](Self::size); duplicates are then expected.
    pub fn sample(&mut self, n: usize) -> Result<Vec<Transition>, OrchestratorError> {
        let size = self.ring.len();
        if size == 0 {
            return Err(OrchestratorError::EmptyStore { store: self.label });
        }
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let idx = self.rng.gen_range(0..size);
            if let Some(t) = self.ring.get(idx) {
                out.push(t.clone());
            }
        }
        Ok(out)
    }

    /// Logical size.
    pub fn size(&self) -> usize {
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

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Stored transitions from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.ring.iter_chronological()
    }
}
