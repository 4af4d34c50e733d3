//! Transition and batch types exchanged with the learner.

use serde::{Deserialize, Serialize};

use crate::env::SafetyContext;
use crate::safety::Action;

/// One environment (or model-generated) transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Observation before the action.
    pub state: Vec<f64>,
    /// Residual policy action when decomposition is active, otherwise the
    /// applied action.
    pub action: Action,
    pub reward: f64,
    /// Observation after the action.
    pub next_state: Vec<f64>,
    /// 0.0 or 1.0; multiplies the bootstrapped value of `next_state`.
    pub mask: f64,
    /// Time stamp of `state` within the episode, in seconds.
    pub time: f64,
    /// Time stamp of `next_state` within the episode, in seconds.
    pub next_time: f64,
    /// Safety-filter context observed with `state`.
    #[serde(default)]
    pub safety_context: Option<SafetyContext>,
    /// Safety-filter context observed with `next_state`.
    #[serde(default)]
    pub next_safety_context: Option<SafetyContext>,
}

/// Where a batch's transitions were drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchComposition {
    pub real: usize,
    pub synthetic: usize,
    /// The mixing ratio used, or `None` when the batch is purely real.
    pub real_ratio: Option<f64>,
}

/// A training batch handed to the agent's update call.
///
/// Real transitions come first, followed by synthetic ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingBatch {
    pub transitions: Vec<Transition>,
    pub composition: BatchComposition,
}

impl TrainingBatch {
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn real(&self) -> &[Transition] {
        &self.transitions[..self.composition.real]
    }

    pub fn synthetic(&self) -> &[Transition] {
        &self.transitions[self.composition.real..]
    }
}
