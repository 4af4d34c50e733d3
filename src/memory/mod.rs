//! Experience storage for the training loop.
//!
//! This module provides:
//! - [`transition::Transition`] and [`transition::TrainingBatch`] -- the data
//!   handed to the policy learner.
//! - [`store::TransitionStore`] -- the bounded replay store (one instance for
//!   real transitions, one for synthetic rollouts).
//! - [`rollout_pool::CompensatorRolloutPool`] -- the bounded pool of recent
//!   episodes the compensator is trained on.
//! - [`ring::RingBuffer`] -- the fixed-capacity buffer underneath both.

pub mod ring;
pub mod rollout_pool;
pub mod store;
pub mod transition;

pub use ring::RingBuffer;
pub use rollout_pool::{CompensatorRolloutPool, EpisodeRollout, RolloutStep, DEFAULT_POOL_CAPACITY};
pub use store::TransitionStore;
pub use transition::{BatchComposition, TrainingBatch, Transition};
