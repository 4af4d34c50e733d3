//! Training orchestration.
//!
//! - [`mixing`] -- real-vs-synthetic batch composition.
//! - [`augment`] -- model-based rollout augmentation and its cadence.
//! - [`state`] -- counters and stores owned by the loop.
//! - [`driver`] -- one training episode.
//! - [`evaluation`] -- deterministic evaluation passes.
//! - [`pipeline`] -- the outer loop over episodes.

pub mod augment;
pub mod driver;
pub mod evaluation;
pub mod mixing;
pub mod pipeline;
pub mod state;

pub use augment::{AugmentRequest, AugmentSchedule, ModelRolloutAugmentor, RolloutAugmentor};
pub use driver::{continuation_mask, EpisodeDriver, EpisodeOutcome};
pub use evaluation::{evaluate_policy, EvalEpisode, EvaluationSummary};
pub use mixing::{real_ratio, BatchPlan, MixingScheduler};
pub use pipeline::{TrainingLoop, TrainingReport};
pub use state::TrainingState;
