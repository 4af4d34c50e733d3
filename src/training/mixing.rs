//! Real-versus-synthetic batch mixing.
//!
//! ```text
//! r = clip( max( min(r_cfg, |M|/B), 1 - |M_model|/B ), 0, 1 )
//! real draws      = round(r·B)
//! synthetic draws = B - real draws
//! ```
//!
//! The upper term stops the scheduler asking for more real data than the
//! real store holds relative to the batch; the lower bound stops it asking
//! for more synthetic samples than exist.

use crate::error::OrchestratorError;
use crate::memory::{BatchComposition, TrainingBatch, TransitionStore};

/// Fraction of a batch of `batch_size` to draw from real data.
pub fn real_ratio(
    configured: f64,
    batch_size: usize,
    real_size: usize,
    synthetic_size: usize,
) -> f64 {
    let b = batch_size as f64;
    let upper = configured.min(real_size as f64 / b);
    let lower = 1.0 - synthetic_size as f64 / b;
    upper.max(lower).clamp(0.0, 1.0)
}

/// How many samples one batch takes from each store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchPlan {
    pub real: usize,
    pub synthetic: usize,
    /// `None` when mixing is bypassed.
    pub real_ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixingScheduler {
    /// Configured ceiling on the real fraction.
    pub configured_ratio: f64,
    pub batch_size: usize,
    /// False when model-based augmentation is off; every batch is then real.
    pub enabled: bool,
}

impl MixingScheduler {
    pub fn new(configured_ratio: f64, batch_size: usize, enabled: bool) -> Self {
        Self {
            configured_ratio,
            batch_size,
            enabled,
        }
    }

    pub fn plan(&self, real_size: usize, synthetic_size: usize) -> BatchPlan {
        let b = self.batch_size;
        if !self.enabled {
            return BatchPlan {
                real: b,
                synthetic: 0,
                real_ratio: None,
            };
        }

        let r = real_ratio(self.configured_ratio, b, real_size, synthetic_size);
        // Float rounding must not push the synthetic share past what exists.
        let real = ((r * b as f64).round() as usize)
            .max(b.saturating_sub(synthetic_size))
            .min(b);
        BatchPlan {
            real,
            synthetic: b - real,
            real_ratio: Some(r),
        }
    }

    /// Draw a batch from both stores according to a fresh plan.
    pub fn draw(
        &self,
        real: &mut TransitionStore,
        synthetic: &mut TransitionStore,
    ) -> Result<TrainingBatch, OrchestratorError> {
        let plan = self.plan(real.size(), synthetic.size());
        let mut transitions = Vec::with_capacity(plan.real + plan.synthetic);
        if plan.real > 0 {
            transitions.extend(real.sample(plan.real)?);
        }
        if plan.synthetic > 0 {
            transitions.extend(synthetic.sample(plan.synthetic)?);
        }
        Ok(TrainingBatch {
            transitions,
            composition: BatchComposition {
                real: plan.real,
                synthetic: plan.synthetic,
                real_ratio: plan.real_ratio,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Transition;
    use crate::safety::Action;

    fn transition(reward: f64) -> Transition {
        Transition {
            state: vec![0.0],
            action: Action(vec![0.0]),
            reward,
            next_state: vec![0.0],
            mask: 1.0,
            time: 0.0,
            next_time: 0.1,
            safety_context: None,
            next_safety_context: None,
        }
    }

    #[test]
    fn scarce_synthetic_data_raises_the_real_share() {
        let r = real_ratio(0.3, 256, 10_000, 50);
        assert!((r - 0.8046875).abs() < 1e-12);

        let plan = MixingScheduler::new(0.3, 256, true).plan(10_000, 50);
        assert_eq!(plan.real, 206);
        assert_eq!(plan.synthetic, 50);
    }

    #[test]
    fn configured_ratio_applies_when_both_stores_are_large() {
        let plan = MixingScheduler::new(0.3, 256, true).plan(10_000, 10_000);
        assert_eq!(plan.real_ratio, Some(0.3));
        assert_eq!(plan.real, 77);
        assert_eq!(plan.synthetic, 179);
    }

    #[test]
    fn small_real_store_caps_the_real_share() {
        let r = real_ratio(0.9, 100, 20, 1_000);
        assert!((r - 0.2).abs() < 1e-12);
    }

    #[test]
    fn bounds_hold_over_a_grid() {
        for b in [1usize, 7, 64, 256] {
            for m in [0usize, 1, 5, 50, 300, 10_000] {
                for mm in [0usize, 1, 3, 50, 255, 10_000] {
                    for cfg in [0.0, 0.05, 0.3, 0.5, 1.0] {
                        let r = real_ratio(cfg, b, m, mm);
                        assert!((0.0..=1.0).contains(&r));
                        let plan = MixingScheduler::new(cfg, b, true).plan(m, mm);
                        assert_eq!(plan.real + plan.synthetic, b);
                        if mm < b {
                            assert!(plan.synthetic <= mm, "b={b} m={m} mm={mm} cfg={cfg}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn disabled_scheduler_draws_only_real() {
        let scheduler = MixingScheduler::new(0.3, 4, false);
        let mut real = TransitionStore::new("real", 10, 1);
        let mut synthetic = TransitionStore::new("synthetic", 10, 2);
        for i in 0..6 {
            real.push(transition(i as f64));
        }
        let batch = scheduler.draw(&mut real, &mut synthetic).unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.composition.synthetic, 0);
        assert_eq!(batch.composition.real_ratio, None);
    }

    #[test]
    fn mixed_draw_concatenates_real_then_synthetic() {
        let scheduler = MixingScheduler::new(0.5, 4, true);
        let mut real = TransitionStore::new("real", 10, 1);
        let mut synthetic = TransitionStore::new("synthetic", 10, 2);
        for _ in 0..8 {
            real.push(transition(1.0));
            synthetic.push(transition(-1.0));
        }
        let batch = scheduler.draw(&mut real, &mut synthetic).unwrap();
        assert_eq!(batch.composition.real, 2);
        assert!(batch.real().iter().all(|t| t.reward == 1.0));
        assert!(batch.synthetic().iter().all(|t| t.reward == -1.0));
    }
}
