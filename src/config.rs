use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::safety::SafetyMode;

/// Complete configuration for a safe-RL training run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub env: EnvConfig,
    pub training: TrainingConfig,
    pub dynamics: DynamicsConfig,
    pub model_based: ModelBasedConfig,
    pub safety: SafetyConfig,
    pub compensator: CompensatorConfig,
    pub evaluation: EvaluationConfig,
    pub learner: LearnerConfig,
}

/// Environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Name used for run folders (default: "PointMass").
    pub name: String,
    /// Time limit of the built-in environment (default: 100).
    pub max_episode_steps: usize,
    /// Control period of the built-in environment in seconds (default: 0.1).
    pub dt: f64,
    /// Randomise the initial state of the built-in environment (default: false).
    pub rand_init: bool,
    /// Base URL of an external simulator, when one is used.
    pub remote_url: Option<String>,
}

/// Outer-loop and replay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Random seed; 0 disables seeding (default: 12345).
    pub seed: u64,
    /// Transitions per update batch (default: 256).
    pub batch_size: usize,
    /// Number of training episodes (default: 400).
    pub max_episodes: u64,
    /// Parameter updates per environment step (default: 1).
    pub updates_per_step: usize,
    /// Steps of random exploration before the policy is trusted (default: 5000).
    pub start_steps: u64,
    /// Capacity of each transition store (default: 10_000_000).
    pub replay_size: usize,
    /// Save a checkpoint every this many episodes (default: 20).
    pub checkpoint_interval: u64,
    /// Parent directory of run folders (default: "output").
    pub output: PathBuf,
    /// Resume target: "default", a run number, or a directory (default: "default").
    pub resume: String,
}

/// Dynamics-model data collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    /// Transitions retained by the dynamics model (default: 2000).
    pub gp_model_size: usize,
    /// Stop feeding the dynamics model after this episode (default: 100).
    pub gp_max_episodes: u64,
}

/// Model-based augmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelBasedConfig {
    /// Enable synthetic rollouts (default: false).
    pub enabled: bool,
    /// Upper bound on the fraction of a batch drawn from real data (default: 0.3).
    pub real_ratio: f64,
    /// Rollout horizon in model steps (default: 1).
    pub k_horizon: usize,
    /// Start states per rollout are `5 * rollout_batch_size` (default: 5).
    pub rollout_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Safety-filter mode (default: mod).
    pub cbf_mode: SafetyMode,
}

/// Learned compensator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompensatorConfig {
    /// Enable the compensator (default: false).
    pub enabled: bool,
    /// Compensator learning rate (default: 0.005).
    pub comp_rate: f64,
    /// Train only while the episode index is below this (default: 200).
    pub train_episodes: u64,
    /// Train every this many episodes (default: 50).
    pub update_episode: u64,
    /// Episodes kept in the rollout pool (default: 50).
    pub pool_capacity: usize,
}

/// Evaluation and test-mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Run evaluation passes during training (default: true).
    pub enabled: bool,
    /// Evaluate every this many episodes (default: 1).
    pub interval: u64,
    /// Episodes averaged per evaluation pass (default: 3).
    pub episodes: usize,
    /// Episodes run by the `test` command (default: 5).
    pub validate_episodes: usize,
}

/// Learner hyperparameters, and the server hosting it when remote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Base URL of an external learner process.
    pub url: Option<String>,
    /// Discount factor (default: 0.99).
    pub gamma: f64,
    /// Target smoothing coefficient (default: 0.005).
    pub tau: f64,
    /// Learning rate (default: 0.0003).
    pub learning_rate: f64,
    /// Entropy temperature (default: 0.2).
    pub alpha: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            name: "PointMass".into(),
            max_episode_steps: 100,
            dt: 0.1,
            rand_init: false,
            remote_url: None,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            batch_size: 256,
            max_episodes: 400,
            updates_per_step: 1,
            start_steps: 5000,
            replay_size: 10_000_000,
            checkpoint_interval: 20,
            output: PathBuf::from("output"),
            resume: "default".into(),
        }
    }
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            gp_model_size: 2000,
            gp_max_episodes: 100,
        }
    }
}

impl Default for ModelBasedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            real_ratio: 0.3,
            k_horizon: 1,
            rollout_batch_size: 5,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            cbf_mode: SafetyMode::Mod,
        }
    }
}

impl Default for CompensatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            comp_rate: 0.005,
            train_episodes: 200,
            update_episode: 50,
            pool_capacity: crate::memory::DEFAULT_POOL_CAPACITY,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 1,
            episodes: 3,
            validate_episodes: 5,
        }
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            url: None,
            gamma: 0.99,
            tau: 0.005,
            learning_rate: 0.0003,
            alpha: 0.2,
        }
    }
}

impl TrainConfig {
    /// Read a (possibly partial) JSON config; missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Reject settings the training loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compensator.enabled
            && (self.safety.cbf_mode != SafetyMode::Baseline || self.model_based.enabled)
        {
            return Err(ConfigError::CompensatorCombination {
                mode: self.safety.cbf_mode,
                model_based: self.model_based.enabled,
            });
        }

        let counts = [
            ("training.batch_size", self.training.batch_size),
            ("training.replay_size", self.training.replay_size),
            ("dynamics.gp_model_size", self.dynamics.gp_model_size),
            ("model_based.k_horizon", self.model_based.k_horizon),
            (
                "model_based.rollout_batch_size",
                self.model_based.rollout_batch_size,
            ),
            ("compensator.pool_capacity", self.compensator.pool_capacity),
            ("env.max_episode_steps", self.env.max_episode_steps),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }
        let cadences = [
            ("training.checkpoint_interval", self.training.checkpoint_interval),
            ("compensator.update_episode", self.compensator.update_episode),
            ("evaluation.interval", self.evaluation.interval),
        ];
        for (field, value) in cadences {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }
        if self.env.dt <= 0.0 {
            return Err(ConfigError::NonPositive { field: "env.dt" });
        }

        for (field, value) in [
            ("model_based.real_ratio", self.model_based.real_ratio),
            ("learner.gamma", self.learner.gamma),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitInterval { field, value });
            }
        }
        Ok(())
    }

    /// Tags describing the run's configuration.
    pub fn experiment_tags(&self) -> Vec<String> {
        let mut tags = vec![self.safety.cbf_mode.to_string()];
        if self.model_based.enabled {
            tags.push("MB".into());
        }
        if self.compensator.enabled {
            tags.push("use_comp".into());
        }
        tags.push(format!("batch_{}", self.training.batch_size));
        tags.push(format!("ups_{}", self.training.updates_per_step));
        tags
    }

    /// Human-readable run name built from the tags.
    pub fn experiment_name(&self) -> String {
        format!("{}-{}", self.env.name, self.experiment_tags().join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TrainConfig::default();
        assert_eq!(config.training.seed, 12345);
        assert_eq!(config.training.batch_size, 256);
        assert_eq!(config.safety.cbf_mode, SafetyMode::Mod);
        assert_eq!(config.compensator.pool_capacity, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn compensator_requires_model_free_baseline() {
        let mut config = TrainConfig::default();
        config.compensator.enabled = true;
        assert_eq!(
            config.validate(),
            Err(ConfigError::CompensatorCombination {
                mode: SafetyMode::Mod,
                model_based: false
            })
        );

        config.safety.cbf_mode = SafetyMode::Baseline;
        assert!(config.validate().is_ok());

        config.model_based.enabled = true;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CompensatorCombination {
                model_based: true,
                ..
            })
        ));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = TrainConfig::default();
        config.training.batch_size = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive {
                field: "training.batch_size"
            })
        );

        let mut config = TrainConfig::default();
        config.model_based.real_ratio = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfUnitInterval { field: "model_based.real_ratio", .. })
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "safety": { "cbf_mode": "baseline" }, "training": { "batch_size": 64 } }"#,
        )
        .unwrap();
        let config = TrainConfig::load(&path).unwrap();
        assert_eq!(config.safety.cbf_mode, SafetyMode::Baseline);
        assert_eq!(config.training.batch_size, 64);
        assert_eq!(config.training.max_episodes, 400);
        assert_eq!(config.model_based.real_ratio, 0.3);
    }

    #[test]
    fn experiment_name_reflects_flags() {
        let mut config = TrainConfig::default();
        config.model_based.enabled = true;
        assert_eq!(config.experiment_name(), "PointMass-mod-MB-batch_256-ups_1");
    }
}
