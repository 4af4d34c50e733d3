//! Domain errors that callers may want to match on.
//!
//! Everything else flows through `anyhow::Result` with context attached at
//! the collaborator boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::safety::SafetyMode;

/// Errors raised by the orchestrator core.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Sampling was requested from a store that holds no transitions.
    #[error("cannot sample from an empty transition store ({store})")]
    EmptyStore { store: &'static str },

    /// Two sub-actions of different dimensionality were combined.
    #[error("action dimension mismatch (expected {expected}, got {actual})")]
    ActionDimensionMismatch { expected: usize, actual: usize },

    /// A sub-action required by the active safety mode was not provided.
    #[error("{component} action missing for safety mode {mode:?}")]
    MissingSubAction {
        component: &'static str,
        mode: SafetyMode,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persisting or restoring a checkpoint artifact failed.
    #[error("checkpoint I/O failed at {}: {source}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Rejected configuration values and combinations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("compensator can only be used with model-free RL and baseline CBF (mode={mode:?}, model_based={model_based})")]
    CompensatorCombination { mode: SafetyMode, model_based: bool },

    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} must lie in [0, 1], got {value}")]
    OutOfUnitInterval { field: &'static str, value: f64 },
}
