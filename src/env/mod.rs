//! Control environment abstractions and concrete implementations.
//!
//! Every environment implements the [`Environment`] trait so that the episode
//! driver can interact with it uniformly.
//!
//! Included environments:
//! - **PointMass** ([`point_mass`]) -- a deterministic planar navigation task
//!   with a hazard region, used for tests and local runs.
//! - **Remote** ([`remote`]) -- an HTTP bridge to an external simulator.

pub mod point_mass;
pub mod remote;
pub mod traits;

pub use point_mass::{PointMassConfig, PointMassEnv};
pub use remote::RemoteEnv;
pub use traits::{EnvReset, EnvSpec, EnvStep, Environment, SafetyContext, StepInfo};

use crate::safety::Action;

// ---------------------------------------------------------------------------
// AnyEnv: enum dispatch wrapper for dynamic environment selection
// ---------------------------------------------------------------------------

/// An enum wrapper around all concrete environment types, enabling runtime
/// environment selection without `dyn` (which is incompatible with async trait
/// methods).
pub enum AnyEnv {
    PointMass(PointMassEnv),
    Remote(RemoteEnv),
}

impl Environment for AnyEnv {
    async fn reset(&mut self) -> anyhow::Result<EnvReset> {
        match self {
            Self::PointMass(e) => e.reset().await,
            Self::Remote(e) => e.reset().await,
        }
    }

    async fn step(&mut self, action: &Action) -> anyhow::Result<EnvStep> {
        match self {
            Self::PointMass(e) => e.step(action).await,
            Self::Remote(e) => e.step(action).await,
        }
    }

    async fn seed(&mut self, seed: u64) -> anyhow::Result<()> {
        match self {
            Self::PointMass(e) => e.seed(seed).await,
            Self::Remote(e) => e.seed(seed).await,
        }
    }

    async fn reward(
        &self,
        observation: &[f64],
        action: &Action,
        next_observation: &[f64],
    ) -> anyhow::Result<f64> {
        match self {
            Self::PointMass(e) => e.reward(observation, action, next_observation).await,
            Self::Remote(e) => e.reward(observation, action, next_observation).await,
        }
    }

    fn spec(&self) -> &EnvSpec {
        match self {
            Self::PointMass(e) => e.spec(),
            Self::Remote(e) => e.spec(),
        }
    }
}
