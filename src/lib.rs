//! rcbf-orchestrator: training orchestration for safety-filtered RL agents.
//!
//! Drives a policy wrapped by a control-barrier safety filter and an optional
//! learned compensator, interleaving real environment transitions with
//! model-generated ones and scheduling policy, dynamics-model and
//! compensator learning around them.

pub mod agent;
pub mod checkpoint;
pub mod client;
pub mod config;
pub mod dynamics;
pub mod env;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod safety;
pub mod training;
