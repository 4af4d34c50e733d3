//! Safety-filter modes and action composition.
//!
//! - [`mode::SafetyMode`] -- which filter configuration is active.
//! - [`action::Action`] -- continuous action vectors.
//! - [`composer`] -- the pure mapping from proposed sub-actions to the applied
//!   action and the stored residual policy action.

pub mod action;
pub mod composer;
pub mod mode;

pub use action::Action;
pub use composer::{compose, ActionComposer, ActionProposal, ComposedAction};
pub use mode::SafetyMode;
