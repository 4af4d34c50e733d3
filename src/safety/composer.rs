//! Action composition across the policy / safety-filter / compensator stack.
//!
//! The agent proposes up to three sub-actions per control step. The composer
//! sums the ones the active configuration includes into the action applied to
//! the environment, and recovers the residual attributable to the policy for
//! storage:
//!
//! ```text
//! applied = policy + safety? + compensator?
//! stored  = applied - safety? - compensator?
//! ```
//!
//! The stored action therefore always satisfies
//! `stored + Σ(active non-policy sub-actions) == applied`, which is what the
//! policy optimiser assumes about replayed transitions.

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

use super::action::Action;
use super::mode::SafetyMode;

/// The sub-actions an agent proposes for one control step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    /// Output of the policy network.
    pub policy: Action,
    /// Correction produced by the safety filter, when it ran.
    #[serde(default)]
    pub safety: Option<Action>,
    /// Output of the learned compensator, when enabled.
    #[serde(default)]
    pub compensator: Option<Action>,
}

impl ActionProposal {
    /// A proposal carrying only a policy action.
    pub fn policy_only(policy: Action) -> Self {
        Self {
            policy,
            safety: None,
            compensator: None,
        }
    }
}

/// Result of composing a proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedAction {
    /// Action sent to the environment.
    pub applied: Action,
    /// Residual policy action written to the replay store.
    pub stored: Action,
    /// Safety contribution actually included (zeros when inactive).
    pub safety: Action,
    /// Compensator contribution actually included (zeros when inactive).
    pub compensator: Action,
}

/// Maps `(mode, compensator_enabled, sub-actions)` to `(applied, stored)`.
///
/// Sub-actions the configuration does not include are ignored even when the
/// agent supplies them. A required sub-action that is missing is an error.
pub fn compose(
    mode: SafetyMode,
    compensator_enabled: bool,
    proposal: &ActionProposal,
) -> Result<ComposedAction, OrchestratorError> {
    let dim = proposal.policy.dim();

    let safety = if mode.filter_active() {
        Some(required(&proposal.safety, "safety", mode)?)
    } else {
        None
    };
    let compensator = if compensator_enabled {
        Some(required(&proposal.compensator, "compensator", mode)?)
    } else {
        None
    };

    let mut applied = proposal.policy.clone();
    for part in safety.iter().chain(compensator.iter()) {
        applied = applied.checked_add(part)?;
    }

    let mut stored = applied.clone();
    for part in safety.iter().chain(compensator.iter()) {
        stored = stored.checked_sub(part)?;
    }

    Ok(ComposedAction {
        applied,
        stored,
        safety: safety.cloned().unwrap_or_else(|| Action::zeros(dim)),
        compensator: compensator.cloned().unwrap_or_else(|| Action::zeros(dim)),
    })
}

fn required<'a>(
    part: &'a Option<Action>,
    component: &'static str,
    mode: SafetyMode,
) -> Result<&'a Action, OrchestratorError> {
    part.as_ref()
        .ok_or(OrchestratorError::MissingSubAction { component, mode })
}

/// A [`compose`] call bound to one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionComposer {
    pub mode: SafetyMode,
    pub compensator_enabled: bool,
}

impl ActionComposer {
    pub fn new(mode: SafetyMode, compensator_enabled: bool) -> Self {
        Self {
            mode,
            compensator_enabled,
        }
    }

    pub fn compose(&self, proposal: &ActionProposal) -> Result<ComposedAction, OrchestratorError> {
        compose(self.mode, self.compensator_enabled, proposal)
    }

    /// Whether the agent should be asked to run its safety filter.
    pub fn wants_safety(&self) -> bool {
        self.mode.filter_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_proposal() -> ActionProposal {
        ActionProposal {
            policy: Action(vec![0.5, -0.2]),
            safety: Some(Action(vec![0.1, 0.0])),
            compensator: Some(Action(vec![-0.05, 0.3])),
        }
    }

    #[test]
    fn baseline_scenario() {
        let proposal = ActionProposal {
            policy: Action(vec![0.5, -0.2]),
            safety: Some(Action(vec![0.1, 0.0])),
            compensator: None,
        };
        let out = compose(SafetyMode::Baseline, false, &proposal).unwrap();
        assert!(out.applied.approx_eq(&Action(vec![0.6, -0.2]), 1e-12));
        assert!(out.stored.approx_eq(&Action(vec![0.5, -0.2]), 1e-12));
    }

    #[test]
    fn off_mode_passes_policy_through() {
        let out = compose(SafetyMode::Off, false, &full_proposal()).unwrap();
        assert_eq!(out.applied, Action(vec![0.5, -0.2]));
        assert_eq!(out.stored, out.applied);
        assert_eq!(out.safety, Action::zeros(2));
    }

    #[test]
    fn decomposition_invariant_holds_for_every_mode() {
        let proposal = full_proposal();
        for mode in SafetyMode::ALL {
            for comp in [false, true] {
                let out = compose(mode, comp, &proposal).unwrap();
                let reconstructed = out
                    .stored
                    .checked_add(&out.safety)
                    .and_then(|a| a.checked_add(&out.compensator))
                    .unwrap();
                assert!(
                    reconstructed.approx_eq(&out.applied, 1e-12),
                    "mode={mode} comp={comp}"
                );
                assert!(out.stored.approx_eq(&proposal.policy, 1e-12));
            }
        }
    }

    #[test]
    fn compensator_is_added_and_removed() {
        let out = compose(SafetyMode::Baseline, true, &full_proposal()).unwrap();
        assert!(out.applied.approx_eq(&Action(vec![0.55, 0.1]), 1e-12));
        assert!(out.stored.approx_eq(&Action(vec![0.5, -0.2]), 1e-12));
        assert_eq!(out.compensator, Action(vec![-0.05, 0.3]));
    }

    #[test]
    fn missing_safety_action_is_an_error() {
        let proposal = ActionProposal::policy_only(Action(vec![0.0, 0.0]));
        let err = compose(SafetyMode::Full, false, &proposal).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::MissingSubAction {
                component: "safety",
                ..
            }
        ));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let proposal = ActionProposal {
            policy: Action(vec![0.0, 0.0]),
            safety: Some(Action(vec![0.0])),
            compensator: None,
        };
        assert!(compose(SafetyMode::Mod, false, &proposal).is_err());
    }
}
