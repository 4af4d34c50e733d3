//! Safety-filter operating modes.

use serde::{Deserialize, Serialize};

/// How the control-barrier safety filter participates in action selection.
///
/// In every mode except [`SafetyMode::Off`] the filter contributes an additive
/// correction to the policy action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SafetyMode {
    /// No filter; the policy acts alone.
    Off,
    /// Filter applied on top of a policy that is trained without it.
    Baseline,
    /// Filter applied and differentiated through during policy training.
    Full,
    /// Modular variant of `Full`.
    Mod,
}

impl SafetyMode {
    /// Human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Baseline => "baseline",
            Self::Full => "full",
            Self::Mod => "mod",
        }
    }

    /// Whether the safety filter produces a sub-action in this mode.
    pub fn filter_active(&self) -> bool {
        !matches!(self, Self::Off)
    }

    pub const ALL: [SafetyMode; 4] = [Self::Off, Self::Baseline, Self::Full, Self::Mod];
}

impl std::fmt::Display for SafetyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
