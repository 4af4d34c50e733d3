//! Continuous action vectors with checked elementwise arithmetic.

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// A continuous control action.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(pub Vec<f64>);

impl Action {
    /// The all-zero action of the given dimension.
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Elementwise `self + other`.
    pub fn checked_add(&self, other: &Action) -> Result<Action, OrchestratorError> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Elementwise `self - other`.
    pub fn checked_sub(&self, other: &Action) -> Result<Action, OrchestratorError> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Whether every component is within `tol` of `other`'s.
    pub fn approx_eq(&self, other: &Action, tol: f64) -> bool {
        self.dim() == other.dim()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| (a - b).abs() <= tol)
    }

    fn zip_with(
        &self,
        other: &Action,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Action, OrchestratorError> {
        if self.dim() != other.dim() {
            return Err(OrchestratorError::ActionDimensionMismatch {
                expected: self.dim(),
                actual: other.dim(),
            });
        }
        Ok(Action(
            self.0.iter().zip(&other.0).map(|(&a, &b)| f(a, b)).collect(),
        ))
    }
}

impl From<Vec<f64>> for Action {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_are_elementwise() {
        let a = Action(vec![0.5, -0.2]);
        let b = Action(vec![0.1, 0.0]);
        let sum = a.checked_add(&b).unwrap();
        assert!(sum.approx_eq(&Action(vec![0.6, -0.2]), 1e-12));
        let back = sum.checked_sub(&b).unwrap();
        assert!(back.approx_eq(&a, 1e-12));
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let err = Action::zeros(2).checked_add(&Action::zeros(3)).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::ActionDimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn serializes_as_a_plain_array() {
        let json = serde_json::to_string(&Action(vec![1.0, 2.5])).unwrap();
        assert_eq!(json, "[1.0,2.5]");
    }
}
