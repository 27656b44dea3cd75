//! Opinion Vectors
//!
//! A fixed-length stance across topics. Each component is conventionally in
//! [-1, 1]; the simulation keeps them there by only ever blending bounded
//! values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error raised when two opinion vectors of different length meet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("opinion dimension mismatch: expected {expected}, found {found}")]
pub struct OpinionError {
    pub expected: usize,
    pub found: usize,
}

/// Real-valued stance vector, one component per topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpinionVector(Vec<f32>);

impl OpinionVector {
    pub fn new(components: Vec<f32>) -> Self {
        Self(components)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Fails unless the vector has exactly `dim` components.
    pub fn expect_dim(&self, dim: usize) -> Result<(), OpinionError> {
        if self.dim() == dim {
            Ok(())
        } else {
            Err(OpinionError {
                expected: dim,
                found: self.dim(),
            })
        }
    }

    /// Exponential smoothing: `alpha * self + (1 - alpha) * other`.
    ///
    /// With `alpha` in [0, 1] the result is a convex combination, so every
    /// component lies between the matching components of the two inputs.
    pub fn blend(&self, other: &OpinionVector, alpha: f32) -> Result<OpinionVector, OpinionError> {
        other.expect_dim(self.dim())?;
        let blended = self
            .0
            .iter()
            .zip(&other.0)
            .map(|(old, new)| alpha * old + (1.0 - alpha) * new)
            .collect();
        Ok(Self(blended))
    }

    /// True if every component lies within [-1, 1].
    pub fn is_bounded(&self) -> bool {
        self.0.iter().all(|v| (-1.0..=1.0).contains(v))
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl From<Vec<f32>> for OpinionVector {
    fn from(components: Vec<f32>) -> Self {
        Self(components)
    }
}

impl<const N: usize> From<[f32; N]> for OpinionVector {
    fn from(components: [f32; N]) -> Self {
        Self(components.to_vec())
    }
}

impl fmt::Display for OpinionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.4}", v)?;
        }
        write!(f, "]")
    }
}
