//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) is a hyperparameter that controls the kernel width.

use crate::core::{Result, SVMError};
use crate::kernel::KernelFunction;
use serde::{Deserialize, Serialize};

/// RBF (Radial Basis Function) kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// The gamma parameter controls the "reach" of each training example:
/// - High gamma: close points have high influence (potential overfitting)
/// - Low gamma: distant points have influence (potential underfitting)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    /// Create a new RBF kernel with specified gamma parameter
    ///
    /// Fails with `InvalidConfiguration` unless gamma is positive.
    pub fn new(gamma: f64) -> Result<Self> {
        let kernel = Self { gamma };
        kernel.validate()?;
        Ok(kernel)
    }

    /// Create RBF kernel with gamma = 1.0 / n_features
    pub fn with_auto_gamma(n_features: usize) -> Result<Self> {
        if n_features == 0 {
            return Err(SVMError::InvalidConfiguration(
                "number of features must be positive".to_string(),
            ));
        }
        Self::new(1.0 / n_features as f64)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.gamma > 0.0 && self.gamma.is_finite() {
            Ok(())
        } else {
            Err(SVMError::InvalidConfiguration(format!(
                "RBF gamma must be positive, got: {}",
                self.gamma
            )))
        }
    }

    /// Get the gamma parameter
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl KernelFunction for RBFKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        (-self.gamma * squared_euclidean_distance(x, y)).exp()
    }
}

/// ||x - y||² = Σᵢ (xᵢ - yᵢ)²
fn squared_euclidean_distance(x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(a, b)| {
            let diff = a - b;
            diff * diff
        })
        .sum()
}
