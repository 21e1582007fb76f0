//! Sigmoid (Tanh) Kernel Implementation
//!
//! K(x, y) = tanh(γ * <x, y> + r)
//!
//! The kernel is bounded in [-1, 1] and not positive semi-definite for all
//! parameter values, so the solver may see a non-convex problem.

use crate::core::{Result, SVMError};
use crate::kernel::linear::dot;
use crate::kernel::KernelFunction;
use serde::{Deserialize, Serialize};

/// Sigmoid (Hyperbolic Tangent) kernel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidKernel {
    gamma: f64,
    coef0: f64,
}

impl SigmoidKernel {
    /// Creates a new Sigmoid kernel
    ///
    /// # Arguments
    /// * `gamma` - Scaling parameter for the dot product
    /// * `coef0` - Bias/offset parameter `r`
    pub fn new(gamma: f64, coef0: f64) -> Result<Self> {
        let kernel = Self { gamma, coef0 };
        kernel.validate()?;
        Ok(kernel)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.gamma.is_finite() && self.coef0.is_finite() {
            Ok(())
        } else {
            Err(SVMError::InvalidConfiguration(format!(
                "sigmoid gamma and coef0 must be finite, got: {} and {}",
                self.gamma, self.coef0
            )))
        }
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn coef0(&self) -> f64 {
        self.coef0
    }
}

impl KernelFunction for SigmoidKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        (self.gamma * dot(x, y) + self.coef0).tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigmoid_kernel_creation() {
        let kernel = SigmoidKernel::new(3.0, 4.0).unwrap();
        assert_eq!(kernel.gamma(), 3.0);
        assert_eq!(kernel.coef0(), 4.0);
    }

    #[test]
    fn test_sigmoid_kernel_rejects_infinite_parameters() {
        assert!(SigmoidKernel::new(f64::INFINITY, 0.0).is_err());
        assert!(SigmoidKernel::new(1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_sigmoid_kernel_computation() {
        let kernel = SigmoidKernel::new(0.5, -1.0).unwrap();

        // 0.5 * (1*2 + 1*2) - 1 = 1
        assert_relative_eq!(kernel.compute(&[1.0, 1.0], &[2.0, 2.0]), 1.0f64.tanh());
    }

    #[test]
    fn test_sigmoid_kernel_bounded() {
        let kernel = SigmoidKernel::new(10.0, 5.0).unwrap();
        let value = kernel.compute(&[100.0], &[100.0]);
        assert!(value <= 1.0 && value >= -1.0);
    }
}
