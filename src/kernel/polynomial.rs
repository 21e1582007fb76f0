//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (γ * <x, y> + r)^d
//!
//! Where:
//! - γ (gamma): scaling factor for the dot product
//! - r (coef0): independent term in the polynomial
//! - d (degree): degree of the polynomial

use crate::core::{Result, SVMError};
use crate::kernel::linear::dot;
use crate::kernel::KernelFunction;
use serde::{Deserialize, Serialize};

/// Polynomial kernel with configurable degree, gamma, and coefficient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolynomialKernel {
    degree: u32,
    gamma: f64,
    coef0: f64,
}

impl PolynomialKernel {
    /// Creates a new polynomial kernel with the specified parameters
    ///
    /// # Arguments
    /// * `degree` - Degree of the polynomial (must be >= 1)
    /// * `gamma` - Scaling factor for the dot product
    /// * `coef0` - Independent term in the polynomial
    ///
    /// # Examples
    /// ```
    /// use ksvm::kernel::PolynomialKernel;
    ///
    /// let kernel = PolynomialKernel::new(3, 4.0, 5.0).unwrap();
    /// assert_eq!(kernel.degree(), 3);
    /// assert_eq!(kernel.gamma(), 4.0);
    /// assert_eq!(kernel.coef0(), 5.0);
    /// ```
    pub fn new(degree: u32, gamma: f64, coef0: f64) -> Result<Self> {
        let kernel = Self {
            degree,
            gamma,
            coef0,
        };
        kernel.validate()?;
        Ok(kernel)
    }

    /// Creates a quadratic kernel: (γ * <x,y> + 1)²
    pub fn quadratic(gamma: f64) -> Result<Self> {
        Self::new(2, gamma, 1.0)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.degree < 1 || i32::try_from(self.degree).is_err() {
            return Err(SVMError::InvalidConfiguration(format!(
                "polynomial degree must be in [1, {}], got: {}",
                i32::MAX,
                self.degree
            )));
        }
        if !self.gamma.is_finite() || !self.coef0.is_finite() {
            return Err(SVMError::InvalidConfiguration(format!(
                "polynomial gamma and coef0 must be finite, got: {} and {}",
                self.gamma, self.coef0
            )));
        }
        Ok(())
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Independent term `r`
    pub fn coef0(&self) -> f64 {
        self.coef0
    }
}

impl KernelFunction for PolynomialKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        let base = self.gamma * dot(x, y) + self.coef0;
        base.powi(self.degree as i32)
    }
}
