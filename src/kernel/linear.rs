//! Linear kernel implementation

use crate::kernel::KernelFunction;
use serde::{Deserialize, Serialize};

/// Linear kernel: K(x, y) = x^T * y
///
/// This is the simplest kernel function, computing the dot product between two vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearKernel;

impl LinearKernel {
    /// Create a new linear kernel
    pub fn new() -> Self {
        Self
    }
}

impl KernelFunction for LinearKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        dot(x, y)
    }
}

/// Dot product of two dense vectors
#[inline]
pub(crate) fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}
