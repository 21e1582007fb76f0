//! Kernel trait definition

/// Kernel function trait
///
/// A kernel function K(x, y) measures similarity between two feature vectors
/// of equal length. Positive semi-definite kernels satisfy Mercer's condition;
/// the sigmoid kernel does not in general, but remains usable in practice.
pub trait KernelFunction: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &[f64], y: &[f64]) -> f64;
}
