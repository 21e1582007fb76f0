//! Core type definitions for SVM

use serde::{Deserialize, Serialize};

/// Training or test example: a dense feature vector and its label
///
/// Labels are integer-valued class identifiers for classification and
/// continuous targets for regression. One-class training ignores them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Feature vector
    pub features: Vec<f64>,
    /// Class label or regression target
    pub label: f64,
}

impl Example {
    /// Create a new example
    pub fn new(features: Vec<f64>, label: f64) -> Self {
        Self { features, label }
    }

    /// Dimensionality of the feature vector
    pub fn dim(&self) -> usize {
        self.features.len()
    }
}

impl From<(Vec<f64>, f64)> for Example {
    fn from((features, label): (Vec<f64>, f64)) -> Self {
        Self::new(features, label)
    }
}

impl<const N: usize> From<([f64; N], f64)> for Example {
    fn from((features, label): ([f64; N], f64)) -> Self {
        Self::new(features.to_vec(), label)
    }
}

/// Result of one SMO run
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Lagrange multipliers (alpha values)
    pub alpha: Vec<f64>,
    /// Offset of the decision function, f(x) = sum(coef * K) - rho
    pub rho: f64,
    /// Scaling term of the nu formulation
    pub r: Option<f64>,
    /// Number of iterations performed
    pub iterations: usize,
    /// Final objective value
    pub objective_value: f64,
}

/// Configuration for optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Tolerance of the termination criterion
    pub epsilon: f64,
    /// Maximum number of SMO iterations per binary problem
    pub max_iterations: usize,
    /// Kernel cache size in bytes
    pub cache_size: usize,
    /// Internal folds used to collect decision values for Platt scaling
    pub probability_folds: usize,
    /// Seed of the shuffle that assigns examples to calibration folds
    pub seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            max_iterations: 10_000_000,
            cache_size: 100_000_000, // 100MB
            probability_folds: 5,
            seed: 0,
        }
    }
}
