//! High-level API for Support Vector Machine operations
//!
//! This module provides the model interface for common SVM tasks:
//! training, prediction, probability estimates and evaluation, each in a
//! blocking and a non-blocking flavour.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ksvm::api::SVM;
//! use ksvm::core::{Example, SvmConfig};
//! use ksvm::kernel::Kernel;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let svm = SVM::new(SvmConfig::c_svc(1.0)?, Kernel::rbf(0.5)?)?.with_epsilon(0.001);
//!
//! let examples = vec![
//!     Example::from(([-1.0, -1.0], 0.0)),
//!     Example::from(([-1.0, 1.0], 1.0)),
//!     Example::from(([1.0, -1.0], 1.0)),
//!     Example::from(([1.0, 1.0], 0.0)),
//! ];
//! svm.train(&examples)?;
//!
//! println!("label: {}", svm.predict(&[1.0, 1.0])?);
//! println!("accuracy: {:?}", svm.evaluate(&examples)?.accuracy());
//! # Ok(())
//! # }
//! ```

use crate::core::{Example, Result, SVMError, SolverAdapter, SvmConfig};
use crate::evaluation::{self, Report};
use crate::kernel::Kernel;
use crate::optimizer::{SVMOptimizer, TrainedSVM};
use crate::utils::validation::validate_dataset;
use log::debug;
use parking_lot::RwLock;
use std::sync::Arc;

/// SVM model: kernel and formulation fixed at construction, fitted
/// parameters replaced by every successful training call
///
/// Async operations run the numeric work on tokio's blocking pool and must
/// be awaited from within a tokio runtime. Overlapping calls on the same
/// model are the caller's responsibility to serialize.
pub struct SVM<S: SolverAdapter = SVMOptimizer> {
    kernel: Kernel,
    config: SvmConfig,
    solver: Arc<S>,
    state: RwLock<Option<Arc<TrainedSVM>>>,
}

impl SVM<SVMOptimizer> {
    /// Create an untrained model using the built-in SMO solver
    pub fn new(config: SvmConfig, kernel: Kernel) -> Result<Self> {
        Self::with_solver(config, kernel, SVMOptimizer::default())
    }

    /// Set convergence tolerance
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        Arc::make_mut(&mut self.solver).config_mut().epsilon = epsilon;
        self
    }

    /// Set maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        Arc::make_mut(&mut self.solver).config_mut().max_iterations = max_iterations;
        self
    }

    /// Set kernel cache size in bytes
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        Arc::make_mut(&mut self.solver).config_mut().cache_size = cache_size;
        self
    }

    /// Seed of the shuffle used for probability calibration
    pub fn with_seed(mut self, seed: u64) -> Self {
        Arc::make_mut(&mut self.solver).config_mut().seed = seed;
        self
    }
}

impl<S: SolverAdapter> SVM<S> {
    /// Create an untrained model that delegates training to `solver`
    pub fn with_solver(config: SvmConfig, kernel: Kernel, solver: S) -> Result<Self> {
        config.validate()?;
        kernel.validate()?;
        Ok(Self {
            kernel,
            config,
            solver: Arc::new(solver),
            state: RwLock::new(None),
        })
    }

    /// An untrained model with the same kernel, formulation and solver
    pub fn fresh(&self) -> Self {
        Self {
            kernel: self.kernel,
            config: self.config,
            solver: Arc::clone(&self.solver),
            state: RwLock::new(None),
        }
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn config(&self) -> &SvmConfig {
        &self.config
    }

    /// Kernel name, e.g. `RBF`
    pub fn kernel_type(&self) -> &'static str {
        self.kernel.name()
    }

    /// Formulation name, e.g. `NU_SVC`
    pub fn svm_type(&self) -> &'static str {
        self.config.svm_type().name()
    }

    pub fn is_trained(&self) -> bool {
        self.state.read().is_some()
    }

    /// Sorted distinct training labels; empty before training and for
    /// one-class and regression models
    pub fn labels(&self) -> Vec<f64> {
        self.state
            .read()
            .as_ref()
            .map(|model| model.labels().to_vec())
            .unwrap_or_default()
    }

    /// Snapshot of the fitted parameters
    pub fn model(&self) -> Result<Arc<TrainedSVM>> {
        self.state.read().clone().ok_or(SVMError::Untrained)
    }

    /// Fit the model; on failure the previous state is kept
    pub fn train(&self, examples: &[Example]) -> Result<()> {
        let model = fit(self.solver.as_ref(), &self.kernel, &self.config, examples)?;
        *self.state.write() = Some(Arc::new(model));
        Ok(())
    }

    /// Predict a label, a regression value or the one-class sign
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        self.model()?.predict(features)
    }

    /// Raw one-vs-one decision values, ordered by class pair
    pub fn decision_values(&self, features: &[f64]) -> Result<Vec<f64>> {
        self.model()?.decision_values(features)
    }

    /// Class probabilities over the recorded labels
    pub fn predict_probabilities(&self, features: &[f64]) -> Result<Probabilities> {
        let model = self.model()?;
        self.check_probability_support()?;
        probabilities(&model, features)
    }

    /// Score the model on a labelled dataset
    pub fn evaluate(&self, examples: &[Example]) -> Result<Report> {
        evaluation::evaluate(self, examples)
    }

    /// Out-of-fold scores of `n` fresh models over contiguous folds
    pub fn perform_n_fold_cross_validation(
        &self,
        examples: &[Example],
        n: usize,
    ) -> Result<Report> {
        evaluation::cross_validate(self, examples, n)
    }

    fn check_probability_support(&self) -> Result<()> {
        if self.config.is_classification() && self.config.probability() {
            Ok(())
        } else {
            Err(SVMError::UnsupportedOperation(format!(
                "probability estimates need C_SVC or NU_SVC with probability enabled, model is {}",
                self.svm_type()
            )))
        }
    }
}

impl<S: SolverAdapter + 'static> SVM<S> {
    /// Non-blocking [`SVM::train`]
    pub async fn train_async(&self, examples: &[Example]) -> Result<()> {
        let solver = Arc::clone(&self.solver);
        let kernel = self.kernel;
        let config = self.config;
        let examples = examples.to_vec();

        let task = move || fit(solver.as_ref(), &kernel, &config, &examples);
        let model = tokio::task::spawn_blocking(task).await??;

        *self.state.write() = Some(Arc::new(model));
        Ok(())
    }

    /// Non-blocking [`SVM::predict`]
    pub async fn predict_async(&self, features: &[f64]) -> Result<f64> {
        let model = self.model()?;
        let features = features.to_vec();
        tokio::task::spawn_blocking(move || model.predict(&features)).await?
    }

    /// Non-blocking [`SVM::predict_probabilities`]
    pub async fn predict_probabilities_async(&self, features: &[f64]) -> Result<Probabilities> {
        let model = self.model()?;
        self.check_probability_support()?;
        let features = features.to_vec();
        tokio::task::spawn_blocking(move || probabilities(&model, &features)).await?
    }

    /// Non-blocking [`SVM::evaluate`]
    pub async fn evaluate_async(&self, examples: &[Example]) -> Result<Report> {
        evaluation::evaluate_async(self, examples).await
    }

    /// Non-blocking [`SVM::perform_n_fold_cross_validation`]
    pub async fn perform_n_fold_cross_validation_async(
        &self,
        examples: &[Example],
        n: usize,
    ) -> Result<Report> {
        evaluation::cross_validate_async(self, examples, n).await
    }
}

fn fit<S: SolverAdapter + ?Sized>(
    solver: &S,
    kernel: &Kernel,
    config: &SvmConfig,
    examples: &[Example],
) -> Result<TrainedSVM> {
    let dim = validate_dataset(examples)?;
    debug!("validated {} examples of dimension {}", examples.len(), dim);
    solver.fit(kernel, config, examples)
}

fn probabilities(model: &TrainedSVM, features: &[f64]) -> Result<Probabilities> {
    let values = model.predict_probabilities(features)?;
    Ok(Probabilities {
        labels: model.labels().to_vec(),
        values,
    })
}

/// Probability per recorded label, in ascending label order
#[derive(Debug, Clone, PartialEq)]
pub struct Probabilities {
    labels: Vec<f64>,
    values: Vec<f64>,
}

impl Probabilities {
    /// Probability of `label`, if it was seen during training
    pub fn get(&self, label: f64) -> Option<f64> {
        self.labels
            .iter()
            .position(|&l| l == label)
            .map(|i| self.values[i])
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// `(label, probability)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.labels.iter().copied().zip(self.values.iter().copied())
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
