//! Core traits for SVM implementation

use crate::core::{Example, Result, SvmConfig};
use crate::kernel::Kernel;
use crate::optimizer::TrainedSVM;

/// Quadratic-programming backend used by [`crate::api::SVM`]
///
/// Given a kernel, a formulation and a validated dataset (non-empty, uniform
/// dimensionality), an adapter returns everything prediction needs. A
/// convergence or feasibility problem is reported as
/// [`crate::core::SVMError::SolverFailure`].
pub trait SolverAdapter: Send + Sync {
    /// Fit a model to the examples
    fn fit(&self, kernel: &Kernel, config: &SvmConfig, examples: &[Example])
        -> Result<TrainedSVM>;
}
