//! Kernel Support Vector Machines
//!
//! C and nu classification, one-class estimation and epsilon/nu regression
//! trained with a generalized SMO solver, with Platt-calibrated class
//! probabilities, evaluation reports and n-fold cross-validation.

pub mod api;
pub mod cache;
pub mod core;
pub mod evaluation;
pub mod kernel;
pub mod optimizer;
pub mod solver;
pub mod utils;

// Re-export main types for convenience
pub use crate::api::{Probabilities, SVM};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::error::*;
pub use crate::core::params::*;
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::evaluation::{Outcome, Report};
pub use crate::kernel::{Kernel, KernelFunction, KernelType};
pub use crate::optimizer::{SVMOptimizer, TrainedSVM};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
