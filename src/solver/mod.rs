//! SVM solver implementations
//!
//! This module implements the Sequential Minimal Optimization (SMO) algorithm
//! with second-order working-set selection (Fan, Chen and Lin, 2005) and the
//! dual problems of the supported formulations on top of it.

pub mod formulations;
pub mod qmatrix;
pub mod smo;

pub use self::formulations::*;
pub use self::qmatrix::*;
pub use self::smo::*;
