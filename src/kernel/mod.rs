//! Kernel functions for SVM

pub mod linear;
pub mod polynomial;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

pub use self::linear::*;
pub use self::polynomial::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::traits::*;

use crate::core::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric kernel-type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KernelType {
    Linear = 0,
    Polynomial = 1,
    RadialBasisFunction = 2,
    Sigmoid = 3,
}

impl KernelType {
    pub fn name(&self) -> &'static str {
        match self {
            KernelType::Linear => "LINEAR",
            KernelType::Polynomial => "POLYNOMIAL",
            KernelType::RadialBasisFunction => "RBF",
            KernelType::Sigmoid => "SIGMOID",
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kernel selection with its parameters
///
/// Parameters live on the per-variant structs, so a variant only exposes
/// the accessors that apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kernel {
    Linear,
    Polynomial(PolynomialKernel),
    #[serde(rename = "RBF")]
    RadialBasisFunction(RBFKernel),
    Sigmoid(SigmoidKernel),
}

impl Kernel {
    pub fn linear() -> Self {
        Kernel::Linear
    }

    pub fn polynomial(degree: u32, gamma: f64, coef0: f64) -> Result<Self> {
        PolynomialKernel::new(degree, gamma, coef0).map(Kernel::Polynomial)
    }

    pub fn rbf(gamma: f64) -> Result<Self> {
        RBFKernel::new(gamma).map(Kernel::RadialBasisFunction)
    }

    pub fn sigmoid(gamma: f64, coef0: f64) -> Result<Self> {
        SigmoidKernel::new(gamma, coef0).map(Kernel::Sigmoid)
    }

    /// Re-check parameters, e.g. after deserialization
    pub fn validate(&self) -> Result<()> {
        match self {
            Kernel::Linear => Ok(()),
            Kernel::Polynomial(k) => k.validate(),
            Kernel::RadialBasisFunction(k) => k.validate(),
            Kernel::Sigmoid(k) => k.validate(),
        }
    }

    pub fn kernel_type(&self) -> KernelType {
        match self {
            Kernel::Linear => KernelType::Linear,
            Kernel::Polynomial(_) => KernelType::Polynomial,
            Kernel::RadialBasisFunction(_) => KernelType::RadialBasisFunction,
            Kernel::Sigmoid(_) => KernelType::Sigmoid,
        }
    }

    /// Human-readable kernel name, e.g. `RBF`
    pub fn name(&self) -> &'static str {
        self.kernel_type().name()
    }
}

impl KernelFunction for Kernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            Kernel::Linear => LinearKernel.compute(x, y),
            Kernel::Polynomial(k) => k.compute(x, y),
            Kernel::RadialBasisFunction(k) => k.compute(x, y),
            Kernel::Sigmoid(k) => k.compute(x, y),
        }
    }
}

impl From<LinearKernel> for Kernel {
    fn from(_: LinearKernel) -> Self {
        Kernel::Linear
    }
}

impl From<PolynomialKernel> for Kernel {
    fn from(kernel: PolynomialKernel) -> Self {
        Kernel::Polynomial(kernel)
    }
}

impl From<RBFKernel> for Kernel {
    fn from(kernel: RBFKernel) -> Self {
        Kernel::RadialBasisFunction(kernel)
    }
}

impl From<SigmoidKernel> for Kernel {
    fn from(kernel: SigmoidKernel) -> Self {
        Kernel::Sigmoid(kernel)
    }
}
