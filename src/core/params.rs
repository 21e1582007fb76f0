//! SVM formulations and their hyperparameters

use crate::core::{Result, SVMError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric tag of an SVM formulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SvmType {
    CSvc = 0,
    NuSvc = 1,
    OneClass = 2,
    EpsilonSvr = 3,
    NuSvr = 4,
}

impl SvmType {
    /// Human-readable name, e.g. `NU_SVC`
    pub fn name(&self) -> &'static str {
        match self {
            SvmType::CSvc => "C_SVC",
            SvmType::NuSvc => "NU_SVC",
            SvmType::OneClass => "ONE_CLASS",
            SvmType::EpsilonSvr => "EPSILON_SVR",
            SvmType::NuSvr => "NU_SVR",
        }
    }
}

impl fmt::Display for SvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// SVM formulation together with the hyperparameters it uses
///
/// * `C_SVC` / `NU_SVC`: multi-class classification (one-vs-one)
/// * `ONE_CLASS`: support estimation, predicts +1 for inliers and -1 for outliers
/// * `EPSILON_SVR` / `NU_SVR`: regression
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SvmConfig {
    CSvc {
        c: f64,
        #[serde(default)]
        probability: bool,
    },
    NuSvc {
        nu: f64,
        #[serde(default)]
        probability: bool,
    },
    OneClass {
        nu: f64,
    },
    EpsilonSvr {
        c: f64,
        epsilon: f64,
    },
    NuSvr {
        c: f64,
        nu: f64,
    },
}

impl SvmConfig {
    /// C-support classification
    pub fn c_svc(c: f64) -> Result<Self> {
        Self::CSvc {
            c,
            probability: false,
        }
        .validated()
    }

    /// nu-support classification
    pub fn nu_svc(nu: f64) -> Result<Self> {
        Self::NuSvc {
            nu,
            probability: false,
        }
        .validated()
    }

    /// One-class support estimation
    pub fn one_class(nu: f64) -> Result<Self> {
        Self::OneClass { nu }.validated()
    }

    /// epsilon-support regression
    pub fn epsilon_svr(c: f64, epsilon: f64) -> Result<Self> {
        Self::EpsilonSvr { c, epsilon }.validated()
    }

    /// nu-support regression
    pub fn nu_svr(c: f64, nu: f64) -> Result<Self> {
        Self::NuSvr { c, nu }.validated()
    }

    /// Enable or disable probability calibration
    ///
    /// Only classification formulations carry the flag; other variants are
    /// returned unchanged.
    pub fn with_probability(self, enabled: bool) -> Self {
        match self {
            SvmConfig::CSvc { c, .. } => SvmConfig::CSvc {
                c,
                probability: enabled,
            },
            SvmConfig::NuSvc { nu, .. } => SvmConfig::NuSvc {
                nu,
                probability: enabled,
            },
            other => other,
        }
    }

    fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Check every hyperparameter against its valid range
    pub fn validate(&self) -> Result<()> {
        match *self {
            SvmConfig::CSvc { c, .. } => check_c(c),
            SvmConfig::NuSvc { nu, .. } | SvmConfig::OneClass { nu } => check_nu(nu),
            SvmConfig::EpsilonSvr { c, epsilon } => {
                check_c(c)?;
                if !(epsilon >= 0.0 && epsilon.is_finite()) {
                    return Err(SVMError::InvalidConfiguration(format!(
                        "epsilon must be >= 0, got: {epsilon}"
                    )));
                }
                Ok(())
            }
            SvmConfig::NuSvr { c, nu } => {
                check_c(c)?;
                check_nu(nu)
            }
        }
    }

    pub fn svm_type(&self) -> SvmType {
        match self {
            SvmConfig::CSvc { .. } => SvmType::CSvc,
            SvmConfig::NuSvc { .. } => SvmType::NuSvc,
            SvmConfig::OneClass { .. } => SvmType::OneClass,
            SvmConfig::EpsilonSvr { .. } => SvmType::EpsilonSvr,
            SvmConfig::NuSvr { .. } => SvmType::NuSvr,
        }
    }

    /// True for the multi-class formulations that record labels
    pub fn is_classification(&self) -> bool {
        matches!(self, SvmConfig::CSvc { .. } | SvmConfig::NuSvc { .. })
    }

    pub fn is_regression(&self) -> bool {
        matches!(self, SvmConfig::EpsilonSvr { .. } | SvmConfig::NuSvr { .. })
    }

    /// Whether probability calibration was requested
    pub fn probability(&self) -> bool {
        match *self {
            SvmConfig::CSvc { probability, .. } | SvmConfig::NuSvc { probability, .. } => {
                probability
            }
            _ => false,
        }
    }
}

fn check_c(c: f64) -> Result<()> {
    if c > 0.0 && c.is_finite() {
        Ok(())
    } else {
        Err(SVMError::InvalidConfiguration(format!(
            "C must be positive, got: {c}"
        )))
    }
}

fn check_nu(nu: f64) -> Result<()> {
    if nu > 0.0 && nu < 1.0 {
        Ok(())
    } else {
        Err(SVMError::InvalidConfiguration(format!(
            "nu must be in (0, 1), got: {nu}"
        )))
    }
}
