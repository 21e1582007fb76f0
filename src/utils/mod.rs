//! Utility functions for SVM operations

use crate::core::{Example, Result, SVMError};

/// Dataset validation shared by training and evaluation
pub mod validation {
    use super::*;

    /// Check that a dataset is non-empty, has uniform dimensionality and
    /// only finite values; returns the dimensionality
    pub fn validate_dataset(examples: &[Example]) -> Result<usize> {
        let first = examples
            .first()
            .ok_or_else(|| SVMError::InvalidDataset("dataset is empty".to_string()))?;
        let dim = first.dim();

        for (i, example) in examples.iter().enumerate() {
            if example.dim() != dim {
                return Err(SVMError::InvalidDataset(format!(
                    "example {i} has {} features, expected {dim}",
                    example.dim()
                )));
            }
            if !example.label.is_finite() || example.features.iter().any(|v| !v.is_finite()) {
                return Err(SVMError::InvalidDataset(format!(
                    "example {i} contains a non-finite value"
                )));
            }
        }
        Ok(dim)
    }

    /// Check a prediction input against the training dimensionality
    pub fn check_dimension(features: &[f64], expected: usize) -> Result<()> {
        if features.len() == expected {
            Ok(())
        } else {
            Err(SVMError::DimensionMismatch {
                expected,
                actual: features.len(),
            })
        }
    }
}

/// Label bookkeeping for classification
pub mod labels {
    use super::*;

    /// Map `-0.0` onto `0.0` so both zeros name the same class
    pub fn canonical_label(label: f64) -> f64 {
        label + 0.0
    }

    /// Distinct labels sorted ascending
    pub fn distinct_labels(examples: &[Example]) -> Vec<f64> {
        let mut labels: Vec<f64> = examples
            .iter()
            .map(|e| canonical_label(e.label))
            .collect();
        labels.sort_by(f64::total_cmp);
        labels.dedup_by(|a, b| a.total_cmp(b).is_eq());
        labels
    }

    /// Indices of the examples of each label in `labels`, in dataset order
    pub fn group_by_label(examples: &[Example], labels: &[f64]) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); labels.len()];
        for (i, example) in examples.iter().enumerate() {
            let label = canonical_label(example.label);
            if let Ok(class) = labels.binary_search_by(|l| l.total_cmp(&label)) {
                groups[class].push(i);
            }
        }
        groups
    }
}
