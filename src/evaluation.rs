//! Model scoring and n-fold cross-validation

use crate::api::SVM;
use crate::core::{Example, Result, SVMError, SolverAdapter, SvmType};
use crate::optimizer::TrainedSVM;
use crate::utils::validation::validate_dataset;
use log::{debug, info};
use std::ops::Range;

/// Expected and predicted value of one example
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub expected: f64,
    pub predicted: f64,
}

/// Scores of a model over a dataset
///
/// Classification and one-class reports carry accuracy, regression reports
/// carry the mean squared error and the squared correlation coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    svm_type: SvmType,
    outcomes: Vec<Outcome>,
}

impl Report {
    pub fn new(svm_type: SvmType, outcomes: Vec<Outcome>) -> Self {
        Self { svm_type, outcomes }
    }

    pub fn svm_type(&self) -> SvmType {
        self.svm_type
    }

    /// Per-example results in dataset order
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Fraction of exactly matching predictions
    pub fn accuracy(&self) -> Option<f64> {
        if self.is_regression() || self.is_empty() {
            return None;
        }
        let correct = self
            .outcomes
            .iter()
            .filter(|o| o.predicted == o.expected)
            .count();
        Some(correct as f64 / self.len() as f64)
    }

    /// Mean of `(predicted - expected)²`
    pub fn mean_squared_error(&self) -> Option<f64> {
        if !self.is_regression() || self.is_empty() {
            return None;
        }
        let sum: f64 = self
            .outcomes
            .iter()
            .map(|o| (o.predicted - o.expected).powi(2))
            .sum();
        Some(sum / self.len() as f64)
    }

    /// Squared Pearson correlation between predictions and targets
    ///
    /// `None` when either side has zero variance.
    pub fn squared_correlation(&self) -> Option<f64> {
        if !self.is_regression() || self.is_empty() {
            return None;
        }
        let l = self.len() as f64;
        let (mut sum_p, mut sum_e, mut sum_pp, mut sum_ee, mut sum_pe) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for o in &self.outcomes {
            sum_p += o.predicted;
            sum_e += o.expected;
            sum_pp += o.predicted * o.predicted;
            sum_ee += o.expected * o.expected;
            sum_pe += o.predicted * o.expected;
        }
        let denominator = (l * sum_pp - sum_p * sum_p) * (l * sum_ee - sum_e * sum_e);
        if denominator <= 0.0 {
            return None;
        }
        let numerator = l * sum_pe - sum_p * sum_e;
        Some(numerator * numerator / denominator)
    }

    fn is_regression(&self) -> bool {
        matches!(self.svm_type, SvmType::EpsilonSvr | SvmType::NuSvr)
    }
}

/// Predict every example with a trained model and score the results
pub fn evaluate<S: SolverAdapter>(model: &SVM<S>, examples: &[Example]) -> Result<Report> {
    let trained = model.model()?;
    validate_dataset(examples)?;
    score(&trained, examples)
}

/// Non-blocking [`evaluate`]
pub async fn evaluate_async<S: SolverAdapter>(
    model: &SVM<S>,
    examples: &[Example],
) -> Result<Report> {
    let trained = model.model()?;
    validate_dataset(examples)?;
    let examples = examples.to_vec();
    tokio::task::spawn_blocking(move || score(&trained, &examples)).await?
}

fn score(model: &TrainedSVM, examples: &[Example]) -> Result<Report> {
    let outcomes = examples
        .iter()
        .map(|e| {
            Ok(Outcome {
                expected: e.label,
                predicted: model.predict(&e.features)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Report::new(model.svm_type(), outcomes))
}

/// Contiguous fold ranges; the first `size % n` folds hold one extra example
pub fn fold_bounds(size: usize, n: usize) -> Result<Vec<Range<usize>>> {
    if n < 2 {
        return Err(SVMError::InvalidArgument(format!(
            "number of folds must be at least 2, got {n}"
        )));
    }
    if n > size {
        return Err(SVMError::InvalidArgument(format!(
            "number of folds ({n}) exceeds dataset size ({size})"
        )));
    }

    let base = size / n;
    let remainder = size % n;
    let mut bounds = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let len = if i < remainder { base + 1 } else { base };
        bounds.push(start..start + len);
        start += len;
    }
    Ok(bounds)
}

/// Train a fresh copy of `template` on all folds but one, predict the
/// held-out fold, and aggregate the predictions in dataset order
pub fn cross_validate<S: SolverAdapter>(
    template: &SVM<S>,
    examples: &[Example],
    n: usize,
) -> Result<Report> {
    validate_dataset(examples)?;
    let bounds = fold_bounds(examples.len(), n)?;
    info!(
        "{}-fold cross-validation of {} on {} examples",
        n,
        template.svm_type(),
        examples.len()
    );

    let mut outcomes = Vec::with_capacity(examples.len());
    for (fold, range) in bounds.into_iter().enumerate() {
        let training: Vec<Example> = examples[..range.start]
            .iter()
            .chain(&examples[range.end..])
            .cloned()
            .collect();

        let model = template.fresh();
        model.train(&training)?;
        for example in &examples[range.clone()] {
            outcomes.push(Outcome {
                expected: example.label,
                predicted: model.predict(&example.features)?,
            });
        }
        debug!("fold {} done, held out {:?}", fold, range);
    }

    Ok(Report::new(template.config().svm_type(), outcomes))
}

/// Non-blocking [`cross_validate`]
pub async fn cross_validate_async<S: SolverAdapter + 'static>(
    template: &SVM<S>,
    examples: &[Example],
    n: usize,
) -> Result<Report> {
    let template = template.fresh();
    let examples = examples.to_vec();
    tokio::task::spawn_blocking(move || cross_validate(&template, &examples, n)).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SvmConfig;
    use crate::kernel::Kernel;
    use approx::assert_relative_eq;

    fn outcome(expected: f64, predicted: f64) -> Outcome {
        Outcome { expected, predicted }
    }

    #[test]
    fn test_classification_report() {
        let report = Report::new(
            SvmType::CSvc,
            vec![
                outcome(0.0, 0.0),
                outcome(1.0, 0.0),
                outcome(1.0, 1.0),
                outcome(0.0, 0.0),
            ],
        );

        assert_eq!(report.accuracy(), Some(0.75));
        assert_eq!(report.mean_squared_error(), None);
        assert_eq!(report.squared_correlation(), None);
    }

    #[test]
    fn test_regression_report() {
        let report = Report::new(
            SvmType::EpsilonSvr,
            vec![outcome(1.0, 1.5), outcome(2.0, 2.0), outcome(3.0, 3.5)],
        );

        assert_eq!(report.accuracy(), None);
        assert_relative_eq!(report.mean_squared_error().unwrap(), 0.5 / 3.0);
        assert!(report.squared_correlation().unwrap() > 0.9);
    }

    #[test]
    fn test_constant_predictions_have_no_correlation() {
        let report = Report::new(SvmType::NuSvr, vec![outcome(0.0, 0.5), outcome(1.0, 0.5)]);
        assert_eq!(report.mean_squared_error(), Some(0.25));
        assert_eq!(report.squared_correlation(), None);
    }

    #[test]
    fn test_one_class_reports_accuracy() {
        let report = Report::new(
            SvmType::OneClass,
            vec![outcome(1.0, 1.0), outcome(-1.0, 1.0)],
        );
        assert_eq!(report.accuracy(), Some(0.5));
    }

    #[test]
    fn test_fold_bounds_distributes_remainder_first() {
        assert_eq!(fold_bounds(10, 3).unwrap(), vec![0..4, 4..7, 7..10]);
        assert_eq!(fold_bounds(4, 4).unwrap(), vec![0..1, 1..2, 2..3, 3..4]);
        assert_eq!(fold_bounds(200, 4).unwrap()[3], 150..200);
    }

    #[test]
    fn test_fold_bounds_rejects_bad_counts() {
        assert!(matches!(
            fold_bounds(10, 1),
            Err(SVMError::InvalidArgument(_))
        ));
        assert!(matches!(
            fold_bounds(10, 0),
            Err(SVMError::InvalidArgument(_))
        ));
        assert!(matches!(
            fold_bounds(3, 4),
            Err(SVMError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_cross_validation_argument_checks() {
        let svm = SVM::new(SvmConfig::c_svc(1.0).unwrap(), Kernel::linear()).unwrap();
        let examples = vec![Example::from(([0.0], 0.0)), Example::from(([1.0], 1.0))];

        assert!(matches!(
            cross_validate(&svm, &examples, 3),
            Err(SVMError::InvalidArgument(_))
        ));
        assert!(matches!(
            cross_validate(&svm, &[], 2),
            Err(SVMError::InvalidDataset(_))
        ));
        assert!(!svm.is_trained());
    }

    #[test]
    fn test_cross_validation_keeps_dataset_order() {
        let config = SvmConfig::epsilon_svr(10.0, 0.01).unwrap();
        let svm = SVM::new(config, Kernel::linear()).unwrap();
        let examples: Vec<Example> = (0..9)
            .map(|i| Example::from(([i as f64], 2.0 * i as f64)))
            .collect();

        let report = cross_validate(&svm, &examples, 3).unwrap();

        let expected: Vec<f64> = report.outcomes().iter().map(|o| o.expected).collect();
        let labels: Vec<f64> = examples.iter().map(|e| e.label).collect();
        assert_eq!(expected, labels);
        assert!(report.mean_squared_error().unwrap() < 1.0);
    }

    #[tokio::test]
    async fn test_evaluate_async_matches_sync() {
        let svm = SVM::new(SvmConfig::c_svc(1.0).unwrap(), Kernel::rbf(0.5).unwrap()).unwrap();
        let examples = vec![
            Example::from(([-1.0, -1.0], 0.0)),
            Example::from(([-1.0, 1.0], 1.0)),
            Example::from(([1.0, -1.0], 1.0)),
            Example::from(([1.0, 1.0], 0.0)),
        ];
        svm.train(&examples).unwrap();

        let sync = evaluate(&svm, &examples).unwrap();
        let async_report = evaluate_async(&svm, &examples).await.unwrap();
        assert_eq!(sync, async_report);
        assert_eq!(sync.accuracy(), Some(1.0));
    }
}
