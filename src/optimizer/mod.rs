//! Optimization algorithms for SVM
//!
//! This module provides the high-level training interface that integrates
//! kernels and the SMO solver into complete models: one-vs-one decomposition
//! for classification, single problems for one-class and regression, and
//! optional probability calibration.

pub mod probability;

use crate::core::{Example, OptimizerConfig, Result, SVMError, SolverAdapter, SvmConfig, SvmType};
use crate::kernel::{Kernel, KernelFunction};
use crate::solver::formulations::{
    solve_c_svc, solve_epsilon_svr, solve_nu_svc, solve_nu_svr, solve_one_class, DecisionFunction,
};
use crate::utils::labels::{distinct_labels, group_by_label};
use crate::utils::validation::check_dimension;
use log::{debug, info};

use self::probability::{
    clamp_probability, cross_validated_decision_values, multiclass_probability, sigmoid_train,
    PlattParams,
};

/// SMO-backed solver adapter
#[derive(Debug, Clone, Default)]
pub struct SVMOptimizer {
    config: OptimizerConfig,
}

impl SVMOptimizer {
    /// Create a new SVM optimizer with the given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Get the optimizer configuration
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut OptimizerConfig {
        &mut self.config
    }

    /// One-vs-one training over the sorted labels; `solve` fits one class
    /// pair with `+1` for the lower and `-1` for the higher label
    fn fit_classifier<F>(
        &self,
        kernel: &Kernel,
        config: &SvmConfig,
        examples: &[Example],
        solve: F,
    ) -> Result<TrainedSVM>
    where
        F: Fn(&[&[f64]], &[f64]) -> Result<DecisionFunction>,
    {
        let labels = distinct_labels(examples);
        let groups = group_by_label(examples, &labels);
        info!(
            "Training {} on {} examples, {} classes",
            config.svm_type(),
            examples.len(),
            labels.len()
        );

        if let SvmConfig::NuSvc { nu, .. } = *config {
            check_nu_feasibility(nu, &groups)?;
        }

        // Calibration subsets can be too unbalanced for nu even when the
        // full pair is not
        let calibrate = |p: &[&[f64]], y: &[f64]| {
            if let SvmConfig::NuSvc { nu, .. } = *config {
                let n_pos = y.iter().filter(|&&v| v > 0.0).count();
                if !nu_feasible(nu, n_pos, y.len() - n_pos) {
                    debug!("skipping calibration subset infeasible for nu = {}", nu);
                    return Ok(None);
                }
            }
            solve(p, y).map(Some)
        };

        let mut pool = SupportVectorPool::new(examples.len());
        let mut machines = Vec::new();

        for i in 0..labels.len() {
            for j in i + 1..labels.len() {
                let members: Vec<usize> = groups[i].iter().chain(&groups[j]).copied().collect();
                let points: Vec<&[f64]> = members
                    .iter()
                    .map(|&m| examples[m].features.as_slice())
                    .collect();
                let y: Vec<f64> = std::iter::repeat(1.0)
                    .take(groups[i].len())
                    .chain(std::iter::repeat(-1.0).take(groups[j].len()))
                    .collect();

                let platt = if config.probability() {
                    let values = cross_validated_decision_values(
                        kernel,
                        &points,
                        &y,
                        self.config.probability_folds,
                        self.config.seed,
                        calibrate,
                    )?;
                    Some(sigmoid_train(&values, &y))
                } else {
                    None
                };

                let function = solve(&points, &y)?;
                let machine = pool.machine(&function, &members, examples, Some((i, j)), platt);
                debug!(
                    "class pair ({}, {}): {} support vectors, rho = {:.6}",
                    labels[i],
                    labels[j],
                    machine.sv.len(),
                    machine.rho
                );
                machines.push(machine);
            }
        }

        Ok(TrainedSVM {
            kernel: *kernel,
            svm_type: config.svm_type(),
            probability: config.probability(),
            dim: examples[0].dim(),
            labels,
            support_vectors: pool.vectors,
            machines,
        })
    }

    /// A single machine over all examples; `solve` gets the points and the
    /// raw labels as targets
    fn fit_single<F>(
        &self,
        kernel: &Kernel,
        config: &SvmConfig,
        examples: &[Example],
        solve: F,
    ) -> Result<TrainedSVM>
    where
        F: FnOnce(&[&[f64]], &[f64]) -> Result<DecisionFunction>,
    {
        info!(
            "Training {} on {} examples",
            config.svm_type(),
            examples.len()
        );

        let points: Vec<&[f64]> = examples.iter().map(|e| e.features.as_slice()).collect();
        let targets: Vec<f64> = examples.iter().map(|e| e.label).collect();
        let function = solve(&points, &targets)?;

        let members: Vec<usize> = (0..examples.len()).collect();
        let mut pool = SupportVectorPool::new(examples.len());
        let machine = pool.machine(&function, &members, examples, None, None);

        Ok(TrainedSVM {
            kernel: *kernel,
            svm_type: config.svm_type(),
            probability: false,
            dim: examples[0].dim(),
            labels: Vec::new(),
            support_vectors: pool.vectors,
            machines: vec![machine],
        })
    }
}

impl SolverAdapter for SVMOptimizer {
    fn fit(&self, kernel: &Kernel, config: &SvmConfig, examples: &[Example]) -> Result<TrainedSVM> {
        let opts = &self.config;
        let model = match *config {
            SvmConfig::CSvc { c, .. } => {
                let solve = |p: &[&[f64]], y: &[f64]| solve_c_svc(kernel, p, y, c, opts);
                self.fit_classifier(kernel, config, examples, solve)?
            }
            SvmConfig::NuSvc { nu, .. } => {
                let solve = |p: &[&[f64]], y: &[f64]| solve_nu_svc(kernel, p, y, nu, opts);
                self.fit_classifier(kernel, config, examples, solve)?
            }
            SvmConfig::OneClass { nu } => {
                let solve = |p: &[&[f64]], _: &[f64]| solve_one_class(kernel, p, nu, opts);
                self.fit_single(kernel, config, examples, solve)?
            }
            SvmConfig::EpsilonSvr { c, epsilon } => {
                let solve = |p: &[&[f64]], t: &[f64]| {
                    solve_epsilon_svr(kernel, p, t, c, epsilon, opts)
                };
                self.fit_single(kernel, config, examples, solve)?
            }
            SvmConfig::NuSvr { c, nu } => {
                let solve = |p: &[&[f64]], t: &[f64]| solve_nu_svr(kernel, p, t, c, nu, opts);
                self.fit_single(kernel, config, examples, solve)?
            }
        };
        info!(
            "Training finished: {} support vectors",
            model.n_support_vectors()
        );
        Ok(model)
    }
}

/// Whether a pair with `n1` and `n2` examples admits the given nu
fn nu_feasible(nu: f64, n1: usize, n2: usize) -> bool {
    let (n1, n2) = (n1 as f64, n2 as f64);
    nu * (n1 + n2) / 2.0 <= n1.min(n2)
}

/// `nu * (n1 + n2) / 2 <= min(n1, n2)` must hold for every class pair
fn check_nu_feasibility(nu: f64, groups: &[Vec<usize>]) -> Result<()> {
    for (i, a) in groups.iter().enumerate() {
        for b in &groups[i + 1..] {
            if !nu_feasible(nu, a.len(), b.len()) {
                return Err(SVMError::SolverFailure(format!(
                    "specified nu = {nu} is infeasible for class sizes {} and {}",
                    a.len(),
                    b.len()
                )));
            }
        }
    }
    Ok(())
}

/// Support vectors shared by all binary machines of a model
struct SupportVectorPool {
    vectors: Vec<Vec<f64>>,
    slot: Vec<Option<usize>>,
}

impl SupportVectorPool {
    fn new(n_examples: usize) -> Self {
        Self {
            vectors: Vec::new(),
            slot: vec![None; n_examples],
        }
    }

    /// Keep the points with non-zero coefficient and build the machine
    fn machine(
        &mut self,
        function: &DecisionFunction,
        members: &[usize],
        examples: &[Example],
        classes: Option<(usize, usize)>,
        platt: Option<PlattParams>,
    ) -> BinaryMachine {
        let mut sv = Vec::new();
        let mut coef = Vec::new();
        for (&m, &c) in members.iter().zip(&function.coef) {
            if c == 0.0 {
                continue;
            }
            let index = match self.slot[m] {
                Some(index) => index,
                None => {
                    self.vectors.push(examples[m].features.clone());
                    let index = self.vectors.len() - 1;
                    self.slot[m] = Some(index);
                    index
                }
            };
            sv.push(index);
            coef.push(c);
        }

        BinaryMachine {
            classes,
            sv,
            coef,
            rho: function.rho,
            platt,
        }
    }
}

/// One decision function of a trained model
#[derive(Debug, Clone)]
struct BinaryMachine {
    /// Indices into the label list of the positive and negative class
    classes: Option<(usize, usize)>,
    /// Indices into the shared support vector list
    sv: Vec<usize>,
    coef: Vec<f64>,
    rho: f64,
    platt: Option<PlattParams>,
}

impl BinaryMachine {
    fn decision_value(&self, kernel_values: &[f64]) -> f64 {
        self.sv
            .iter()
            .zip(&self.coef)
            .map(|(&s, c)| c * kernel_values[s])
            .sum::<f64>()
            - self.rho
    }
}

/// A trained SVM model that can make predictions
#[derive(Debug, Clone)]
pub struct TrainedSVM {
    kernel: Kernel,
    svm_type: SvmType,
    probability: bool,
    dim: usize,
    labels: Vec<f64>,
    support_vectors: Vec<Vec<f64>>,
    machines: Vec<BinaryMachine>,
}

impl TrainedSVM {
    /// Formulation the model was trained with
    pub fn svm_type(&self) -> SvmType {
        self.svm_type
    }

    /// Distinct training labels in ascending order; empty unless classification
    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Dimensionality of the training data
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Get the support vectors
    pub fn support_vectors(&self) -> &[Vec<f64>] {
        &self.support_vectors
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    /// Whether Platt parameters were fitted
    pub fn has_probability_model(&self) -> bool {
        self.probability
    }

    /// Raw decision values, one per binary machine
    ///
    /// For classification the machines are ordered by class pair `(i, j)`,
    /// `i < j`, and a positive value favours class `i`.
    pub fn decision_values(&self, features: &[f64]) -> Result<Vec<f64>> {
        check_dimension(features, self.dim)?;
        let kernel_values = self.kernel_values(features);
        Ok(self
            .machines
            .iter()
            .map(|m| m.decision_value(&kernel_values))
            .collect())
    }

    /// Predict a label, a regression value or the inlier sign
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        let values = self.decision_values(features)?;
        match self.svm_type {
            SvmType::CSvc | SvmType::NuSvc => Ok(self.vote(&values)),
            SvmType::OneClass => Ok(if values[0] > 0.0 { 1.0 } else { -1.0 }),
            SvmType::EpsilonSvr | SvmType::NuSvr => Ok(values[0]),
        }
    }

    /// Class probabilities, aligned with [`TrainedSVM::labels`]
    pub fn predict_probabilities(&self, features: &[f64]) -> Result<Vec<f64>> {
        if !self.probability {
            return Err(SVMError::UnsupportedOperation(format!(
                "{} model was trained without probability estimates",
                self.svm_type
            )));
        }

        let values = self.decision_values(features)?;
        let k = self.labels.len();
        let mut pairwise = vec![vec![0.0; k]; k];
        for (machine, value) in self.machines.iter().zip(values) {
            if let (Some((i, j)), Some(platt)) = (machine.classes, machine.platt) {
                let p = clamp_probability(platt.predict(value));
                pairwise[i][j] = p;
                pairwise[j][i] = 1.0 - p;
            }
        }
        Ok(multiclass_probability(&pairwise))
    }

    fn kernel_values(&self, features: &[f64]) -> Vec<f64> {
        self.support_vectors
            .iter()
            .map(|sv| self.kernel.compute(sv, features))
            .collect()
    }

    /// One-vs-one vote; ties go to the lower label index
    fn vote(&self, values: &[f64]) -> f64 {
        let mut votes = vec![0usize; self.labels.len()];
        for (machine, &value) in self.machines.iter().zip(values) {
            if let Some((i, j)) = machine.classes {
                if value > 0.0 {
                    votes[i] += 1;
                } else {
                    votes[j] += 1;
                }
            }
        }

        let mut best = 0;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[best] {
                best = class;
            }
        }
        self.labels[best]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn xor() -> Vec<Example> {
        vec![
            Example::from(([-1.0, -1.0], 0.0)),
            Example::from(([-1.0, 1.0], 1.0)),
            Example::from(([1.0, -1.0], 1.0)),
            Example::from(([1.0, 1.0], 0.0)),
        ]
    }

    const OFFSETS: [[f64; 2]; 5] = [
        [0.0, 0.0],
        [0.3, 0.1],
        [-0.2, 0.3],
        [0.1, -0.3],
        [-0.1, -0.1],
    ];

    fn three_clusters() -> Vec<Example> {
        let mut examples = Vec::new();
        for (label, center) in [(0.0, [0.0, 0.0]), (1.0, [4.0, 0.0]), (2.0, [0.0, 4.0])] {
            for offset in OFFSETS {
                examples.push(Example::from((
                    [center[0] + offset[0], center[1] + offset[1]],
                    label,
                )));
            }
        }
        examples
    }

    #[test]
    fn test_svm_optimizer_creation() {
        let config = OptimizerConfig {
            epsilon: 0.01,
            ..OptimizerConfig::default()
        };
        let optimizer = SVMOptimizer::new(config.clone());
        assert_eq!(optimizer.config(), &config);
        assert_eq!(SVMOptimizer::default().config().epsilon, 0.001);
    }

    #[test]
    fn test_c_svc_xor_training() {
        let optimizer = SVMOptimizer::default();
        let kernel = Kernel::rbf(0.5).unwrap();
        let config = SvmConfig::c_svc(1.0).unwrap();

        let model = optimizer.fit(&kernel, &config, &xor()).unwrap();

        assert_eq!(model.labels(), &[0.0, 1.0]);
        assert_eq!(model.n_support_vectors(), 4);
        for example in xor() {
            assert_eq!(model.predict(&example.features).unwrap(), example.label);
        }

        // Class 0 is the positive side of the only pair
        let values = model.decision_values(&[-1.0, -1.0]).unwrap();
        assert_eq!(values.len(), 1);
        assert_relative_eq!(values[0], 0.7476, epsilon = 1e-3);
    }

    #[test]
    fn test_multiclass_one_vs_one() {
        let optimizer = SVMOptimizer::default();
        let kernel = Kernel::rbf(0.5).unwrap();
        let config = SvmConfig::c_svc(10.0).unwrap().with_probability(true);
        let examples = three_clusters();

        let model = optimizer.fit(&kernel, &config, &examples).unwrap();

        assert_eq!(model.labels(), &[0.0, 1.0, 2.0]);
        assert_eq!(model.decision_values(&[0.0, 0.0]).unwrap().len(), 3);
        assert_eq!(model.predict(&[4.1, 0.2]).unwrap(), 1.0);
        assert_eq!(model.predict(&[0.1, 3.8]).unwrap(), 2.0);

        let probabilities = model.predict_probabilities(&[0.0, 0.1]).unwrap();
        assert_eq!(probabilities.len(), 3);
        assert_relative_eq!(probabilities.iter().sum::<f64>(), 1.0, epsilon = 1e-5);
        assert!(probabilities[0] > probabilities[1]);
        assert!(probabilities[0] > probabilities[2]);
    }

    #[test]
    fn test_single_class_predicts_that_label() {
        let optimizer = SVMOptimizer::default();
        let config = SvmConfig::c_svc(1.0).unwrap().with_probability(true);
        let examples = vec![Example::from(([1.0], 3.0)), Example::from(([2.0], 3.0))];

        let model = optimizer.fit(&Kernel::linear(), &config, &examples).unwrap();

        assert_eq!(model.predict(&[10.0]).unwrap(), 3.0);
        assert_eq!(model.predict_probabilities(&[10.0]).unwrap(), vec![1.0]);
        assert!(model.decision_values(&[10.0]).unwrap().is_empty());
    }

    #[test]
    fn test_nu_svc_infeasible_nu() {
        let optimizer = SVMOptimizer::default();
        let config = SvmConfig::nu_svc(0.9).unwrap();
        let mut examples: Vec<Example> = (0..9).map(|i| Example::from(([i as f64], 0.0))).collect();
        examples.push(Example::from(([20.0], 1.0)));

        let result = optimizer.fit(&Kernel::linear(), &config, &examples);
        assert!(matches!(result, Err(SVMError::SolverFailure(_))));
    }

    #[test]
    fn test_nu_svc_calibration_skips_unbalanced_subsets() {
        let optimizer = SVMOptimizer::default();
        let config = SvmConfig::nu_svc(0.8).unwrap().with_probability(true);
        let examples: Vec<Example> = (0..10)
            .map(|i| {
                let label = if i < 5 { 0.0 } else { 1.0 };
                Example::from(([4.0 * label + 0.1 * (i % 5) as f64, 0.0], label))
            })
            .collect();

        let model = optimizer.fit(&Kernel::linear(), &config, &examples).unwrap();

        for example in &examples {
            assert_eq!(model.predict(&example.features).unwrap(), example.label);
            let probabilities = model.predict_probabilities(&example.features).unwrap();
            assert_relative_eq!(probabilities.iter().sum::<f64>(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_nu_feasible_bound() {
        assert!(nu_feasible(0.8, 5, 5));
        assert!(!nu_feasible(0.8, 3, 5));
        assert!(nu_feasible(0.5, 2, 2));
    }

    #[test]
    fn test_one_class_predicts_sign() {
        let optimizer = SVMOptimizer::default();
        let config = SvmConfig::one_class(0.5).unwrap();
        let examples: Vec<Example> = [[0.0, 0.0], [0.1, 0.0], [0.0, 0.1], [0.1, 0.1], [-0.1, 0.0]]
            .into_iter()
            .map(|x| Example::from((x, 0.0)))
            .collect();

        let model = optimizer
            .fit(&Kernel::rbf(1.0).unwrap(), &config, &examples)
            .unwrap();

        assert!(model.labels().is_empty());
        assert_eq!(model.predict(&[5.0, 5.0]).unwrap(), -1.0);
        let inside = model.predict(&[0.05, 0.05]).unwrap();
        assert!(inside == 1.0 || inside == -1.0);
        assert!(matches!(
            model.predict_probabilities(&[0.0, 0.0]),
            Err(SVMError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_epsilon_svr_xor_regression() {
        let optimizer = SVMOptimizer::default();
        let config = SvmConfig::epsilon_svr(1.0, 0.1).unwrap();
        let examples: Vec<Example> = [
            ([0.0, 0.0], 0.0),
            ([0.0, 1.0], 1.0),
            ([1.0, 0.0], 1.0),
            ([1.0, 1.0], 0.0),
        ]
        .into_iter()
        .map(Example::from)
        .collect();

        let model = optimizer.fit(&Kernel::linear(), &config, &examples).unwrap();

        for example in &examples {
            assert_relative_eq!(
                model.predict(&example.features).unwrap(),
                0.5,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_prediction_dimension_mismatch() {
        let optimizer = SVMOptimizer::default();
        let config = SvmConfig::c_svc(1.0).unwrap();
        let model = optimizer.fit(&Kernel::linear(), &config, &xor()).unwrap();

        assert_eq!(
            model.predict(&[1.0]),
            Err(SVMError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert!(matches!(
            model.predict_probabilities(&[1.0, 1.0]),
            Err(SVMError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_support_vectors_shared_between_pairs() {
        let optimizer = SVMOptimizer::default();
        let config = SvmConfig::c_svc(10.0).unwrap();
        let examples = three_clusters();

        let model = optimizer
            .fit(&Kernel::rbf(0.5).unwrap(), &config, &examples)
            .unwrap();

        // Each example is stored at most once even if used by two machines
        assert!(model.n_support_vectors() <= examples.len());
        assert!(model.n_support_vectors() > 0);
    }
}
