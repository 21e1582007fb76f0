//! Dual problems of the individual SVM formulations
//!
//! Each function builds the starting point, linear term and bounds for one
//! formulation, runs [`SMOSolver`] and maps the multipliers back to one
//! expansion coefficient per training example.

use crate::core::{OptimizerConfig, Result, SVMError};
use crate::kernel::Kernel;
use crate::solver::qmatrix::{OneClassQ, SvcQ, SvrQ};
use crate::solver::smo::{DualProblem, SMOSolver};
use log::debug;

/// `f(x) = Σ coef_i K(x_i, x) - rho` over the training points of one problem
#[derive(Debug, Clone)]
pub struct DecisionFunction {
    pub coef: Vec<f64>,
    pub rho: f64,
}

/// Two-class C-SVC with labels `y_i ∈ {+1, -1}`
pub fn solve_c_svc(
    kernel: &Kernel,
    points: &[&[f64]],
    y: &[f64],
    c: f64,
    config: &OptimizerConfig,
) -> Result<DecisionFunction> {
    let l = points.len();
    let problem = DualProblem {
        q: SvcQ::new(kernel, points.to_vec(), y.to_vec(), config.cache_size),
        p: vec![-1.0; l],
        y: y.to_vec(),
        alpha: vec![0.0; l],
        bounds: vec![c; l],
        nu_constraint: false,
    };
    let result = SMOSolver::new(config.clone()).solve(problem)?;
    debug!(
        "C-SVC: obj = {:.6}, rho = {:.6}",
        result.objective_value, result.rho
    );

    let alpha = result.alpha;
    Ok(DecisionFunction {
        coef: alpha.iter().zip(y).map(|(a, y)| a * y).collect(),
        rho: result.rho,
    })
}

/// Two-class nu-SVC with labels `y_i ∈ {+1, -1}`
pub fn solve_nu_svc(
    kernel: &Kernel,
    points: &[&[f64]],
    y: &[f64],
    nu: f64,
    config: &OptimizerConfig,
) -> Result<DecisionFunction> {
    let l = points.len();
    let mut sum_pos = nu * l as f64 / 2.0;
    let mut sum_neg = sum_pos;
    let alpha = y
        .iter()
        .map(|&y_i| {
            let remaining = if y_i > 0.0 { &mut sum_pos } else { &mut sum_neg };
            let a = remaining.min(1.0);
            *remaining -= a;
            a
        })
        .collect();

    let problem = DualProblem {
        q: SvcQ::new(kernel, points.to_vec(), y.to_vec(), config.cache_size),
        p: vec![0.0; l],
        y: y.to_vec(),
        alpha,
        bounds: vec![1.0; l],
        nu_constraint: true,
    };
    let result = SMOSolver::new(config.clone()).solve(problem)?;

    let r = result.r.unwrap_or(0.0);
    if !(r > 0.0 && r.is_finite()) {
        return Err(SVMError::SolverFailure(format!(
            "nu-SVC produced a degenerate margin (r = {r})"
        )));
    }
    debug!(
        "nu-SVC: obj = {:.6}, rho = {:.6}, r = {:.6}",
        result.objective_value, result.rho, r
    );

    let alpha = result.alpha;
    Ok(DecisionFunction {
        coef: alpha.iter().zip(y).map(|(a, y)| a * y / r).collect(),
        rho: result.rho / r,
    })
}

/// One-class SVM estimating the support of the distribution
pub fn solve_one_class(
    kernel: &Kernel,
    points: &[&[f64]],
    nu: f64,
    config: &OptimizerConfig,
) -> Result<DecisionFunction> {
    let l = points.len();
    let total = nu * l as f64;
    let n = total.floor() as usize;
    let mut alpha = vec![0.0; l];
    for a in alpha.iter_mut().take(n) {
        *a = 1.0;
    }
    if n < l {
        alpha[n] = total - n as f64;
    }

    let problem = DualProblem {
        q: OneClassQ::new(kernel, points.to_vec(), config.cache_size),
        p: vec![0.0; l],
        y: vec![1.0; l],
        alpha,
        bounds: vec![1.0; l],
        nu_constraint: false,
    };
    let result = SMOSolver::new(config.clone()).solve(problem)?;
    debug!(
        "one-class: obj = {:.6}, rho = {:.6}",
        result.objective_value, result.rho
    );

    Ok(DecisionFunction {
        coef: result.alpha,
        rho: result.rho,
    })
}

/// Epsilon-SVR with an insensitive tube of half-width `epsilon`
pub fn solve_epsilon_svr(
    kernel: &Kernel,
    points: &[&[f64]],
    targets: &[f64],
    c: f64,
    epsilon: f64,
    config: &OptimizerConfig,
) -> Result<DecisionFunction> {
    let l = points.len();
    let p = targets
        .iter()
        .map(|t| epsilon - t)
        .chain(targets.iter().map(|t| epsilon + t))
        .collect();

    let problem = DualProblem {
        q: SvrQ::new(kernel, points.to_vec(), config.cache_size),
        p,
        y: tube_signs(l),
        alpha: vec![0.0; 2 * l],
        bounds: vec![c; 2 * l],
        nu_constraint: false,
    };
    let result = SMOSolver::new(config.clone()).solve(problem)?;
    debug!(
        "epsilon-SVR: obj = {:.6}, rho = {:.6}",
        result.objective_value, result.rho
    );

    Ok(DecisionFunction {
        coef: fold_tube(&result.alpha, l),
        rho: result.rho,
    })
}

/// Nu-SVR, where `nu` bounds the fraction of points outside the tube
pub fn solve_nu_svr(
    kernel: &Kernel,
    points: &[&[f64]],
    targets: &[f64],
    c: f64,
    nu: f64,
    config: &OptimizerConfig,
) -> Result<DecisionFunction> {
    let l = points.len();
    let mut sum = c * nu * l as f64 / 2.0;
    let mut alpha = vec![0.0; 2 * l];
    for i in 0..l {
        let a = sum.min(c);
        alpha[i] = a;
        alpha[i + l] = a;
        sum -= a;
    }
    let p = targets
        .iter()
        .map(|t| -t)
        .chain(targets.iter().copied())
        .collect();

    let problem = DualProblem {
        q: SvrQ::new(kernel, points.to_vec(), config.cache_size),
        p,
        y: tube_signs(l),
        alpha,
        bounds: vec![c; 2 * l],
        nu_constraint: true,
    };
    let result = SMOSolver::new(config.clone()).solve(problem)?;
    debug!(
        "nu-SVR: obj = {:.6}, rho = {:.6}, epsilon = {:.6}",
        result.objective_value,
        result.rho,
        -result.r.unwrap_or(0.0)
    );

    Ok(DecisionFunction {
        coef: fold_tube(&result.alpha, l),
        rho: result.rho,
    })
}

fn tube_signs(l: usize) -> Vec<f64> {
    let mut y = vec![1.0; 2 * l];
    y[l..].fill(-1.0);
    y
}

fn fold_tube(alpha: &[f64], l: usize) -> Vec<f64> {
    (0..l).map(|i| alpha[i] - alpha[i + l]).collect()
}
