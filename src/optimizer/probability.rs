//! Probability calibration for classification models
//!
//! Decision values of each class pair are mapped to probabilities with a
//! Platt sigmoid `1 / (1 + exp(A f + B))`. The sigmoid is fitted on decision
//! values collected by internal cross-validation, so the training points do
//! not see their own model. Pairwise probabilities are then coupled into a
//! single class distribution.

use crate::core::Result;
use crate::kernel::{Kernel, KernelFunction};
use crate::solver::formulations::DecisionFunction;
use log::{debug, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const MAX_NEWTON_ITERATIONS: usize = 100;
const MIN_STEP: f64 = 1e-10;
const HESSIAN_RIDGE: f64 = 1e-12;
const NEWTON_EPS: f64 = 1e-5;
const MIN_PROBABILITY: f64 = 1e-7;

/// Parameters of a fitted Platt sigmoid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattParams {
    pub a: f64,
    pub b: f64,
}

impl PlattParams {
    /// Probability that a decision value belongs to the positive class
    pub fn predict(&self, decision_value: f64) -> f64 {
        sigmoid_predict(decision_value, self.a, self.b)
    }
}

/// Fit a Platt sigmoid with a Newton method and backtracking line search
///
/// `labels` are compared against zero; positive values are the positive class.
pub fn sigmoid_train(decision_values: &[f64], labels: &[f64]) -> PlattParams {
    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        decision_values
            .iter()
            .zip(&targets)
            .map(|(&f, &t)| {
                let f_apb = f * a + b;
                if f_apb >= 0.0 {
                    t * f_apb + (-f_apb).exp().ln_1p()
                } else {
                    (t - 1.0) * f_apb + f_apb.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    let mut iter = 0;
    while iter < MAX_NEWTON_ITERATIONS {
        // Gradient and Hessian, with a small ridge for stability
        let mut h11 = HESSIAN_RIDGE;
        let mut h22 = HESSIAN_RIDGE;
        let mut h21 = 0.0;
        let mut g1 = 0.0;
        let mut g2 = 0.0;
        for (&f, &t) in decision_values.iter().zip(&targets) {
            let f_apb = f * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < NEWTON_EPS && g2.abs() < NEWTON_EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let d_a = -(h22 * g1 - h21 * g2) / det;
        let d_b = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * d_a + g2 * d_b;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let new_a = a + step * d_a;
            let new_b = b + step * d_b;
            let new_f = objective(new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            warn!("Platt scaling line search failed after {} iterations", iter);
            break;
        }
        iter += 1;
    }

    if iter >= MAX_NEWTON_ITERATIONS {
        warn!("Platt scaling reached the maximal number of iterations");
    }

    PlattParams { a, b }
}

/// Numerically stable `1 / (1 + exp(A f + B))`
pub fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    if f_apb >= 0.0 {
        let e = (-f_apb).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Clamp a pairwise probability away from 0 and 1
pub fn clamp_probability(p: f64) -> f64 {
    p.clamp(MIN_PROBABILITY, 1.0 - MIN_PROBABILITY)
}

/// Couple pairwise probabilities into a distribution over `k` classes
///
/// `r[i][j]` is the probability that class `i` wins against class `j`, with
/// `r[j][i] = 1 - r[i][j]`. Solves the quadratic problem of Wu, Lin and
/// Weng (2004) by fixed-point iteration.
pub fn multiclass_probability(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    if k == 1 {
        return vec![1.0];
    }

    let max_iter = 100.max(k);
    let eps = 0.005 / k as f64;
    let mut p = vec![1.0 / k as f64; k];
    let mut q = vec![vec![0.0; k]; k];
    let mut qp = vec![0.0; k];

    for t in 0..k {
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in t + 1..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut iter = 0;
    while iter < max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }
        let max_error = qp.iter().map(|v| (v - pqp).abs()).fold(0.0, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
        iter += 1;
    }

    if iter >= max_iter {
        warn!("pairwise coupling reached the maximal number of iterations");
    }
    p
}

/// Decision values of a binary problem obtained by internal k-fold
/// cross-validation over a seeded shuffle
///
/// `train` returns `None` for a subset it cannot fit. Such folds, and folds
/// whose training part holds a single class, get the constant decision value
/// of the majority class of the training part.
pub fn cross_validated_decision_values<F>(
    kernel: &Kernel,
    points: &[&[f64]],
    y: &[f64],
    folds: usize,
    seed: u64,
    train: F,
) -> Result<Vec<f64>>
where
    F: Fn(&[&[f64]], &[f64]) -> Result<Option<DecisionFunction>>,
{
    let l = points.len();
    let folds = folds.max(2);
    let mut perm: Vec<usize> = (0..l).collect();
    let mut rng = SmallRng::seed_from_u64(seed);
    perm.shuffle(&mut rng);

    let mut decision_values = vec![0.0; l];
    for fold in 0..folds {
        let begin = fold * l / folds;
        let end = (fold + 1) * l / folds;
        if begin == end {
            continue;
        }

        let train_idx: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();
        let sub_points: Vec<&[f64]> = train_idx.iter().map(|&i| points[i]).collect();
        let sub_y: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
        let n_pos = sub_y.iter().filter(|&&v| v > 0.0).count();
        let n_neg = sub_y.len() - n_pos;

        let held_out = &perm[begin..end];
        let function = if n_pos > 0 && n_neg > 0 {
            train(&sub_points, &sub_y)?
        } else {
            None
        };
        match function {
            None => {
                let value = match n_pos.cmp(&n_neg) {
                    Ordering::Greater => 1.0,
                    Ordering::Less => -1.0,
                    Ordering::Equal => 0.0,
                };
                held_out.iter().for_each(|&i| decision_values[i] = value);
            }
            Some(f) => {
                for &i in held_out {
                    decision_values[i] = sub_points
                        .iter()
                        .zip(&f.coef)
                        .filter(|(_, c)| **c != 0.0)
                        .map(|(sv, c)| c * kernel.compute(sv, points[i]))
                        .sum::<f64>()
                        - f.rho;
                }
            }
        }
        debug!("calibration fold {}/{} done", fold + 1, folds);
    }

    Ok(decision_values)
}
