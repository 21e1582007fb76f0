//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the generalized dual problem
//!
//! ```text
//! min_a ½ aᵀQa + pᵀa   s.t.  yᵀa = Δ,  0 <= a_i <= C_i
//! ```
//!
//! by repeatedly optimizing a pair of variables chosen with second-order
//! working-set selection. The nu formulations add the constraint `eᵀa = const`,
//! which restricts every pair to variables of the same sign.

use crate::core::{OptimizationResult, OptimizerConfig, Result, SVMError};
use crate::solver::qmatrix::QMatrix;
use log::{debug, warn};

const TAU: f64 = 1e-12;

/// A dual problem ready to be handed to [`SMOSolver`]
pub struct DualProblem<Q: QMatrix> {
    /// Quadratic term
    pub q: Q,
    /// Linear term
    pub p: Vec<f64>,
    /// Sign of each variable, +1 or -1
    pub y: Vec<f64>,
    /// Feasible starting point
    pub alpha: Vec<f64>,
    /// Upper bound per variable
    pub bounds: Vec<f64>,
    /// Whether the extra nu constraint applies
    pub nu_constraint: bool,
}

/// SMO solver for SVM optimization
pub struct SMOSolver {
    config: OptimizerConfig,
}

impl SMOSolver {
    /// Create a new SMO solver with the given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Solve the dual problem
    pub fn solve<Q: QMatrix>(&self, problem: DualProblem<Q>) -> Result<OptimizationResult> {
        let l = problem.q.len();
        if l == 0 {
            return Err(SVMError::SolverFailure(
                "empty optimization problem".to_string(),
            ));
        }
        let lengths = [
            problem.p.len(),
            problem.y.len(),
            problem.alpha.len(),
            problem.bounds.len(),
        ];
        if lengths.iter().any(|&len| len != l) {
            return Err(SVMError::SolverFailure(
                "inconsistent dual problem dimensions".to_string(),
            ));
        }

        let nu_constraint = problem.nu_constraint;
        let mut state = SolverState::new(problem);
        let eps = self.config.epsilon;

        let mut iterations = 0;
        while iterations < self.config.max_iterations {
            let working_set = if nu_constraint {
                state.select_working_set_nu(eps)
            } else {
                state.select_working_set(eps)
            };
            let Some((i, j)) = working_set else {
                break;
            };
            state.take_step(i, j);
            iterations += 1;
        }

        if iterations >= self.config.max_iterations {
            warn!(
                "SMO reached the iteration limit ({}) before convergence",
                self.config.max_iterations
            );
        }

        // rho is taken from a gradient rebuilt from the final multipliers
        state.rebuild_gradient();

        let (rho, r) = if nu_constraint {
            let (rho, r) = state.calculate_rho_nu();
            (rho, Some(r))
        } else {
            (state.calculate_rho(), None)
        };

        let objective_value = state.objective();
        debug!(
            "SMO finished after {} iterations, objective {:.6}, rho {:.6}, cache hit rate {:.2}",
            iterations,
            objective_value,
            rho,
            state.q.cache_hit_rate()
        );

        if !rho.is_finite() || state.alpha.iter().any(|a| !a.is_finite()) {
            return Err(SVMError::SolverFailure(
                "solution is not finite; the problem is likely infeasible".to_string(),
            ));
        }

        Ok(OptimizationResult {
            alpha: state.alpha,
            rho,
            r,
            iterations,
            objective_value,
        })
    }
}

struct SolverState<Q: QMatrix> {
    q: Q,
    p: Vec<f64>,
    y: Vec<f64>,
    alpha: Vec<f64>,
    bounds: Vec<f64>,
    gradient: Vec<f64>,
}

impl<Q: QMatrix> SolverState<Q> {
    fn new(problem: DualProblem<Q>) -> Self {
        let gradient = problem.p.clone();
        let mut state = Self {
            q: problem.q,
            p: problem.p,
            y: problem.y,
            alpha: problem.alpha,
            bounds: problem.bounds,
            gradient,
        };
        state.rebuild_gradient();
        state
    }

    fn len(&self) -> usize {
        self.alpha.len()
    }

    fn is_upper_bound(&self, i: usize) -> bool {
        self.alpha[i] >= self.bounds[i]
    }

    fn is_lower_bound(&self, i: usize) -> bool {
        self.alpha[i] <= 0.0
    }

    fn is_positive(&self, i: usize) -> bool {
        self.y[i] > 0.0
    }

    /// G = Qa + p
    fn rebuild_gradient(&mut self) {
        self.gradient.copy_from_slice(&self.p);
        for i in 0..self.len() {
            let alpha_i = self.alpha[i];
            if alpha_i != 0.0 {
                let q_i = self.q.row(i);
                for (g, q) in self.gradient.iter_mut().zip(q_i.iter()) {
                    *g += alpha_i * q;
                }
            }
        }
    }

    /// Pick `i` maximizing `-y_i G_i` over I_up and `j` minimizing the
    /// second-order objective decrease over I_low
    fn select_working_set(&mut self, eps: f64) -> Option<(usize, usize)> {
        let mut gmax = f64::NEG_INFINITY;
        let mut gmax2 = f64::NEG_INFINITY;
        let mut best_i = None;

        for t in 0..self.len() {
            if self.is_positive(t) {
                if !self.is_upper_bound(t) && -self.gradient[t] >= gmax {
                    gmax = -self.gradient[t];
                    best_i = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.gradient[t] >= gmax {
                gmax = self.gradient[t];
                best_i = Some(t);
            }
        }

        let i = best_i?;
        let q_i = self.q.row(i);
        let qd = self.q.diagonal();
        let mut best_j = None;
        let mut obj_diff_min = f64::INFINITY;

        for j in 0..self.len() {
            let (grad_diff, quad_coef) = if self.is_positive(j) {
                if self.is_lower_bound(j) {
                    continue;
                }
                gmax2 = gmax2.max(self.gradient[j]);
                (
                    gmax + self.gradient[j],
                    qd[i] + qd[j] - 2.0 * self.y[i] * q_i[j],
                )
            } else {
                if self.is_upper_bound(j) {
                    continue;
                }
                gmax2 = gmax2.max(-self.gradient[j]);
                (
                    gmax - self.gradient[j],
                    qd[i] + qd[j] + 2.0 * self.y[i] * q_i[j],
                )
            };

            if grad_diff > 0.0 {
                let obj_diff = -(grad_diff * grad_diff) / positive_or_tau(quad_coef);
                if obj_diff <= obj_diff_min {
                    obj_diff_min = obj_diff;
                    best_j = Some(j);
                }
            }
        }

        if gmax + gmax2 < eps {
            return None;
        }
        best_j.map(|j| (i, j))
    }

    /// Working-set selection under the extra nu constraint: both variables
    /// share the same sign
    fn select_working_set_nu(&mut self, eps: f64) -> Option<(usize, usize)> {
        let mut gmaxp = f64::NEG_INFINITY;
        let mut gmaxp2 = f64::NEG_INFINITY;
        let mut gmaxn = f64::NEG_INFINITY;
        let mut gmaxn2 = f64::NEG_INFINITY;
        let mut best_ip = None;
        let mut best_in = None;

        for t in 0..self.len() {
            if self.is_positive(t) {
                if !self.is_upper_bound(t) && -self.gradient[t] >= gmaxp {
                    gmaxp = -self.gradient[t];
                    best_ip = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.gradient[t] >= gmaxn {
                gmaxn = self.gradient[t];
                best_in = Some(t);
            }
        }

        let q_ip = best_ip.map(|i| self.q.row(i));
        let q_in = best_in.map(|i| self.q.row(i));
        let qd = self.q.diagonal();
        let mut best_j = None;
        let mut obj_diff_min = f64::INFINITY;

        for j in 0..self.len() {
            let (grad_diff, quad_coef) = if self.is_positive(j) {
                if self.is_lower_bound(j) {
                    continue;
                }
                gmaxp2 = gmaxp2.max(self.gradient[j]);
                match (best_ip, &q_ip) {
                    (Some(ip), Some(q)) => {
                        (gmaxp + self.gradient[j], qd[ip] + qd[j] - 2.0 * q[j])
                    }
                    _ => continue,
                }
            } else {
                if self.is_upper_bound(j) {
                    continue;
                }
                gmaxn2 = gmaxn2.max(-self.gradient[j]);
                match (best_in, &q_in) {
                    (Some(i_n), Some(q)) => {
                        (gmaxn - self.gradient[j], qd[i_n] + qd[j] - 2.0 * q[j])
                    }
                    _ => continue,
                }
            };

            if grad_diff > 0.0 {
                let obj_diff = -(grad_diff * grad_diff) / positive_or_tau(quad_coef);
                if obj_diff <= obj_diff_min {
                    obj_diff_min = obj_diff;
                    best_j = Some(j);
                }
            }
        }

        if (gmaxp + gmaxp2).max(gmaxn + gmaxn2) < eps {
            return None;
        }
        let j = best_j?;
        let i = if self.is_positive(j) { best_ip } else { best_in }?;
        Some((i, j))
    }

    /// Analytically optimize the pair (i, j) and update the gradient
    fn take_step(&mut self, i: usize, j: usize) {
        let q_i = self.q.row(i);
        let q_j = self.q.row(j);
        let qd = self.q.diagonal();
        let (c_i, c_j) = (self.bounds[i], self.bounds[j]);
        let (old_i, old_j) = (self.alpha[i], self.alpha[j]);
        let (mut a_i, mut a_j) = (old_i, old_j);

        if self.y[i] != self.y[j] {
            let quad_coef = positive_or_tau(qd[i] + qd[j] + 2.0 * q_i[j]);
            let delta = (-self.gradient[i] - self.gradient[j]) / quad_coef;
            let diff = a_i - a_j;
            a_i += delta;
            a_j += delta;

            if diff > 0.0 {
                if a_j < 0.0 {
                    a_j = 0.0;
                    a_i = diff;
                }
            } else if a_i < 0.0 {
                a_i = 0.0;
                a_j = -diff;
            }
            if diff > c_i - c_j {
                if a_i > c_i {
                    a_i = c_i;
                    a_j = c_i - diff;
                }
            } else if a_j > c_j {
                a_j = c_j;
                a_i = c_j + diff;
            }
        } else {
            let quad_coef = positive_or_tau(qd[i] + qd[j] - 2.0 * q_i[j]);
            let delta = (self.gradient[i] - self.gradient[j]) / quad_coef;
            let sum = a_i + a_j;
            a_i -= delta;
            a_j += delta;

            if sum > c_i {
                if a_i > c_i {
                    a_i = c_i;
                    a_j = sum - c_i;
                }
            } else if a_j < 0.0 {
                a_j = 0.0;
                a_i = sum;
            }
            if sum > c_j {
                if a_j > c_j {
                    a_j = c_j;
                    a_i = sum - c_j;
                }
            } else if a_i < 0.0 {
                a_i = 0.0;
                a_j = sum;
            }
        }

        self.alpha[i] = a_i;
        self.alpha[j] = a_j;

        let delta_i = a_i - old_i;
        let delta_j = a_j - old_j;
        for ((g, qi), qj) in self.gradient.iter_mut().zip(q_i.iter()).zip(q_j.iter()) {
            *g += qi * delta_i + qj * delta_j;
        }
    }

    /// Offset from free variables, or the midpoint of the feasible interval
    fn calculate_rho(&self) -> f64 {
        let mut ub = f64::INFINITY;
        let mut lb = f64::NEG_INFINITY;
        let mut n_free = 0;
        let mut sum_free = 0.0;

        for i in 0..self.len() {
            let yg = self.y[i] * self.gradient[i];
            if self.is_upper_bound(i) {
                if self.is_positive(i) {
                    lb = lb.max(yg);
                } else {
                    ub = ub.min(yg);
                }
            } else if self.is_lower_bound(i) {
                if self.is_positive(i) {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else {
                n_free += 1;
                sum_free += yg;
            }
        }

        if n_free > 0 {
            sum_free / n_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    /// Returns `(rho, r)` of the nu formulation
    fn calculate_rho_nu(&self) -> (f64, f64) {
        let mut side = [SideBounds::default(), SideBounds::default()];

        for i in 0..self.len() {
            let s = &mut side[usize::from(!self.is_positive(i))];
            let g = self.gradient[i];
            if self.is_upper_bound(i) {
                s.lb = s.lb.max(g);
            } else if self.is_lower_bound(i) {
                s.ub = s.ub.min(g);
            } else {
                s.n_free += 1;
                s.sum_free += g;
            }
        }

        let r1 = side[0].value();
        let r2 = side[1].value();
        ((r1 - r2) / 2.0, (r1 + r2) / 2.0)
    }

    /// ½ aᵀQa + pᵀa, evaluated as ½ Σ a_i (G_i + p_i)
    fn objective(&self) -> f64 {
        self.alpha
            .iter()
            .zip(self.gradient.iter().zip(&self.p))
            .map(|(a, (g, p))| a * (g + p))
            .sum::<f64>()
            / 2.0
    }
}

struct SideBounds {
    ub: f64,
    lb: f64,
    n_free: usize,
    sum_free: f64,
}

impl Default for SideBounds {
    fn default() -> Self {
        Self {
            ub: f64::INFINITY,
            lb: f64::NEG_INFINITY,
            n_free: 0,
            sum_free: 0.0,
        }
    }
}

impl SideBounds {
    fn value(&self) -> f64 {
        if self.n_free > 0 {
            self.sum_free / self.n_free as f64
        } else {
            (self.ub + self.lb) / 2.0
        }
    }
}

#[inline]
fn positive_or_tau(quad_coef: f64) -> f64 {
    if quad_coef > 0.0 {
        quad_coef
    } else {
        TAU
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use crate::solver::qmatrix::{OneClassQ, SvcQ};
    use approx::assert_relative_eq;

    fn svc_problem<'a>(
        kernel: &'a Kernel,
        points: &'a [Vec<f64>],
        y: Vec<f64>,
        c: f64,
    ) -> DualProblem<SvcQ<'a>> {
        let l = points.len();
        let refs = points.iter().map(|x| x.as_slice()).collect();
        DualProblem {
            q: SvcQ::new(kernel, refs, y.clone(), 1 << 20),
            p: vec![-1.0; l],
            y,
            alpha: vec![0.0; l],
            bounds: vec![c; l],
            nu_constraint: false,
        }
    }

    #[test]
    fn test_smo_solver_linearly_separable() {
        let kernel = Kernel::linear();
        let points = vec![vec![2.0], vec![-2.0]];
        let solver = SMOSolver::new(OptimizerConfig::default());

        let result = solver
            .solve(svc_problem(&kernel, &points, vec![1.0, -1.0], 1.0))
            .expect("Should solve successfully");

        // Hard-margin optimum: w = 0.5, alpha = w / 2 on both points
        assert_relative_eq!(result.alpha[0], 0.125, epsilon = 1e-9);
        assert_relative_eq!(result.alpha[1], 0.125, epsilon = 1e-9);
        assert_relative_eq!(result.rho, 0.0, epsilon = 1e-9);
        assert!(result.iterations > 0);
        assert!(result.r.is_none());
    }

    #[test]
    fn test_smo_xor_rbf_hits_box_constraint() {
        let kernel = Kernel::rbf(0.5).unwrap();
        let points = vec![
            vec![-1.0, -1.0],
            vec![-1.0, 1.0],
            vec![1.0, -1.0],
            vec![1.0, 1.0],
        ];
        let solver = SMOSolver::new(OptimizerConfig::default());

        let problem = svc_problem(&kernel, &points, vec![1.0, -1.0, -1.0, 1.0], 1.0);
        let result = solver.solve(problem).expect("Should solve");

        for alpha in &result.alpha {
            assert_relative_eq!(*alpha, 1.0, epsilon = 1e-6);
        }
        assert_relative_eq!(result.rho, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_smo_solver_max_iterations() {
        let kernel = Kernel::linear();
        let points = vec![
            vec![1.0, 1.0],
            vec![-1.0, -1.0],
            vec![1.0, -1.0],
            vec![-1.0, 1.0],
        ];
        let config = OptimizerConfig {
            max_iterations: 1,
            epsilon: 1e-5,
            ..OptimizerConfig::default()
        };
        let solver = SMOSolver::new(config);

        let problem = svc_problem(&kernel, &points, vec![1.0, -1.0, 1.0, -1.0], 10.0);
        let result = solver.solve(problem).expect("Should solve");

        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_smo_equality_constraint_preserved() {
        let kernel = Kernel::rbf(1.0).unwrap();
        let points = vec![
            vec![0.0, 0.0],
            vec![0.3, 0.1],
            vec![1.0, 1.0],
            vec![0.9, 1.2],
            vec![0.5, 0.4],
        ];
        let y = vec![1.0, 1.0, -1.0, -1.0, 1.0];
        let solver = SMOSolver::new(OptimizerConfig::default());

        let result = solver
            .solve(svc_problem(&kernel, &points, y.clone(), 1.0))
            .expect("Should solve");

        let balance: f64 = result.alpha.iter().zip(&y).map(|(a, y)| a * y).sum();
        assert_relative_eq!(balance, 0.0, epsilon = 1e-9);
        assert!(result.alpha.iter().all(|&a| (0.0..=1.0).contains(&a)));
    }

    #[test]
    fn test_smo_one_class_keeps_total_weight() {
        let kernel = Kernel::rbf(0.5).unwrap();
        let points = vec![vec![0.0], vec![0.1], vec![0.2], vec![5.0]];
        let refs = points.iter().map(|x| x.as_slice()).collect();
        // One-class start: sum(alpha) = nu * l = 2
        let problem = DualProblem {
            q: OneClassQ::new(&kernel, refs, 1 << 20),
            p: vec![0.0; 4],
            y: vec![1.0; 4],
            alpha: vec![1.0, 1.0, 0.0, 0.0],
            bounds: vec![1.0; 4],
            nu_constraint: false,
        };
        let result = SMOSolver::new(OptimizerConfig::default())
            .solve(problem)
            .expect("Should solve");

        let total: f64 = result.alpha.iter().sum();
        assert_relative_eq!(total, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_smo_nu_constraint_keeps_per_sign_sums() {
        let kernel = Kernel::rbf(1.0).unwrap();
        let points = vec![vec![0.0], vec![0.5], vec![3.0], vec![3.4]];
        let y = vec![1.0, 1.0, -1.0, -1.0];
        let refs = points.iter().map(|x| x.as_slice()).collect();
        let problem = DualProblem {
            q: SvcQ::new(&kernel, refs, y.clone(), 1 << 20),
            p: vec![0.0; 4],
            y: y.clone(),
            alpha: vec![1.0, 0.0, 1.0, 0.0],
            bounds: vec![1.0; 4],
            nu_constraint: true,
        };
        let result = SMOSolver::new(OptimizerConfig::default())
            .solve(problem)
            .expect("Should solve");

        let positive: f64 = result.alpha[..2].iter().sum();
        let negative: f64 = result.alpha[2..].iter().sum();
        assert_relative_eq!(positive, 1.0, epsilon = 1e-9);
        assert_relative_eq!(negative, 1.0, epsilon = 1e-9);
        assert!(result.r.is_some());
    }

    #[test]
    fn test_smo_rejects_inconsistent_problem() {
        let kernel = Kernel::linear();
        let points = vec![vec![1.0], vec![-1.0]];
        let mut problem = svc_problem(&kernel, &points, vec![1.0, -1.0], 1.0);
        problem.bounds.pop();

        let result = SMOSolver::new(OptimizerConfig::default()).solve(problem);
        assert!(matches!(result, Err(SVMError::SolverFailure(_))));
    }
}
